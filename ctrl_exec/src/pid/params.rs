//! PID controller parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::PidConfigError;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default control period.
///
/// Units: seconds
pub const DEFAULT_DT_S: f64 = 0.1;

/// Default bound on the magnitude of the integral accumulator.
pub const DEFAULT_INT_ERR_LIMIT: f64 = 100.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for a single PID loop.
///
/// The output bounds and the output rate bounds are each optional, but must be
/// given as a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidConfig {
    /// Control period.
    ///
    /// Units: seconds
    #[serde(default = "default_dt_s")]
    pub dt_s: f64,

    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    #[serde(default)]
    pub k_i: f64,

    /// Derivative gain
    #[serde(default)]
    pub k_d: f64,

    /// Lower bound on the integral accumulator
    #[serde(default = "default_int_err_min")]
    pub int_err_min: f64,

    /// Upper bound on the integral accumulator
    #[serde(default = "default_int_err_max")]
    pub int_err_max: f64,

    /// Absolute output lower bound
    #[serde(default)]
    pub output_min: Option<f64>,

    /// Absolute output upper bound
    #[serde(default)]
    pub output_max: Option<f64>,

    /// Lower bound on the change in output between two cycles
    #[serde(default)]
    pub output_rate_min: Option<f64>,

    /// Upper bound on the change in output between two cycles
    #[serde(default)]
    pub output_rate_max: Option<f64>,

    /// The value the measurement is driven towards
    #[serde(default)]
    pub ref_input: f64,

    /// Feed-forward bias added to the feedback correction
    #[serde(default)]
    pub ref_output: f64,
}

/// An inclusive pair of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Limits {
    pub min: f64,
    pub max: f64
}

/// A `PidConfig` which has passed validation.
///
/// The only way to obtain one is through `PidConfig::validate`, so holding one
/// guarantees the controller's cyclic path cannot meet a bad configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPidConfig {
    config: PidConfig,
    output_limits: Option<Limits>,
    rate_limits: Option<Limits>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            dt_s: DEFAULT_DT_S,
            k_p: 2.0,
            k_i: 0.0,
            k_d: 0.0,
            int_err_min: -DEFAULT_INT_ERR_LIMIT,
            int_err_max: DEFAULT_INT_ERR_LIMIT,
            output_min: None,
            output_max: None,
            output_rate_min: None,
            output_rate_max: None,
            ref_input: 0.0,
            ref_output: 0.0
        }
    }
}

impl PidConfig {
    /// Create a config with the given gains and period, leaving everything
    /// else at its default.
    pub fn pid(dt_s: f64, k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self { dt_s, k_p, k_i, k_d, ..Default::default() }
    }

    /// Set the absolute output bounds
    pub fn with_output_limits(mut self, min: f64, max: f64) -> Self {
        self.output_min = Some(min);
        self.output_max = Some(max);
        self
    }

    /// Set the output rate bounds
    pub fn with_rate_limits(mut self, min: f64, max: f64) -> Self {
        self.output_rate_min = Some(min);
        self.output_rate_max = Some(max);
        self
    }

    /// Set the integral accumulator bounds
    pub fn with_int_err_limits(mut self, min: f64, max: f64) -> Self {
        self.int_err_min = min;
        self.int_err_max = max;
        self
    }

    /// Set the input reference
    pub fn with_ref_input(mut self, ref_input: f64) -> Self {
        self.ref_input = ref_input;
        self
    }

    /// Set the feed-forward output reference
    pub fn with_ref_output(mut self, ref_output: f64) -> Self {
        self.ref_output = ref_output;
        self
    }

    /// Check the configuration, resolving the optional bound pairs.
    pub fn validate(self) -> Result<ValidPidConfig, PidConfigError> {
        if !self.dt_s.is_finite() || self.dt_s <= 0.0 {
            return Err(PidConfigError::InvalidPeriod(self.dt_s))
        }

        for &(name, value) in [
            ("k_p", self.k_p),
            ("k_i", self.k_i),
            ("k_d", self.k_d),
            ("ref_input", self.ref_input),
            ("ref_output", self.ref_output)
        ].iter() {
            if !value.is_finite() {
                return Err(PidConfigError::NonFinite { name, value })
            }
        }

        // The integral bounds are always present, but may be infinite to
        // disable anti-windup.
        Limits::from_pair(
            "integral", Some(self.int_err_min), Some(self.int_err_max)
        )?;

        let output_limits = Limits::from_pair(
            "output", self.output_min, self.output_max
        )?;
        let rate_limits = Limits::from_pair(
            "output rate", self.output_rate_min, self.output_rate_max
        )?;

        Ok(ValidPidConfig {
            config: self,
            output_limits,
            rate_limits
        })
    }
}

impl Limits {
    /// Build limits from an optional pair of bounds.
    ///
    /// Both or neither bound must be given, and `min` must not exceed `max`.
    fn from_pair(
        bounds: &'static str, 
        min: Option<f64>, 
        max: Option<f64>
    ) -> Result<Option<Self>, PidConfigError> {
        match (min, max) {
            (None, None) => Ok(None),
            (Some(min), Some(max)) => {
                if min.is_nan() || max.is_nan() || min > max {
                    Err(PidConfigError::InvertedBounds { bounds, min, max })
                }
                else {
                    Ok(Some(Self { min, max }))
                }
            },
            _ => Err(PidConfigError::OneSidedBounds { bounds })
        }
    }

    /// Clamp the value into these limits.
    pub fn apply(&self, value: f64) -> f64 {
        clamp(&value, &self.min, &self.max)
    }
}

impl ValidPidConfig {
    /// The underlying configuration.
    pub fn config(&self) -> &PidConfig {
        &self.config
    }

    /// The absolute output bounds, if any.
    pub fn output_limits(&self) -> Option<Limits> {
        self.output_limits
    }

    /// The output rate bounds, if any.
    pub fn rate_limits(&self) -> Option<Limits> {
        self.rate_limits
    }

    /// The integral accumulator bounds.
    pub fn int_err_limits(&self) -> Limits {
        Limits {
            min: self.config.int_err_min,
            max: self.config.int_err_max
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_dt_s() -> f64 {
    DEFAULT_DT_S
}

fn default_int_err_min() -> f64 {
    -DEFAULT_INT_ERR_LIMIT
}

fn default_int_err_max() -> f64 {
    DEFAULT_INT_ERR_LIMIT
}
