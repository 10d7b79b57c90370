//! # PID control module
//!
//! A single-input single-output discrete PID compensator. Each call to
//! `PidController::solve` runs one control cycle:
//!
//!  1. The error is the measurement minus the input reference.
//!  1. The integral accumulator is advanced and clamped to its bounds
//!     (anti-windup acts on the accumulator itself, not on the integral term).
//!  1. The raw command is `-(Kp*e + Ki*ei + Kd*de) + ref_output`.
//!  1. The change from the previous output is limited to the rate bounds.
//!  1. The rate limited command is saturated to the absolute output bounds.
//!
//! Rate limiting always happens before absolute saturation, in the same way a
//! physical actuator has both a slew rate and a travel limit.
//!
//! All configuration checks happen when the controller is built, so the
//! cyclic path only performs arithmetic.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors in a PID configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PidConfigError {
    #[error("The control period must be positive and finite, found {0}")]
    InvalidPeriod(f64),

    #[error("Parameter {name} must be finite, found {value}")]
    NonFinite {
        name: &'static str,
        value: f64
    },

    /// Only one of a pair of bounds was given. Single-sided saturation is not
    /// supported.
    #[error("Only one of the {bounds} bounds was set, both or neither must be given")]
    OneSidedBounds {
        bounds: &'static str
    },

    #[error("The {bounds} bounds are inverted (min = {min}, max = {max})")]
    InvertedBounds {
        bounds: &'static str,
        min: f64,
        max: f64
    },
}
