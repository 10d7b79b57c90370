//! PID controller state and cyclic processing

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use serde::Serialize;

// Internal
use super::{PidConfig, PidConfigError, ValidPidConfig};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    /// Gains and limits
    config: ValidPidConfig,

    /// The value the measurement is driven towards
    ref_input: f64,

    /// Feed-forward bias on the output
    ref_output: f64,

    /// Error terms and previous output
    loop_state: LoopState
}

/// The mutable state of one PID loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LoopState {
    /// Error on the previous cycle
    pub error: f64,

    /// Finite difference of the error on the previous cycle
    pub error_deriv: f64,

    /// The (clamped) integral accumulator
    pub error_int: f64,

    /// Output of the previous cycle
    pub prev_output: f64
}

/// Diagnostics for one call to `solve`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SolveReport {
    /// False if the measurement was rejected, in which case the previous
    /// output is held and no state is updated.
    pub success: bool,

    /// Proportional contribution (before the sign inversion)
    pub p_term: f64,

    /// Integral contribution (before the sign inversion)
    pub i_term: f64,

    /// Derivative contribution (before the sign inversion)
    pub d_term: f64,

    /// The output after rate limiting but before absolute saturation
    pub rate_limited_output: f64,

    /// True if the rate bounds changed the output
    pub rate_limited: bool,

    /// True if the absolute bounds changed the output
    pub saturated: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {

    /// Create a new controller, checking the configuration.
    pub fn new(config: PidConfig) -> Result<Self, PidConfigError> {
        Ok(Self::from_valid(config.validate()?))
    }

    /// Create a new controller from an already validated configuration.
    pub fn from_valid(config: ValidPidConfig) -> Self {
        debug!("New PID controller: {:?}", config.config());

        Self {
            ref_input: config.config().ref_input,
            ref_output: config.config().ref_output,
            config,
            loop_state: LoopState::default()
        }
    }

    /// Run one control cycle for the given measurement, using the stored
    /// previous output as the rate limit base point.
    pub fn solve(&mut self, measurement: f64) -> (f64, SolveReport) {
        self.solve_with_prev(measurement, None)
    }

    /// Run one control cycle for the given measurement.
    ///
    /// If `prev_output` is given it replaces the stored previous output as the
    /// base point for rate limiting, for callers whose actuator did not apply
    /// the last command exactly.
    ///
    /// A non-finite measurement or base point, or a cycle whose error terms
    /// overflow, is rejected: the last finite base point is returned
    /// unchanged, no state is committed and the report's `success` is false.
    pub fn solve_with_prev(
        &mut self, 
        measurement: f64, 
        prev_output: Option<f64>
    ) -> (f64, SolveReport) {
        let stored_prev = self.loop_state.prev_output;

        let u_prev = match prev_output {
            Some(u) if !u.is_finite() => {
                warn!("PID rejected non-finite previous output {}", u);
                return Self::hold(stored_prev)
            },
            Some(u) => u,
            None => stored_prev
        };

        if !measurement.is_finite() {
            warn!("PID rejected non-finite measurement {}", measurement);
            return Self::hold(u_prev)
        }

        let config = self.config.config();
        let dt_s = config.dt_s;

        // Compute error terms
        let error = measurement - self.ref_input;
        let error_deriv = (error - self.loop_state.error) / dt_s;

        // Anti-windup, the accumulator itself is clamped
        let error_int = clamp(
            &(self.loop_state.error_int + error * dt_s),
            &config.int_err_min,
            &config.int_err_max
        );

        let p_term = config.k_p * error;
        let i_term = config.k_i * error_int;
        let d_term = config.k_d * error_deriv;

        let raw_output = -(p_term + i_term + d_term) + self.ref_output;

        // A finite measurement far enough from the reference can still
        // overflow the error terms
        if !error.is_finite() || !error_deriv.is_finite() || !raw_output.is_finite() {
            warn!(
                "PID rejected measurement {}, error terms overflowed (e = {}, de = {})",
                measurement, error, error_deriv
            );
            return Self::hold(u_prev)
        }

        // Limit the change from the previous output
        let mut delta = raw_output - u_prev;
        let mut rate_limited = false;
        if let Some(limits) = self.config.rate_limits() {
            let limited = limits.apply(delta);
            rate_limited = limited != delta;
            delta = limited;
        }
        let rate_limited_output = u_prev + delta;

        // Absolute saturation last
        let mut output = rate_limited_output;
        let mut saturated = false;
        if let Some(limits) = self.config.output_limits() {
            output = limits.apply(rate_limited_output);
            saturated = output != rate_limited_output;
        }

        if rate_limited || saturated {
            trace!(
                "PID output limited: raw {:.4}, rate limited {:.4}, output {:.4}",
                raw_output, rate_limited_output, output
            );
        }

        // Commit
        self.loop_state = LoopState {
            error,
            error_deriv,
            error_int,
            prev_output: output
        };

        (output, SolveReport {
            success: true,
            p_term,
            i_term,
            d_term,
            rate_limited_output,
            rate_limited,
            saturated
        })
    }

    /// Set a new input reference.
    ///
    /// The previous error and the integral accumulator are zeroed so that the
    /// setpoint jump doesn't produce a derivative or integral spike. A
    /// non-finite reference is refused and nothing changes.
    pub fn set_reference(&mut self, ref_input: f64) -> Result<(), PidConfigError> {
        check_finite("ref_input", ref_input)?;
        self.ref_input = ref_input;
        self.loop_state.error_int = 0.0;
        self.loop_state.error = 0.0;
        Ok(())
    }

    /// Set the feed-forward output reference. No state is reset. A non-finite
    /// reference is refused and nothing changes.
    pub fn set_output_reference(&mut self, ref_output: f64) -> Result<(), PidConfigError> {
        check_finite("ref_output", ref_output)?;
        self.ref_output = ref_output;
        Ok(())
    }

    /// Zero the integral accumulator and the error derivative, leaving the
    /// references untouched.
    pub fn clear_errors(&mut self) {
        self.loop_state.error_int = 0.0;
        self.loop_state.error_deriv = 0.0;
    }

    /// Replace the gains and limits.
    ///
    /// The accumulated error state and the current references are kept. On
    /// error the existing configuration remains in place.
    pub fn reconfigure(&mut self, config: PidConfig) -> Result<(), PidConfigError> {
        let config = config.validate()?;
        debug!("PID reconfigured: {:?}", config.config());
        self.config = config;
        Ok(())
    }

    /// Get the `(input, output)` references.
    pub fn refs(&self) -> (f64, f64) {
        (self.ref_input, self.ref_output)
    }

    /// Get the `(error, derivative, integral)` error terms.
    pub fn errors(&self) -> (f64, f64, f64) {
        (
            self.loop_state.error,
            self.loop_state.error_deriv,
            self.loop_state.error_int
        )
    }

    /// Get the output of the last cycle.
    pub fn prev_output(&self) -> f64 {
        self.loop_state.prev_output
    }

    /// Get the loop state.
    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    /// Get the active configuration.
    pub fn config(&self) -> &ValidPidConfig {
        &self.config
    }

    /// The result of a rejected cycle.
    fn hold(held_output: f64) -> (f64, SolveReport) {
        (held_output, SolveReport {
            success: false,
            rate_limited_output: held_output,
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_finite(name: &'static str, value: f64) -> Result<(), PidConfigError> {
    if value.is_finite() {
        Ok(())
    }
    else {
        Err(PidConfigError::NonFinite { name, value })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Deterministic pseudo-random sequence in `[-scale, scale]`
    fn noise(n: usize, scale: f64) -> Vec<f64> {
        let mut x: u64 = 0x2545_F491_4F6C_DD1D;
        (0..n).map(|_| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            ((x % 20001) as f64 / 10000.0 - 1.0) * scale
        }).collect()
    }

    #[test]
    fn test_new_rejects_bad_config() {
        assert!(PidController::new(PidConfig::pid(0.0, 1.0, 0.0, 0.0)).is_err());
        assert!(PidController::new(
            PidConfig::default().with_int_err_limits(5.0, 1.0)
        ).is_err());
        assert!(PidController::new(
            PidConfig::default().with_output_limits(1.0, -1.0)
        ).is_err());
    }

    #[test]
    fn test_first_solve() {
        let mut pid = PidController::new(
            PidConfig::pid(0.1, 2.0, 0.0, 0.0).with_ref_input(1.0)
        ).unwrap();

        // e = -1, u = -(2 * -1) = 2
        let (u, report) = pid.solve(0.0);
        assert_eq!(u, 2.0);
        assert!(report.success);
        assert_eq!(report.p_term, -2.0);
        assert_eq!(pid.prev_output(), 2.0);
        assert_eq!(pid.errors().0, -1.0);
    }

    #[test]
    fn test_output_reference_is_bias() {
        let mut pid = PidController::new(
            PidConfig::pid(0.1, 1.0, 0.0, 0.0).with_ref_output(0.25)
        ).unwrap();

        let (u, _) = pid.solve(0.0);
        assert_eq!(u, 0.25);

        pid.set_output_reference(-0.5).unwrap();
        let (u, _) = pid.solve(0.0);
        assert_eq!(u, -0.5);
        assert_eq!(pid.refs(), (0.0, -0.5));
    }

    #[test]
    fn test_integral_grows_under_constant_error() {
        let mut pid = PidController::new(PidConfig::pid(0.1, 0.65, 0.1, 0.0)).unwrap();

        let mut last_i = 0f64;
        for _ in 0..3 {
            let (_, report) = pid.solve(1.0);
            assert!(report.i_term.abs() > last_i.abs());
            last_i = report.i_term;
        }
    }

    #[test]
    fn test_integral_stops_at_clamp() {
        let mut pid = PidController::new(
            PidConfig::pid(0.1, 0.65, 0.1, 0.0).with_int_err_limits(-0.15, 0.15)
        ).unwrap();

        pid.solve(1.0);
        pid.solve(1.0);
        let (_, report) = pid.solve(1.0);
        assert_eq!(pid.errors().2, 0.15);
        assert_eq!(report.i_term, 0.1 * 0.15);

        // Further cycles stay pinned at the clamp
        let (_, report_next) = pid.solve(1.0);
        assert_eq!(report_next.i_term, report.i_term);
    }

    #[test]
    fn test_integral_always_within_bounds() {
        let mut pid = PidController::new(
            PidConfig::pid(0.1, 1.0, 5.0, 0.1).with_int_err_limits(-1.0, 0.5)
        ).unwrap();

        // Long one-sided runs to try and wind the integrator up, then noise
        let mut inputs = vec![1000.0; 50];
        inputs.extend(vec![-1000.0; 50]);
        inputs.extend(noise(500, 1e4));

        for m in inputs {
            pid.solve(m);
            let ei = pid.errors().2;
            assert!(ei >= -1.0 && ei <= 0.5, "integral {} out of bounds", ei);
        }
    }

    #[test]
    fn test_output_always_within_bounds() {
        let mut pid = PidController::new(
            PidConfig::pid(0.1, 1e6, 1e5, 1e4).with_output_limits(-2.0, 2.0)
        ).unwrap();

        for m in noise(500, 100.0) {
            let (u, _) = pid.solve(m);
            assert!(u >= -2.0 && u <= 2.0, "output {} out of bounds", u);
        }
    }

    #[test]
    fn test_rate_limit_without_saturation() {
        let mut pid = PidController::new(
            PidConfig::pid(0.1, 10.0, 1.0, 0.5).with_rate_limits(-0.5, 0.3)
        ).unwrap();

        let mut prev = pid.prev_output();
        for m in noise(500, 10.0) {
            let (u, report) = pid.solve(m);
            assert!(!report.saturated);
            assert!((u - prev).abs() <= 0.5 + 1e-9, "step {} too large", u - prev);
            prev = u;
        }
    }

    #[test]
    fn test_rate_limit_applied_before_saturation() {
        let mut pid = PidController::new(
            PidConfig::pid(0.1, 10.0, 0.0, 0.0)
                .with_rate_limits(-4.5, 4.5)
                .with_output_limits(-0.436, 0.436)
        ).unwrap();

        // Raw command is -10, limited to a step of -4.5, then saturated
        let (u, report) = pid.solve(1.0);
        assert_eq!(report.rate_limited_output, -4.5);
        assert!(report.rate_limited);
        assert!(report.saturated);
        assert_eq!(u, -0.436);

        // The next step starts from the saturated output, not the rate
        // limited one
        let (_, report) = pid.solve(-1.0);
        assert_eq!(report.rate_limited_output, -0.436 + 4.5);
    }

    #[test]
    fn test_prev_output_override() {
        let mut pid = PidController::new(
            PidConfig::pid(0.1, 1.0, 0.0, 0.0).with_rate_limits(-0.1, 0.1)
        ).unwrap();

        // Raw command is -1, stepping from an externally supplied 5.0
        let (u, _) = pid.solve_with_prev(1.0, Some(5.0));
        assert_eq!(u, 5.0 - 0.1);
        assert_eq!(pid.prev_output(), u);
    }

    #[test]
    fn test_set_reference_no_spike() {
        let mut pid = PidController::new(PidConfig::pid(0.1, 1.0, 1.0, 1.0)).unwrap();

        for m in noise(20, 3.0) {
            pid.solve(m);
        }

        pid.set_reference(2.5).unwrap();
        let (_, report) = pid.solve(2.5);
        let (error, error_deriv, _) = pid.errors();
        assert_eq!(error, 0.0);
        assert_eq!(error_deriv, 0.0);
        assert_eq!(report.p_term, 0.0);
        assert_eq!(report.d_term, 0.0);
        assert_eq!(report.i_term, 0.0);
        assert_eq!(pid.refs().0, 2.5);
    }

    #[test]
    fn test_clear_errors_idempotent() {
        let mut pid = PidController::new(PidConfig::pid(0.1, 1.0, 1.0, 1.0)).unwrap();
        for m in noise(10, 1.0) {
            pid.solve(m);
        }

        pid.clear_errors();
        let once = pid.loop_state();
        pid.clear_errors();
        assert_eq!(pid.loop_state(), once);

        assert_eq!(once.error_int, 0.0);
        assert_eq!(once.error_deriv, 0.0);
        // The previous error is kept
        assert!(once.error != 0.0);
    }

    #[test]
    fn test_reconfigure_keeps_state() {
        let mut pid = PidController::new(
            PidConfig::pid(0.1, 1.0, 1.0, 0.0).with_ref_input(0.5)
        ).unwrap();
        pid.solve(1.0);
        pid.solve(2.0);
        let before = pid.loop_state();

        pid.reconfigure(PidConfig::pid(0.1, 3.0, 0.0, 0.0)).unwrap();
        assert_eq!(pid.loop_state(), before);
        assert_eq!(pid.config().config().k_p, 3.0);
        // References belong to the controller, not the gains
        assert_eq!(pid.refs().0, 0.5);

        // A bad config is rejected and the old one kept
        assert!(pid.reconfigure(PidConfig::pid(-1.0, 1.0, 0.0, 0.0)).is_err());
        assert_eq!(pid.config().config().k_p, 3.0);
    }

    #[test]
    fn test_non_finite_measurement_rejected() {
        let mut pid = PidController::new(PidConfig::pid(0.1, 1.0, 1.0, 0.0)).unwrap();
        let (u0, _) = pid.solve(1.0);
        let before = pid.loop_state();

        let (u, report) = pid.solve(std::f64::NAN);
        assert!(!report.success);
        assert_eq!(u, u0);
        assert_eq!(pid.loop_state(), before);
    }

    #[test]
    fn test_non_finite_prev_output_held() {
        let mut pid = PidController::new(
            PidConfig::pid(0.1, 1.0, 0.0, 0.0)
                .with_rate_limits(-0.5, 0.5)
                .with_output_limits(-1.0, 1.0)
        ).unwrap();
        let (u0, _) = pid.solve(0.4);
        let before = pid.loop_state();

        for bad in [std::f64::NAN, std::f64::INFINITY, std::f64::NEG_INFINITY].iter() {
            let (u, report) = pid.solve_with_prev(0.4, Some(*bad));
            assert!(!report.success);
            assert_eq!(u, u0);
            assert_eq!(pid.loop_state(), before);
        }

        // The loop carries on from the last good output
        let (u, report) = pid.solve(0.4);
        assert!(report.success);
        assert!(u.is_finite() && u >= -1.0 && u <= 1.0);
    }

    #[test]
    fn test_non_finite_references_refused() {
        let mut pid = PidController::new(
            PidConfig::pid(0.1, 1.0, 1.0, 0.0)
                .with_ref_input(0.5)
                .with_ref_output(0.1)
        ).unwrap();
        pid.solve(1.0);
        let before = pid.loop_state();

        assert!(matches!(
            pid.set_reference(std::f64::NAN),
            Err(PidConfigError::NonFinite { name: "ref_input", .. })
        ));
        assert!(pid.set_output_reference(std::f64::INFINITY).is_err());
        assert_eq!(pid.refs(), (0.5, 0.1));
        assert_eq!(pid.loop_state(), before);

        let (u, report) = pid.solve(1.0);
        assert!(report.success);
        assert!(u.is_finite());
    }

    #[test]
    fn test_overflowing_error_rejected() {
        let mut pid = PidController::new(
            PidConfig::pid(0.1, 1.0, 0.0, 1.0).with_ref_input(-1e308)
        ).unwrap();
        let (u0, _) = pid.solve(-1e308);
        let before = pid.loop_state();

        // Both finite, but their difference is not
        let (u, report) = pid.solve(1e308);
        assert!(!report.success);
        assert_eq!(u, u0);
        assert_eq!(pid.loop_state(), before);
    }
}
