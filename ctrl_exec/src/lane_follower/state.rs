//! Implementations for the LaneFollower state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde::Serialize;
use std::convert::Infallible;

// Internal
use super::{LaneFollowerError, LaneFollowerParams};
use crate::pid::{PidController, SolveReport, ValidPidConfig};
use crate::vehicle::{ActuationCommand, VehicleState};
use util::module::Controller;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// PID throttle and steering controller.
#[derive(Debug, Clone)]
pub struct LaneFollower {
    params: LaneFollowerParams,

    /// Validated loop configurations, used to rebuild the loops on reset
    speed_config: ValidPidConfig,
    steer_config: ValidPidConfig,

    /// Speed loop, outputs acceleration demand
    speed_pid: PidController,

    /// Steering loop, outputs steering demand
    steer_pid: PidController,

    /// Current target speed
    speed_ref_ms: f64,

    /// Current target lateral offset
    lat_offset_ref_m: f64,

    report: LaneFollowerReport
}

/// Status report for one lane follower cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LaneFollowerReport {
    /// Speed loop diagnostics
    pub speed: SolveReport,

    /// Steering loop diagnostics
    pub steer: SolveReport,

    /// The weighted lateral and heading error fed to the steering loop
    pub steer_feedback: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LaneFollower {
    /// Create a new lane follower, checking both loop configurations and the
    /// feedback weights.
    pub fn new(params: LaneFollowerParams) -> Result<Self, LaneFollowerError> {
        for &(name, value) in [
            ("dt_s", params.dt_s),
            ("speed_ref_ms", params.speed_ref_ms),
            ("lat_offset_ref_m", params.lat_offset_ref_m),
            ("lat_weight", params.lat_weight),
            ("head_weight", params.head_weight)
        ].iter() {
            if !value.is_finite() {
                return Err(LaneFollowerError::NonFiniteParam { name, value })
            }
        }

        for &(loop_name, value) in [
            ("speed", params.speed.ref_input),
            ("steer", params.steer.ref_input)
        ].iter() {
            if value != 0.0 {
                return Err(LaneFollowerError::LoopReferenceSet { loop_name, value })
            }
        }

        let speed_config = params.speed_loop_config()
            .validate()
            .map_err(|source| LaneFollowerError::PidConfig { loop_name: "speed", source })?;
        let steer_config = params.steer_loop_config()
            .validate()
            .map_err(|source| LaneFollowerError::PidConfig { loop_name: "steer", source })?;

        debug!(
            "LaneFollower created: speed ref {} m/s, lateral offset {} m, weights ({}, {})",
            params.speed_ref_ms, params.lat_offset_ref_m, params.lat_weight, params.head_weight
        );

        Ok(Self {
            speed_pid: PidController::from_valid(speed_config.clone()),
            steer_pid: PidController::from_valid(steer_config.clone()),
            speed_config,
            steer_config,
            speed_ref_ms: params.speed_ref_ms,
            lat_offset_ref_m: params.lat_offset_ref_m,
            params,
            report: LaneFollowerReport::default()
        })
    }

    /// Set a new target speed.
    ///
    /// The speed loop's error state is reset to avoid a derivative spike.
    /// `reset` restores the target from the parameters.
    pub fn set_speed_ref(&mut self, speed_ref_ms: f64) -> Result<(), LaneFollowerError> {
        self.speed_pid.set_reference(speed_ref_ms)
            .map_err(|_| LaneFollowerError::NonFiniteParam {
                name: "speed_ref_ms",
                value: speed_ref_ms
            })?;
        self.speed_ref_ms = speed_ref_ms;
        Ok(())
    }

    /// Set a new target lateral offset. `reset` restores the target from the
    /// parameters.
    pub fn set_lat_offset_ref(&mut self, lat_offset_ref_m: f64) -> Result<(), LaneFollowerError> {
        if !lat_offset_ref_m.is_finite() {
            return Err(LaneFollowerError::NonFiniteParam {
                name: "lat_offset_ref_m",
                value: lat_offset_ref_m
            })
        }
        self.lat_offset_ref_m = lat_offset_ref_m;
        Ok(())
    }

    /// Get the `(speed, lateral offset)` targets.
    pub fn refs(&self) -> (f64, f64) {
        (self.speed_ref_ms, self.lat_offset_ref_m)
    }

    /// The status report of the last cycle.
    pub fn report(&self) -> LaneFollowerReport {
        self.report
    }

    /// The parameters this controller was built from.
    pub fn params(&self) -> &LaneFollowerParams {
        &self.params
    }

    /// The speed loop.
    pub fn speed_pid(&self) -> &PidController {
        &self.speed_pid
    }

    /// The steering loop.
    pub fn steer_pid(&self) -> &PidController {
        &self.steer_pid
    }

    /// Compute the steering feedback signal for a lateral and heading error.
    pub fn steer_feedback(&self, x_tran_m: f64, e_psi_rad: f64) -> f64 {
        self.params.lat_weight * (x_tran_m - self.lat_offset_ref_m)
            + self.params.head_weight * e_psi_rad
    }
}

impl Controller for LaneFollower {
    type InitData = ();
    type InitError = Infallible;

    type State = VehicleState;
    type Output = ActuationCommand;
    type StepError = LaneFollowerError;

    /// The lane follower needs no setup beyond construction.
    fn initialize(&mut self, _init_data: ()) -> Result<(), Infallible> {
        Ok(())
    }

    /// Rebuild both loops from their configurations, wiping all error state
    /// and restoring the targets given in the parameters.
    fn reset(&mut self) {
        self.speed_pid = PidController::from_valid(self.speed_config.clone());
        self.steer_pid = PidController::from_valid(self.steer_config.clone());
        self.speed_ref_ms = self.params.speed_ref_ms;
        self.lat_offset_ref_m = self.params.lat_offset_ref_m;
        self.report = LaneFollowerReport::default();

        debug!("LaneFollower reset");
    }

    /// Compute the acceleration and steering demands for this cycle.
    ///
    /// The demands are written into `state.u` and also returned.
    fn step(&mut self, state: &mut VehicleState) -> Result<ActuationCommand, LaneFollowerError> {
        // Check the whole snapshot before touching either loop
        let v_long_ms = state.v
            .ok_or(LaneFollowerError::InvalidState("missing body velocity"))?
            .v_long_ms;
        let pose = state.p
            .ok_or(LaneFollowerError::InvalidState("missing parametric pose"))?;

        if !v_long_ms.is_finite() {
            return Err(LaneFollowerError::InvalidState("longitudinal velocity is not finite"))
        }
        if !pose.x_tran_m.is_finite() {
            return Err(LaneFollowerError::InvalidState("lateral deviation is not finite"))
        }
        if !pose.e_psi_rad.is_finite() {
            return Err(LaneFollowerError::InvalidState("heading error is not finite"))
        }

        // Large but finite deviations can overflow the weighted sum
        let steer_feedback = self.steer_feedback(pose.x_tran_m, pose.e_psi_rad);
        if !steer_feedback.is_finite() {
            return Err(LaneFollowerError::InvalidState("steering feedback is not finite"))
        }

        let (accel_mss, speed_report) = self.speed_pid.solve(v_long_ms);
        let (steer_rad, steer_report) = self.steer_pid.solve(steer_feedback);

        self.report = LaneFollowerReport {
            speed: speed_report,
            steer: steer_report,
            steer_feedback
        };

        let cmd = ActuationCommand { accel_mss, steer_rad };
        state.u = cmd;

        Ok(cmd)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pid::PidConfigError;
    use crate::vehicle::ParametricPose;

    fn drive(lf: &mut LaneFollower, inputs: &[(f64, f64, f64)]) -> Vec<ActuationCommand> {
        inputs.iter()
            .map(|&(v, x, e)| lf.step(&mut VehicleState::new(v, x, e)).unwrap())
            .collect()
    }

    fn inputs() -> Vec<(f64, f64, f64)> {
        (0..50)
            .map(|i| {
                let t = i as f64 * 0.1;
                (0.5 + 0.1 * t, 0.3 * t.sin(), -0.2 * (1.3 * t).cos())
            })
            .collect()
    }

    #[test]
    fn test_first_cycle_from_rest() {
        let mut lf = LaneFollower::new(LaneFollowerParams::default()).unwrap();
        let mut state = VehicleState::new(0.0, 0.0, 0.0);

        let cmd = lf.step(&mut state).unwrap();

        assert!(cmd.accel_mss > 0.0);
        assert_eq!(cmd.steer_rad, 0.0);

        // Written in place as well as returned
        assert_eq!(state.u, cmd);
        assert_eq!(cmd.to_array(), [cmd.accel_mss, cmd.steer_rad]);
    }

    #[test]
    fn test_steer_feedback_weighting() {
        let mut params = LaneFollowerParams::default();
        params.lat_offset_ref_m = 0.1;
        let mut lf = LaneFollower::new(params).unwrap();

        let mut state = VehicleState::new(1.0, 0.3, -0.2);
        lf.step(&mut state).unwrap();

        let expected = 5.0 * (0.3 - 0.1) + 1.0 * -0.2;
        assert_eq!(lf.report().steer_feedback, expected);
        assert_eq!(lf.steer_pid().errors().0, expected);
    }

    #[test]
    fn test_steers_back_towards_path() {
        let mut lf = LaneFollower::new(LaneFollowerParams::default()).unwrap();

        // To the left of the path, so steer right (negative)
        let cmd = lf.step(&mut VehicleState::new(1.0, 0.2, 0.0)).unwrap();
        assert!(cmd.steer_rad < 0.0);
        assert!(cmd.steer_rad >= -0.436);

        // Too fast, so brake
        let mut lf = LaneFollower::new(LaneFollowerParams::default()).unwrap();
        let cmd = lf.step(&mut VehicleState::new(3.0, 0.0, 0.0)).unwrap();
        assert!(cmd.accel_mss < 0.0);
    }

    #[test]
    fn test_outputs_within_bounds() {
        let mut lf = LaneFollower::new(LaneFollowerParams::default()).unwrap();

        let extreme: Vec<_> = (0..100)
            .map(|i| {
                let s = if i % 7 < 3 { 1.0 } else { -1.0 };
                (s * 50.0, s * 10.0, -s * 3.0)
            })
            .collect();

        for cmd in drive(&mut lf, &extreme) {
            assert!(cmd.accel_mss.abs() <= 2.0);
            assert!(cmd.steer_rad.abs() <= 0.436);
        }
    }

    #[test]
    fn test_reset_matches_fresh_instance() {
        let mut used = LaneFollower::new(LaneFollowerParams::default()).unwrap();
        drive(&mut used, &inputs());
        used.reset();

        let mut fresh = LaneFollower::new(LaneFollowerParams::default()).unwrap();

        let used_cmds = drive(&mut used, &inputs());
        let fresh_cmds = drive(&mut fresh, &inputs());

        for (a, b) in used_cmds.iter().zip(fresh_cmds.iter()) {
            assert_eq!(a.accel_mss.to_bits(), b.accel_mss.to_bits());
            assert_eq!(a.steer_rad.to_bits(), b.steer_rad.to_bits());
        }
    }

    #[test]
    fn test_reset_wipes_all_loop_state() {
        let mut lf = LaneFollower::new(LaneFollowerParams::default()).unwrap();
        drive(&mut lf, &inputs());
        assert!(lf.steer_pid().prev_output() != 0.0);

        lf.reset();

        assert_eq!(lf.speed_pid().loop_state(), Default::default());
        assert_eq!(lf.steer_pid().loop_state(), Default::default());
        assert_eq!(lf.report(), LaneFollowerReport::default());
    }

    #[test]
    fn test_reset_restores_configured_targets() {
        let mut lf = LaneFollower::new(LaneFollowerParams::default()).unwrap();
        lf.set_speed_ref(2.0).unwrap();
        lf.set_lat_offset_ref(0.25).unwrap();
        drive(&mut lf, &inputs());
        lf.reset();

        assert_eq!(lf.refs(), (1.0, 0.0));
        assert_eq!(lf.speed_pid().refs().0, 1.0);

        let mut fresh = LaneFollower::new(LaneFollowerParams::default()).unwrap();
        let used_cmds = drive(&mut lf, &inputs());
        let fresh_cmds = drive(&mut fresh, &inputs());

        for (a, b) in used_cmds.iter().zip(fresh_cmds.iter()) {
            assert_eq!(a.accel_mss.to_bits(), b.accel_mss.to_bits());
            assert_eq!(a.steer_rad.to_bits(), b.steer_rad.to_bits());
        }
    }

    #[test]
    fn test_set_targets() {
        let mut lf = LaneFollower::new(LaneFollowerParams::default()).unwrap();
        lf.set_speed_ref(2.0).unwrap();
        lf.set_lat_offset_ref(0.25).unwrap();

        assert_eq!(lf.refs(), (2.0, 0.25));
        assert_eq!(lf.speed_pid().refs().0, 2.0);

        // At the target speed and offset the first cycle commands nothing
        let cmd = lf.step(&mut VehicleState::new(2.0, 0.25, 0.0)).unwrap();
        assert_eq!(cmd, ActuationCommand::ZERO);

        // Non-finite targets are refused and the current ones kept
        assert!(matches!(
            lf.set_speed_ref(std::f64::NAN),
            Err(LaneFollowerError::NonFiniteParam { name: "speed_ref_ms", .. })
        ));
        assert!(matches!(
            lf.set_lat_offset_ref(std::f64::INFINITY),
            Err(LaneFollowerError::NonFiniteParam { name: "lat_offset_ref_m", .. })
        ));
        assert_eq!(lf.refs(), (2.0, 0.25));
        assert_eq!(lf.speed_pid().refs().0, 2.0);

        let cmd = lf.step(&mut VehicleState::new(1.5, 0.1, 0.0)).unwrap();
        assert!(cmd.accel_mss.is_finite() && cmd.steer_rad.is_finite());
    }

    #[test]
    fn test_overflowing_feedback_rejected() {
        let mut lf = LaneFollower::new(LaneFollowerParams::default()).unwrap();
        drive(&mut lf, &inputs()[..5]);
        let speed_before = lf.speed_pid().loop_state();
        let steer_before = lf.steer_pid().loop_state();
        let report_before = lf.report();

        // Finite, but five times it is not
        let mut state = VehicleState::new(1.0, 1e308, 0.0);
        assert_eq!(
            lf.step(&mut state),
            Err(LaneFollowerError::InvalidState("steering feedback is not finite"))
        );

        assert_eq!(lf.speed_pid().loop_state(), speed_before);
        assert_eq!(lf.steer_pid().loop_state(), steer_before);
        assert_eq!(lf.report(), report_before);
    }

    #[test]
    fn test_invalid_state() {
        let mut lf = LaneFollower::new(LaneFollowerParams::default()).unwrap();

        let mut no_vel = VehicleState {
            p: Some(ParametricPose::default()),
            ..Default::default()
        };
        assert_eq!(
            lf.step(&mut no_vel),
            Err(LaneFollowerError::InvalidState("missing body velocity"))
        );

        let mut no_pose = VehicleState::new(1.0, 0.0, 0.0);
        no_pose.p = None;
        assert_eq!(
            lf.step(&mut no_pose),
            Err(LaneFollowerError::InvalidState("missing parametric pose"))
        );

        assert!(lf.step(&mut VehicleState::new(std::f64::NAN, 0.0, 0.0)).is_err());

        // Rejected snapshots leave both loops untouched
        assert_eq!(lf.speed_pid().loop_state(), Default::default());
        assert_eq!(lf.steer_pid().loop_state(), Default::default());
    }

    #[test]
    fn test_bad_loop_config() {
        let mut params = LaneFollowerParams::default();
        params.steer.output_min = None;

        assert_eq!(
            LaneFollower::new(params).unwrap_err(),
            LaneFollowerError::PidConfig {
                loop_name: "steer",
                source: PidConfigError::OneSidedBounds { bounds: "output" }
            }
        );

        let mut params = LaneFollowerParams::default();
        params.dt_s = 0.0;
        assert!(matches!(
            LaneFollower::new(params),
            Err(LaneFollowerError::PidConfig { loop_name: "speed", .. })
        ));

        let mut params = LaneFollowerParams::default();
        params.steer.ref_input = 0.3;
        assert_eq!(
            LaneFollower::new(params).unwrap_err(),
            LaneFollowerError::LoopReferenceSet { loop_name: "steer", value: 0.3 }
        );

        let mut params = LaneFollowerParams::default();
        params.speed.ref_input = 1.0;
        assert!(matches!(
            LaneFollower::new(params),
            Err(LaneFollowerError::LoopReferenceSet { loop_name: "speed", .. })
        ));

        let mut params = LaneFollowerParams::default();
        params.lat_weight = std::f64::INFINITY;
        assert!(matches!(
            LaneFollower::new(params),
            Err(LaneFollowerError::NonFiniteParam { name: "lat_weight", .. })
        ));
    }

    #[test]
    fn test_initialize_is_noop() {
        let mut lf = LaneFollower::new(LaneFollowerParams::default()).unwrap();
        let mut fresh = lf.clone();

        lf.initialize(()).unwrap();

        let a = lf.step(&mut VehicleState::new(0.5, 0.1, 0.1)).unwrap();
        let b = fresh.step(&mut VehicleState::new(0.5, 0.1, 0.1)).unwrap();
        assert_eq!(a, b);
    }
}
