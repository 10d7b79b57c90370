//! # Replay module
//!
//! Records read from, and written to, CSV logs when replaying recorded vehicle
//! states through a controller.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::lane_follower::LaneFollowerReport;
use crate::vehicle::{ActuationCommand, BodyVelocity, ParametricPose, VehicleState};
use util::maths::mean_std;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One row of a recorded state log.
///
/// Empty cells are read as missing fields.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StateRecord {
    pub t_s: f64,
    pub v_long_ms: Option<f64>,
    pub x_tran_m: Option<f64>,
    pub e_psi_rad: Option<f64>,
    pub lap_num: Option<u32>
}

/// One row of the output archive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputRecord {
    pub t_s: f64,

    /// False if the state was rejected and the fail-safe command applied
    pub valid: bool,

    pub accel_mss: f64,
    pub steer_rad: f64,
    pub steer_feedback: f64,

    pub speed_rate_limited: bool,
    pub speed_saturated: bool,
    pub steer_rate_limited: bool,
    pub steer_saturated: bool
}

/// Tracks lap completions from the lap counter in the state log.
#[derive(Debug, Clone, Default)]
pub struct LapTimer {
    /// Lap number and start time of the lap in progress
    current: Option<(u32, f64)>,

    /// Times of each completed lap
    lap_times_s: Vec<f64>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StateRecord {
    /// Build the controller's state snapshot from this record.
    ///
    /// The pose is only present if both the lateral and heading errors are.
    pub fn to_vehicle_state(&self) -> VehicleState {
        VehicleState {
            t_s: self.t_s,
            v: self.v_long_ms.map(|v_long_ms| BodyVelocity {
                v_long_ms, 
                ..Default::default()
            }),
            p: match (self.x_tran_m, self.e_psi_rad) {
                (Some(x_tran_m), Some(e_psi_rad)) => Some(ParametricPose {
                    x_tran_m, 
                    e_psi_rad, 
                    ..Default::default()
                }),
                _ => None
            },
            u: ActuationCommand::default(),
            lap_num: self.lap_num
        }
    }
}

impl OutputRecord {
    /// Record a successful cycle.
    pub fn from_cycle(t_s: f64, cmd: ActuationCommand, report: &LaneFollowerReport) -> Self {
        Self {
            t_s,
            valid: true,
            accel_mss: cmd.accel_mss,
            steer_rad: cmd.steer_rad,
            steer_feedback: report.steer_feedback,
            speed_rate_limited: report.speed.rate_limited,
            speed_saturated: report.speed.saturated,
            steer_rate_limited: report.steer.rate_limited,
            steer_saturated: report.steer.saturated
        }
    }

    /// Record a rejected cycle and the fail-safe command applied instead.
    pub fn fail_safe(t_s: f64, cmd: ActuationCommand) -> Self {
        Self {
            t_s,
            valid: false,
            accel_mss: cmd.accel_mss,
            steer_rad: cmd.steer_rad,
            steer_feedback: 0.0,
            speed_rate_limited: false,
            speed_saturated: false,
            steer_rate_limited: false,
            steer_saturated: false
        }
    }
}

impl LapTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the timer with the lap counter at the given time.
    ///
    /// Returns the lap time if a lap was completed on this update. Records
    /// without a lap counter are ignored.
    pub fn update(&mut self, lap_num: Option<u32>, t_s: f64) -> Option<f64> {
        let lap_num = lap_num?;

        match self.current {
            None => {
                self.current = Some((lap_num, t_s));
                None
            },
            Some((current_lap, start_s)) if lap_num > current_lap => {
                let lap_time_s = t_s - start_s;
                self.lap_times_s.push(lap_time_s);
                self.current = Some((lap_num, t_s));
                Some(lap_time_s)
            },
            Some(_) => None
        }
    }

    /// Times of the completed laps.
    pub fn lap_times_s(&self) -> &[f64] {
        &self.lap_times_s
    }

    /// Mean and standard deviation of the completed lap times.
    pub fn stats(&self) -> Option<(f64, f64)> {
        mean_std(&self.lap_times_s)
    }
}
