//! Parameters structure for the lane follower

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{DEFAULT_HEAD_WEIGHT, DEFAULT_LAT_WEIGHT};
use crate::pid::{PidConfig, DEFAULT_DT_S};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the lane follower.
///
/// The control period overrides the `dt_s` of both loops. The speed loop's
/// input reference is replaced by `speed_ref_ms`, and the steering loop's
/// input reference is always zero, the lateral offset being applied inside
/// the feedback signal instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneFollowerParams {
    /// Control period shared by both loops.
    ///
    /// Units: seconds
    #[serde(default = "default_dt_s")]
    pub dt_s: f64,

    /// Target longitudinal speed.
    ///
    /// Units: meters/second
    pub speed_ref_ms: f64,

    /// Target lateral offset from the path, zero for the centre line.
    ///
    /// Units: meters
    #[serde(default)]
    pub lat_offset_ref_m: f64,

    /// Weight of the lateral error in the steering feedback signal.
    #[serde(default = "default_lat_weight")]
    pub lat_weight: f64,

    /// Weight of the heading error in the steering feedback signal.
    #[serde(default = "default_head_weight")]
    pub head_weight: f64,

    /// Speed loop, outputs acceleration in meters/second^2
    pub speed: PidConfig,

    /// Steering loop, outputs steering angle in radians
    pub steer: PidConfig,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LaneFollowerParams {
    /// The reference tuning for a small scale car at 10 Hz.
    fn default() -> Self {
        Self {
            dt_s: DEFAULT_DT_S,
            speed_ref_ms: 1.0,
            lat_offset_ref_m: 0.0,
            lat_weight: DEFAULT_LAT_WEIGHT,
            head_weight: DEFAULT_HEAD_WEIGHT,
            speed: PidConfig::pid(DEFAULT_DT_S, 0.4, 0.0, 0.0)
                .with_output_limits(-2.0, 2.0)
                .with_rate_limits(-20.0, 20.0),
            steer: PidConfig::pid(DEFAULT_DT_S, 0.65, 0.1, 0.0)
                .with_output_limits(-0.436, 0.436)
                .with_rate_limits(-4.5, 4.5),
        }
    }
}

impl LaneFollowerParams {
    /// The speed loop configuration as the lane follower uses it.
    ///
    /// The loop's own `ref_input` is replaced by `speed_ref_ms`, and
    /// `LaneFollower::new` refuses parameters where it was set.
    pub fn speed_loop_config(&self) -> PidConfig {
        PidConfig {
            dt_s: self.dt_s,
            ref_input: self.speed_ref_ms,
            ..self.speed.clone()
        }
    }

    /// The steering loop configuration as the lane follower uses it. The loop
    /// drives the feedback signal to zero, the lateral target enters through
    /// the feedback instead.
    pub fn steer_loop_config(&self) -> PidConfig {
        PidConfig {
            dt_s: self.dt_s,
            ref_input: 0.0,
            ..self.steer.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_dt_s() -> f64 {
    DEFAULT_DT_S
}

fn default_lat_weight() -> f64 {
    DEFAULT_LAT_WEIGHT
}

fn default_head_weight() -> f64 {
    DEFAULT_HEAD_WEIGHT
}
