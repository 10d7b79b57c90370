//! # Vehicle state
//!
//! The snapshot a driver hands to a controller once per cycle. Controllers
//! read the velocity and path-relative pose and write their command into the
//! actuation slot. Creation and transport of the snapshot belong to the
//! driver.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A vehicle state snapshot.
///
/// The velocity and pose are optional as not every source provides them on
/// every cycle. Controllers which need a missing field reject the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    /// Time of the snapshot
    ///
    /// Units: seconds
    pub t_s: f64,

    /// Body frame linear velocity
    pub v: Option<BodyVelocity>,

    /// Pose relative to the reference path
    pub p: Option<ParametricPose>,

    /// Actuation slot, overwritten by the controller
    pub u: ActuationCommand,

    /// Number of the lap being driven, if known
    pub lap_num: Option<u32>
}

/// Body frame linear velocity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyVelocity {
    /// Longitudinal velocity
    ///
    /// Units: meters/second
    pub v_long_ms: f64,

    /// Transverse velocity
    ///
    /// Units: meters/second
    pub v_tran_ms: f64
}

/// Pose relative to the reference path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParametricPose {
    /// Distance travelled along the path
    ///
    /// Units: meters
    pub s_m: f64,

    /// Lateral deviation from the path, positive to the left
    ///
    /// Units: meters
    pub x_tran_m: f64,

    /// Heading error relative to the path tangent
    ///
    /// Units: radians
    pub e_psi_rad: f64
}

/// An actuation command, acceleration then steering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActuationCommand {
    /// Acceleration demand
    ///
    /// Units: meters/second^2
    pub accel_mss: f64,

    /// Steering angle demand
    ///
    /// Units: radians
    pub steer_rad: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehicleState {
    /// Build a snapshot with all fields the lane follower needs.
    pub fn new(v_long_ms: f64, x_tran_m: f64, e_psi_rad: f64) -> Self {
        Self {
            v: Some(BodyVelocity { v_long_ms, ..Default::default() }),
            p: Some(ParametricPose { x_tran_m, e_psi_rad, ..Default::default() }),
            ..Default::default()
        }
    }
}

impl ActuationCommand {
    /// The zero command, used as the fail-safe output.
    pub const ZERO: Self = Self { accel_mss: 0.0, steer_rad: 0.0 };

    /// Get the command as `[accel, steer]`.
    pub fn to_array(&self) -> [f64; 2] {
        [self.accel_mss, self.steer_rad]
    }
}

impl From<ActuationCommand> for [f64; 2] {
    fn from(cmd: ActuationCommand) -> Self {
        cmd.to_array()
    }
}
