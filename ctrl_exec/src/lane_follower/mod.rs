//! # Lane follower module
//!
//! The lane follower keeps the vehicle at a target speed on a constant
//! lateral offset from the reference path. It does this with a pair of
//! independent PID loops:
//!
//! - The speed loop drives the longitudinal velocity towards the target speed
//!   and outputs the acceleration demand.
//! - The steering loop drives a weighted sum of the lateral error and the
//!   heading error to zero and outputs the steering demand.
//!
//! The steering feedback signal is
//! `lat_weight * (x_tran - lat_offset_ref) + head_weight * e_psi`. The default
//! weights (5 and 1) are tuning choices, the cross-track error simply dominates
//! the heading error.

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
use crate::pid::PidConfigError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default weight of the lateral (cross-track) error in the steering feedback.
pub const DEFAULT_LAT_WEIGHT: f64 = 5.0;

/// Default weight of the heading error in the steering feedback.
pub const DEFAULT_HEAD_WEIGHT: f64 = 1.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during LaneFollower operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LaneFollowerError {
    #[error("Invalid {loop_name} loop configuration: {source}")]
    PidConfig {
        loop_name: &'static str,
        source: PidConfigError
    },

    #[error("Parameter {name} must be finite, found {value}")]
    NonFiniteParam {
        name: &'static str,
        value: f64
    },

    /// A loop's own `ref_input` was set in the parameters. The loop targets
    /// come from `speed_ref_ms` and `lat_offset_ref_m` instead.
    #[error("The {loop_name} loop ref_input must be left at zero, found {value}")]
    LoopReferenceSet {
        loop_name: &'static str,
        value: f64
    },

    /// The state snapshot is missing a field the controller needs, or the
    /// field is not finite.
    #[error("Invalid vehicle state: {0}")]
    InvalidState(&'static str),
}
