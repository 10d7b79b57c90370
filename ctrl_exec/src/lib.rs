//! # Lane control library.
//!
//! This library holds the feedback controllers used to command a vehicle's
//! throttle and steering, along with the state types they exchange with the
//! driver (a simulation loop, a hardware bridge or the log replay executable).

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// PID controller - single loop discrete compensator with anti-windup, rate limiting and
/// saturation
pub mod pid;

/// Lane follower - speed and steering PID loops fused into one actuation command
pub mod lane_follower;

/// Vehicle state - the snapshot passed to controllers each cycle
pub mod vehicle;

/// Replay - conversion between recorded logs and controller inputs/outputs
pub mod replay;
