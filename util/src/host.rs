//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// The environment variable pointing at the root of the software checkout.
pub const SW_ROOT_ENV_VAR: &str = "LANE_CTRL_SW_ROOT";

/// Get the software root directory from the `LANE_CTRL_SW_ROOT` environment
/// variable.
pub fn get_ctrl_sw_root() -> Result<PathBuf, env::VarError> {
    Ok(PathBuf::from(env::var(SW_ROOT_ENV_VAR)?))
}
