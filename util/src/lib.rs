//! Utility library for the Trajectory Executor Software

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod host;
pub mod logger;
pub mod params;
pub mod session;
pub mod time;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable pointing at the root of the software checkout. Parameter files and
/// session directories are resolved relative to this path.
pub const SW_ROOT_ENV_VAR: &str = "TRAJ_EXEC_SW_ROOT";
