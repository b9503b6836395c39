//! Host platform (linux for example) utility functions

use std::path::PathBuf;

use crate::SW_ROOT_ENV_VAR;

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Get the root directory of the software from the environment.
///
/// Returns `None` if the variable is unset or empty.
pub fn get_sw_root() -> Option<PathBuf> {
    match std::env::var_os(SW_ROOT_ENV_VAR) {
        Some(p) if !p.is_empty() => Some(PathBuf::from(p)),
        _ => None
    }
}
