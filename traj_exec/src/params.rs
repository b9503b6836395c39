//! # Trajectory Executor Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Emission rate used when none is given.
pub const DEFAULT_TRAJ_FREQUENCY_HZ: f64 = 10.0;

/// Largest socket timeout zmq accepts, larger values would read as "block forever".
pub const MAX_TIMEOUT_MS: u32 = i32::MAX as u32;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
pub struct TrajExecParams {

    /// Rate at which the active plan is emitted to its control plugin
    #[serde(default = "default_traj_frequency_hz")]
    pub traj_frequency_hz: f64,

    /// Minimum allowed emission rate, initialisation fails if `traj_frequency_hz` is below this
    #[serde(default = "default_traj_frequency_hz")]
    pub min_traj_publish_tickrate_hz: f64,

    /// Endpoint of the planner's plan publisher
    pub plan_endpoint: String,

    /// Recieve timeout of the plan subscriber
    #[serde(default = "default_plan_recv_timeout_ms")]
    pub plan_recv_timeout_ms: u32,

    /// Endpoint the system alert publisher binds to
    pub system_alert_endpoint: String,

    /// Where the set of control plugins comes from
    pub registry: RegistryParams,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Source of the control plugin registry.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryParams {
    /// Query the registry service over the network
    Remote {
        endpoint: String,

        #[serde(default = "default_registry_timeout_ms")]
        timeout_ms: u32,
    },

    /// Fixed map of plugin name to plan endpoint
    Static {
        plugins: BTreeMap<String, String>,
    },
}

/// Reasons the parameters can be rejected.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamsError {
    #[error("Trajectory frequency must be a positive number of Hz, found {0}")]
    InvalidFrequency(f64),

    #[error(
        "Trajectory frequency ({frequency_hz} Hz) is below the minimum allowed publish rate \
        ({min_hz} Hz)"
    )]
    TickRateTooLow {
        frequency_hz: f64,
        min_hz: f64,
    },

    #[error("{name} must be between 1 and 2147483647 ms, found {value}")]
    InvalidTimeout {
        name: &'static str,
        value: u32,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrajExecParams {
    /// Check the emission rate against its floor and the socket timeouts, and return the
    /// emission tick period.
    pub fn validate(&self) -> Result<Duration, ParamsError> {
        check_timeout("plan_recv_timeout_ms", self.plan_recv_timeout_ms)?;

        if let RegistryParams::Remote { timeout_ms, .. } = self.registry {
            check_timeout("registry.timeout_ms", timeout_ms)?;
        }

        let period = util::time::period_from_hz(self.traj_frequency_hz)
            .ok_or(ParamsError::InvalidFrequency(self.traj_frequency_hz))?;

        if self.traj_frequency_hz < self.min_traj_publish_tickrate_hz {
            return Err(ParamsError::TickRateTooLow {
                frequency_hz: self.traj_frequency_hz,
                min_hz: self.min_traj_publish_tickrate_hz,
            });
        }

        Ok(period)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// A zero timeout makes polling loops spin, so it is rejected along with unrepresentable ones.
fn check_timeout(name: &'static str, value: u32) -> Result<(), ParamsError> {
    if value == 0 || value > MAX_TIMEOUT_MS {
        Err(ParamsError::InvalidTimeout { name, value })
    }
    else {
        Ok(())
    }
}

fn default_traj_frequency_hz() -> f64 {
    DEFAULT_TRAJ_FREQUENCY_HZ
}

fn default_plan_recv_timeout_ms() -> u32 {
    100
}

fn default_registry_timeout_ms() -> u32 {
    2000
}
