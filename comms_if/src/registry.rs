//! # Control Plugin Registry Interface
//!
//! Requests and responses exchanged with the control plugin registry service. The registry knows
//! which control plugins are deployed and the endpoint on which each of them expects its
//! trajectory plans.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Request sent to the registry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum RegistryRequest {
    /// List all known control plugins
    GetControlPlugins,
}

/// Response from the registry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum RegistryResponse {
    /// Map of control plugin name to the endpoint of its plan input
    ControlPlugins(BTreeMap<String, String>),

    /// The registry could not service the request
    Error(String),
}
