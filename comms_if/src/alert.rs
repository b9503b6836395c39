//! # System Alert Interface
//!
//! Alerts are broadcast to the whole system to report a change in health of one of its nodes.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An alert broadcast on the system alert channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SystemAlert {
    pub alert_type: AlertType,

    /// Human readable reason for the alert
    pub description: String,

    /// Name of the node which raised the alert
    pub source: String,

    pub stamp: DateTime<Utc>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Severity of a system alert.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    /// The raising node has hit an unrecoverable error and is terminating
    Fatal,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SystemAlert {
    /// Build a fatal alert stamped with the current time.
    pub fn fatal(source: &str, description: &str) -> Self {
        Self {
            alert_type: AlertType::Fatal,
            description: description.into(),
            source: source.into(),
            stamp: Utc::now(),
        }
    }
}
