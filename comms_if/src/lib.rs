//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the trajectory executor and its peers.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Trajectory plan definitions exchanged between planners, the executor and control plugins
pub mod traj;

/// System alert definitions
pub mod alert;

/// Control plugin registry request/response definitions
pub mod registry;

/// Network module
pub mod net;
