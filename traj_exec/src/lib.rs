//! # Trajectory Executor library.
//!
//! Exposes the executor so the binary, and any other crate in the workspace, can drive it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Parameters of the executor
pub mod params;

/// Pure plan transforms
pub mod transform;

/// Execution state machine - which plan is active and how far it has been consumed
pub mod exec_state;

/// Periodic timers and the factories that build them
pub mod timer;

/// Dispatch table - maps control plugin names to their plan output channels
pub mod dispatch;

/// Control plugin registry clients
pub mod registry;

/// Inbound plan sources
pub mod plan_source;

/// Fatal alerting and process termination
pub mod guard;

/// The executor itself
pub mod executor;
