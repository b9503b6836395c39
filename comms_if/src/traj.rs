//! # Trajectory Interface
//!
//! Defines the trajectory plan which is sent from the planner to the executor, and from the
//! executor to the control plugins.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single target sample of a trajectory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrajectoryPoint {
    /// Time at which the vehicle should reach this point, relative to the plan stamp.
    pub target_time_s: f64,

    /// Target position in the plan's frame.
    pub x_m: f64,
    pub y_m: f64,

    /// Target heading in the plan's frame.
    pub yaw_rad: f64,

    /// Target speed at this point.
    pub speed_ms: f64,

    /// Lane the point lies in, if known.
    #[serde(default)]
    pub lane_id: Option<String>,
}

/// An ordered sequence of points, tagged with the control plugin that must track it.
///
/// The order of `points` is the order of traversal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrajectoryPlan {
    /// Identifier assigned by the planner.
    pub trajectory_id: String,

    /// Time the plan was generated, point times are relative to this.
    pub stamp: DateTime<Utc>,

    /// Coordinate frame of the points.
    #[serde(default)]
    pub frame_id: String,

    /// Name of the control plugin this plan is destined for.
    pub controller_plugin: String,

    pub points: Vec<TrajectoryPoint>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrajectoryPlan {
    /// Number of points remaining in the plan.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the plan has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Parse a plan from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }
}
