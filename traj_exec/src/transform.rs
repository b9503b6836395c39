//! # Plan Transform
//!
//! Produces the forward-looking remainder of a plan once its leading point has been consumed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::traj::TrajectoryPlan;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("Cannot trim the first point of plan {0}, it has no points left")]
    EmptyPlan(String),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Return a copy of the plan with its first point removed.
///
/// All other fields of the plan are copied unchanged. The input is not modified.
pub fn trim_first_point(plan: &TrajectoryPlan) -> Result<TrajectoryPlan, TransformError> {
    match plan.points.split_first() {
        Some((_, rest)) => Ok(TrajectoryPlan {
            points: rest.to_vec(),
            trajectory_id: plan.trajectory_id.clone(),
            stamp: plan.stamp,
            frame_id: plan.frame_id.clone(),
            controller_plugin: plan.controller_plugin.clone(),
        }),
        None => Err(TransformError::EmptyPlan(plan.trajectory_id.clone())),
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use chrono::{DateTime, Utc};
    use comms_if::traj::TrajectoryPoint;

    /// Build a plan for `plugin` whose points lie at `x_m = 0, 1, 2, ...`.
    pub(crate) fn line_plan(id: &str, plugin: &str, num_points: usize) -> TrajectoryPlan {
        TrajectoryPlan {
            trajectory_id: id.into(),
            stamp: "2019-06-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap(),
            frame_id: "map".into(),
            controller_plugin: plugin.into(),
            points: (0..num_points)
                .map(|i| TrajectoryPoint {
                    target_time_s: i as f64 * 0.1,
                    x_m: i as f64,
                    y_m: 0.0,
                    yaw_rad: 0.0,
                    speed_ms: 2.5,
                    lane_id: Some("1200".into()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_trim_first_point() {
        let plan = line_plan("t1", "PurePursuit", 3);
        let original = plan.clone();

        let trimmed = trim_first_point(&plan).unwrap();

        // Input untouched
        assert_eq!(plan, original);

        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed.points[0], plan.points[1]);
        assert_eq!(trimmed.points[1], plan.points[2]);

        assert_eq!(trimmed.trajectory_id, plan.trajectory_id);
        assert_eq!(trimmed.stamp, plan.stamp);
        assert_eq!(trimmed.frame_id, plan.frame_id);
        assert_eq!(trimmed.controller_plugin, plan.controller_plugin);
    }

    #[test]
    fn test_trim_down_to_empty() {
        let mut plan = line_plan("t1", "PurePursuit", 5);

        for remaining in (0..5).rev() {
            plan = trim_first_point(&plan).unwrap();
            assert_eq!(plan.len(), remaining);
            // Points keep their relative order
            assert_eq!(plan.points.first().map(|p| p.x_m), if remaining > 0 {
                Some((5 - remaining) as f64)
            } else {
                None
            });
        }

        assert_eq!(
            trim_first_point(&plan),
            Err(TransformError::EmptyPlan("t1".into()))
        );
    }
}
