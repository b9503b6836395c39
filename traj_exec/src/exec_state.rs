//! # Execution State
//!
//! Holds the plan currently being executed and the number of times it has been emitted since it
//! was installed. The executor keeps a single instance behind a mutex; everything in this module
//! is pure so it can be driven step by step.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::traj::TrajectoryPlan;

use crate::transform::{trim_first_point, TransformError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ExecState {
    /// The installed plan, `None` while idle
    cur_plan: Option<TrajectoryPlan>,

    /// Number of emissions of the current plan
    ticks_since_install: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No plan installed
    Idle,

    /// A plan is installed and being emitted
    Active,
}

/// The outcome of the next emission tick, computed without modifying the state.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Nothing installed, nothing to do
    Idle,

    /// Install `plan` (possibly the current plan unchanged) and emit it
    Emit {
        plan: TrajectoryPlan,
        ticks: u64,
    },

    /// The installed plan has been consumed, clear it
    Exhaust,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Plan {0} contains no points")]
    EmptyPlan(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ExecState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        match self.cur_plan {
            Some(_) => Mode::Active,
            None => Mode::Idle,
        }
    }

    pub fn current_plan(&self) -> Option<&TrajectoryPlan> {
        self.cur_plan.as_ref()
    }

    pub fn ticks_since_install(&self) -> u64 {
        self.ticks_since_install
    }

    /// Install a new plan, replacing any plan currently installed.
    ///
    /// The remainder of the replaced plan is discarded and returned. Plans without points are
    /// rejected and leave the state untouched.
    pub fn install(
        &mut self,
        plan: TrajectoryPlan
    ) -> Result<Option<TrajectoryPlan>, ValidationError> {
        if plan.is_empty() {
            return Err(ValidationError::EmptyPlan(plan.trajectory_id));
        }

        self.ticks_since_install = 0;
        Ok(self.cur_plan.replace(plan))
    }

    /// Compute the next emission step.
    ///
    /// The first tick after installation emits the plan unchanged, every later tick consumes
    /// the leading point. A plan with one point left has been fully delivered and is exhausted
    /// instead of being trimmed to nothing.
    pub fn next_step(&self) -> Result<Step, TransformError> {
        let plan = match self.cur_plan {
            Some(ref p) => p,
            None => return Ok(Step::Idle),
        };

        if plan.is_empty() {
            return Ok(Step::Exhaust);
        }

        if self.ticks_since_install == 0 {
            return Ok(Step::Emit {
                plan: plan.clone(),
                ticks: 1,
            });
        }

        if plan.len() > 1 {
            Ok(Step::Emit {
                plan: trim_first_point(plan)?,
                ticks: self.ticks_since_install + 1,
            })
        }
        else {
            Ok(Step::Exhaust)
        }
    }

    /// Apply a step computed by [`ExecState::next_step`], returning the plan to emit if any.
    pub fn apply(&mut self, step: Step) -> Option<TrajectoryPlan> {
        match step {
            Step::Idle => None,
            Step::Emit { plan, ticks } => {
                self.ticks_since_install = ticks;
                self.cur_plan = Some(plan.clone());
                Some(plan)
            }
            Step::Exhaust => {
                self.cur_plan = None;
                self.ticks_since_install = 0;
                None
            }
        }
    }

    /// Compute and apply the next step.
    pub fn tick(&mut self) -> Result<Option<TrajectoryPlan>, TransformError> {
        let step = self.next_step()?;
        Ok(self.apply(step))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transform::test::line_plan;

    fn xs(plan: &TrajectoryPlan) -> Vec<f64> {
        plan.points.iter().map(|p| p.x_m).collect()
    }

    #[test]
    fn test_emission_sequence() {
        let mut state = ExecState::new();
        assert_eq!(state.mode(), Mode::Idle);

        state.install(line_plan("t1", "A", 3)).unwrap();
        assert_eq!(state.mode(), Mode::Active);
        assert_eq!(state.ticks_since_install(), 0);

        assert_eq!(xs(&state.tick().unwrap().unwrap()), vec![0.0, 1.0, 2.0]);
        assert_eq!(xs(&state.tick().unwrap().unwrap()), vec![1.0, 2.0]);
        assert_eq!(xs(&state.tick().unwrap().unwrap()), vec![2.0]);
        assert_eq!(state.ticks_since_install(), 3);

        assert_eq!(state.tick().unwrap(), None);
        assert_eq!(state.mode(), Mode::Idle);
        assert_eq!(state.ticks_since_install(), 0);

        // Further ticks are no-ops
        assert_eq!(state.tick().unwrap(), None);
        assert_eq!(state.mode(), Mode::Idle);
    }

    #[test]
    fn test_single_point_plan() {
        let mut state = ExecState::new();
        state.install(line_plan("t1", "A", 1)).unwrap();

        assert_eq!(state.tick().unwrap().map(|p| p.len()), Some(1));
        assert_eq!(state.tick().unwrap(), None);
        assert_eq!(state.mode(), Mode::Idle);
    }

    #[test]
    fn test_replacement_discards_remainder() {
        let mut state = ExecState::new();
        state.install(line_plan("old", "A", 4)).unwrap();
        state.tick().unwrap();
        state.tick().unwrap();

        let replaced = state.install(line_plan("new", "A", 2)).unwrap().unwrap();
        assert_eq!(replaced.trajectory_id, "old");
        assert_eq!(xs(&replaced), vec![1.0, 2.0, 3.0]);
        assert_eq!(state.ticks_since_install(), 0);

        // New plan is delivered in full first
        let emitted = state.tick().unwrap().unwrap();
        assert_eq!(emitted.trajectory_id, "new");
        assert_eq!(xs(&emitted), vec![0.0, 1.0]);

        let emitted = state.tick().unwrap().unwrap();
        assert_eq!(emitted.trajectory_id, "new");
        assert_eq!(xs(&emitted), vec![1.0]);

        assert_eq!(state.tick().unwrap(), None);
    }

    #[test]
    fn test_empty_plan_rejected() {
        let mut state = ExecState::new();

        // Idle stays idle
        assert_eq!(
            state.install(line_plan("empty", "A", 0)),
            Err(ValidationError::EmptyPlan("empty".into()))
        );
        assert_eq!(state.mode(), Mode::Idle);

        // Active plan continues unaffected
        state.install(line_plan("t1", "A", 3)).unwrap();
        state.tick().unwrap();
        assert!(state.install(line_plan("empty", "A", 0)).is_err());
        assert_eq!(state.current_plan().map(|p| p.trajectory_id.as_str()), Some("t1"));
        assert_eq!(state.ticks_since_install(), 1);
        assert_eq!(xs(&state.tick().unwrap().unwrap()), vec![1.0, 2.0]);
    }

    #[test]
    fn test_next_step_is_pure() {
        let mut state = ExecState::new();
        assert_eq!(state.next_step(), Ok(Step::Idle));

        state.install(line_plan("t1", "A", 2)).unwrap();
        state.tick().unwrap();

        let step = state.next_step().unwrap();
        assert_eq!(state.next_step().unwrap(), step);
        assert_eq!(state.current_plan().map(|p| p.len()), Some(2));

        match step {
            Step::Emit { ref plan, ticks } => {
                assert_eq!(plan.len(), 1);
                assert_eq!(ticks, 2);
            }
            ref s => panic!("Expected an emission, found {:?}", s),
        }
    }
}
