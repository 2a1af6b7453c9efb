//! Goal-conditioned kitchen environment.
//!
//! Wraps an external [`Simulator`] with a reset policy and an
//! [`EpisodeStateMachine`]. Observations are the object state followed by
//! the goal vector of the assigned tasks.

use std::sync::Arc;

use ndarray::{Array1, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::machine::{DoneReason, EpisodeConfig, EpisodeStateMachine};
use super::reset::{JointBound, ResetPolicy};
use super::variants::EnvVariant;
use crate::completion::CompletionEvaluator;
use crate::error::EpisodeError;
use crate::tasks::{GoalEncoder, TaskCatalog};

/// Physics collaborator.
///
/// The core never inspects simulator internals; it only needs the object
/// state after each transition.
pub trait Simulator {
    /// Returns the model to its nominal pose and reports the object state.
    fn reset(&mut self) -> Result<Array1<f64>, EpisodeError>;

    /// Applies one action and reports the new object state plus opaque info.
    fn step(
        &mut self,
        action: ArrayView1<'_, f64>,
    ) -> Result<(Array1<f64>, serde_json::Value), EpisodeError>;

    /// Position bounds of each controllable joint, in pose order.
    fn joint_bounds(&self) -> &[JointBound];

    /// Nominal starting pose.
    fn initial_pose(&self) -> Array1<f64>;

    /// Places the model in `pose` and reports the object state.
    fn set_pose(&mut self, pose: ArrayView1<'_, f64>) -> Result<Array1<f64>, EpisodeError>;
}

/// Per-step diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Assigned tasks completed so far this episode.
    pub completed_tasks: Vec<String>,
    /// Tasks credited on this step.
    pub newly_completed: Vec<String>,
    pub done_reason: Option<DoneReason>,
    /// Simulator-provided info, passed through untouched.
    pub sim: serde_json::Value,
}

/// Result of [`KitchenEnv::step`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnvStep {
    pub observation: Array1<f64>,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Kitchen environment driving one simulator.
pub struct KitchenEnv<S: Simulator> {
    sim: S,
    variant: EnvVariant,
    tasks: Vec<String>,
    machine: EpisodeStateMachine,
    goal: Array1<f64>,
    rng: ChaCha8Rng,
    started: bool,
}

impl<S: Simulator> KitchenEnv<S> {
    /// Builds an environment for a variant preset.
    ///
    /// The variant's step budget becomes the episode time limit. `seed` makes
    /// randomized resets reproducible.
    pub fn new(
        sim: S,
        variant: &EnvVariant,
        catalog: Arc<TaskCatalog>,
        evaluator: CompletionEvaluator,
        seed: Option<u64>,
    ) -> Result<Self, EpisodeError> {
        let config =
            EpisodeConfig::default().with_max_episode_steps(Some(variant.max_episode_steps));
        Self::with_config(sim, variant, catalog, evaluator, config, seed)
    }

    /// Builds an environment with an explicit episode configuration.
    pub fn with_config(
        sim: S,
        variant: &EnvVariant,
        catalog: Arc<TaskCatalog>,
        evaluator: CompletionEvaluator,
        config: EpisodeConfig,
        seed: Option<u64>,
    ) -> Result<Self, EpisodeError> {
        let tasks = variant.task_list();
        let goal = GoalEncoder::new(catalog).encode(&tasks)?;
        let machine = EpisodeStateMachine::new(evaluator, config, &tasks)?;
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };

        Ok(Self {
            sim,
            variant: variant.clone(),
            tasks,
            machine,
            goal,
            rng,
            started: false,
        })
    }

    /// Starts a new episode and returns the first observation.
    ///
    /// # Errors
    ///
    /// Fails if the simulator reports an object state narrower than the
    /// catalog requires.
    pub fn reset(&mut self) -> Result<Array1<f64>, EpisodeError> {
        self.started = false;
        let state = match self.variant.reset {
            ResetPolicy::Standard => self.sim.reset()?,
            ResetPolicy::Randomized(randomized) => {
                let pose = randomized.sample_pose(
                    self.sim.initial_pose().view(),
                    self.sim.joint_bounds(),
                    self.machine.evaluator().catalog(),
                    &self.tasks,
                    &mut self.rng,
                )?;
                self.sim.set_pose(pose.view())?
            }
        };
        self.machine
            .evaluator()
            .check_dims(state.view(), self.goal.view())?;
        self.machine.reset(&self.tasks)?;
        self.started = true;

        tracing::debug!(
            variant = self.variant.id,
            randomized = self.variant.reset.is_randomized(),
            "Episode reset"
        );

        Ok(self.observation(state.view()))
    }

    /// Applies an action and scores the resulting state.
    ///
    /// # Errors
    ///
    /// Returns `EpisodeError::NotReset` before the first [`reset`](Self::reset)
    /// and `EpisodeError::AlreadyDone` once the episode has ended.
    pub fn step(&mut self, action: ArrayView1<'_, f64>) -> Result<EnvStep, EpisodeError> {
        if !self.started {
            return Err(EpisodeError::NotReset);
        }
        if self.machine.is_done() {
            return Err(EpisodeError::AlreadyDone);
        }
        let (state, sim_info) = self.sim.step(action)?;
        // also rejects a short state before it reaches the observation
        let outcome = self.machine.step_default(state.view(), self.goal.view())?;

        if let Some(reason) = &outcome.done_reason {
            tracing::debug!(
                variant = self.variant.id,
                steps = self.machine.steps(),
                reason = ?reason,
                "Episode done"
            );
        }

        Ok(EnvStep {
            observation: self.observation(state.view()),
            reward: outcome.reward,
            done: outcome.done,
            info: StepInfo {
                completed_tasks: self.machine.completed_tasks(),
                newly_completed: outcome.completed_this_step,
                done_reason: outcome.done_reason,
                sim: sim_info,
            },
        })
    }

    /// Object state followed by the goal vector.
    pub fn observation(&self, object_state: ArrayView1<'_, f64>) -> Array1<f64> {
        let mut values = Vec::with_capacity(self.goal.len() * 2);
        values.extend(object_state.iter().take(self.goal.len()));
        values.extend(self.goal.iter());
        Array1::from(values)
    }

    pub fn goal(&self) -> &Array1<f64> {
        &self.goal
    }

    pub fn variant(&self) -> &EnvVariant {
        &self.variant
    }

    pub fn machine(&self) -> &EpisodeStateMachine {
        &self.machine
    }

    pub fn simulator(&self) -> &S {
        &self.sim
    }

    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.sim
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::EvaluationError;
    use crate::tasks::KITCHEN_STATE_DIM;

    /// Simulator whose action is added to the pose, one value per state index.
    pub(crate) struct AdditiveSim {
        pub pose: Array1<f64>,
        pub bounds: Vec<JointBound>,
        pub resets: usize,
        pub state_dim: usize,
    }

    impl AdditiveSim {
        pub(crate) fn new() -> Self {
            Self {
                pose: Array1::zeros(KITCHEN_STATE_DIM),
                bounds: vec![JointBound::new(-1.0, 1.0); 9],
                resets: 0,
                state_dim: KITCHEN_STATE_DIM,
            }
        }
    }

    impl Simulator for AdditiveSim {
        fn reset(&mut self) -> Result<Array1<f64>, EpisodeError> {
            self.resets += 1;
            self.pose = Array1::zeros(self.state_dim);
            Ok(self.pose.clone())
        }

        fn step(
            &mut self,
            action: ArrayView1<'_, f64>,
        ) -> Result<(Array1<f64>, serde_json::Value), EpisodeError> {
            if action.len() != self.pose.len() {
                return Err(EpisodeError::Simulator(format!(
                    "action has {} values, expected {}",
                    action.len(),
                    self.pose.len()
                )));
            }
            self.pose = &self.pose + &action;
            Ok((self.pose.clone(), serde_json::json!({"t": 1})))
        }

        fn joint_bounds(&self) -> &[JointBound] {
            &self.bounds
        }

        fn initial_pose(&self) -> Array1<f64> {
            Array1::zeros(KITCHEN_STATE_DIM)
        }

        fn set_pose(&mut self, pose: ArrayView1<'_, f64>) -> Result<Array1<f64>, EpisodeError> {
            self.pose = pose.to_owned();
            Ok(self.pose.clone())
        }
    }

    fn env(variant_id: &str) -> KitchenEnv<AdditiveSim> {
        env_with(variant_id, AdditiveSim::new())
    }

    fn env_with(variant_id: &str, sim: AdditiveSim) -> KitchenEnv<AdditiveSim> {
        let catalog = Arc::new(TaskCatalog::kitchen());
        let variant = EnvVariant::lookup(variant_id).unwrap();
        KitchenEnv::new(
            sim,
            variant,
            catalog.clone(),
            CompletionEvaluator::new(catalog),
            Some(42),
        )
        .unwrap()
    }

    /// Action moving every index of `task` onto its target from the current pose.
    fn move_to_target(env: &KitchenEnv<AdditiveSim>, task: &str) -> Array1<f64> {
        let catalog = TaskCatalog::kitchen();
        let spec = catalog.get(task).unwrap();
        let mut action = Array1::zeros(KITCHEN_STATE_DIM);
        for (&i, &t) in spec.indices.iter().zip(&spec.target) {
            action[i] = t - env.simulator().pose[i];
        }
        action
    }

    #[test]
    fn test_observation_is_state_then_goal() {
        let mut env = env("kitchen-2-SC-v0");
        let obs = env.reset().unwrap();
        assert_eq!(obs.len(), 60);
        assert!((obs[30 + 19] - 0.37).abs() < f64::EPSILON);
        assert_eq!(env.simulator().resets, 1);
    }

    #[test]
    fn test_single_task_episode_success() {
        let mut env = env("kitchen-2-MW-v0");
        env.reset().unwrap();

        let noop = Array1::zeros(KITCHEN_STATE_DIM);
        let step = env.step(noop.view()).unwrap();
        assert_eq!(step.reward, 0.0);
        assert!(!step.done);

        let action = move_to_target(&env, "microwave");
        let step = env.step(action.view()).unwrap();
        assert_eq!(step.reward, 1.0);
        assert!(step.done);
        assert_eq!(step.info.completed_tasks, vec!["microwave".to_string()]);
        assert_eq!(step.info.done_reason, Some(DoneReason::TasksComplete));
        assert_eq!(step.info.sim["t"], 1);

        assert!(matches!(
            env.step(noop.view()),
            Err(EpisodeError::AlreadyDone)
        ));
    }

    #[test]
    fn test_time_limit_from_variant() {
        let mut env = env("kitchen-2-KET-v0");
        env.reset().unwrap();
        let noop = Array1::zeros(KITCHEN_STATE_DIM);
        let mut last = None;
        for _ in 0..50 {
            last = Some(env.step(noop.view()).unwrap());
        }
        let last = last.unwrap();
        assert!(last.done);
        assert_eq!(last.info.done_reason, Some(DoneReason::TimeLimit));
    }

    #[test]
    fn test_randomized_reset_uses_set_pose() {
        let mut env = env("kitchen-2-KET-rand-v0");
        let obs = env.reset().unwrap();
        assert_eq!(env.simulator().resets, 0, "randomized reset bypasses sim.reset");
        assert_eq!(obs[7], obs[8]);
        // kettle is assigned: untouched
        for i in 23..=29 {
            assert_eq!(obs[i], 0.0);
        }
    }

    #[test]
    fn test_simulator_errors_propagate() {
        let mut env = env("kitchen-2-MW-v0");
        env.reset().unwrap();
        let bad = Array1::zeros(3);
        assert!(matches!(
            env.step(bad.view()),
            Err(EpisodeError::Simulator(_))
        ));
    }

    #[test]
    fn test_short_state_rejected_at_reset() {
        let mut sim = AdditiveSim::new();
        sim.state_dim = 12;
        let mut env = env_with("kitchen-2-MW-v0", sim);
        let err = env.reset().unwrap_err();
        assert!(matches!(
            err,
            EpisodeError::Evaluation(EvaluationError::StateTooShort {
                expected: 30,
                actual: 12
            })
        ));

        // the episode never started
        let noop = Array1::zeros(12);
        assert!(matches!(env.step(noop.view()), Err(EpisodeError::NotReset)));
    }

    #[test]
    fn test_short_state_rejected_at_step() {
        let mut env = env("kitchen-2-MW-v0");
        env.reset().unwrap();
        env.simulator_mut().pose = Array1::zeros(12);
        let noop = Array1::zeros(12);
        assert!(matches!(
            env.step(noop.view()),
            Err(EpisodeError::Evaluation(EvaluationError::StateTooShort { .. }))
        ));
    }

    #[test]
    fn test_step_before_reset_rejected() {
        let mut env = env("kitchen-2-MW-v0");
        let noop = Array1::zeros(KITCHEN_STATE_DIM);
        assert!(matches!(env.step(noop.view()), Err(EpisodeError::NotReset)));
        assert_eq!(env.simulator().resets, 0);

        env.reset().unwrap();
        assert!(env.step(noop.view()).is_ok());
    }
}
