//! Episode state machine.
//!
//! Owns the ordered queue of tasks still required in the current episode,
//! applies the completion evaluator every step and decides termination.
//!
//! # Termination
//!
//! - **Success**: the episode is done on the exact step its queue becomes
//!   empty (only reachable when completed tasks are removed).
//! - **Wrong completion** (opt-in): every catalog task outside the assigned
//!   list is checked against the full-catalog goal each step; any such task
//!   within tolerance ends the episode. The check does not look at where the
//!   object started, so an object that begins near its target can end an
//!   episode on its first step.
//! - **Time limit** (opt-in): the episode ends after a fixed number of steps.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::completion::CompletionEvaluator;
use crate::error::EpisodeError;
use crate::tasks::GoalEncoder;

/// Lifecycle state of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeStatus {
    /// Steps are accepted.
    Active,
    /// Terminal; only `reset` leaves this state.
    Done,
}

/// Why an episode ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DoneReason {
    /// Every assigned task was completed in order.
    TasksComplete,
    /// A task outside the assigned list reached its target.
    WrongTaskCompleted { task: String },
    /// The step budget ran out.
    TimeLimit,
}

/// Termination and bookkeeping policy for an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeConfig {
    /// Remove tasks from the queue once credited.
    pub remove_tasks_when_complete: bool,
    /// End the episode when the queue is empty.
    pub terminate_on_task_complete: bool,
    /// End the episode when a non-assigned task reaches its target.
    pub terminate_on_wrong_complete: bool,
    /// Optional step budget.
    pub max_episode_steps: Option<u32>,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            remove_tasks_when_complete: true,
            terminate_on_task_complete: true,
            terminate_on_wrong_complete: false,
            max_episode_steps: None,
        }
    }
}

impl EpisodeConfig {
    /// Builder method to set queue removal.
    pub fn with_remove_tasks_when_complete(mut self, remove: bool) -> Self {
        self.remove_tasks_when_complete = remove;
        self
    }

    /// Builder method to set success termination.
    pub fn with_terminate_on_task_complete(mut self, terminate: bool) -> Self {
        self.terminate_on_task_complete = terminate;
        self
    }

    /// Builder method to set wrong-completion termination.
    pub fn with_terminate_on_wrong_complete(mut self, terminate: bool) -> Self {
        self.terminate_on_wrong_complete = terminate;
        self
    }

    /// Builder method to set the step budget.
    pub fn with_max_episode_steps(mut self, steps: Option<u32>) -> Self {
        self.max_episode_steps = steps;
        self
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Number of tasks credited on this step.
    pub reward: f64,
    /// Whether the episode is now done.
    pub done: bool,
    /// Tasks credited on this step, in queue order.
    pub completed_this_step: Vec<String>,
    /// Set when `done` is true.
    pub done_reason: Option<DoneReason>,
}

/// Per-episode completion state machine.
#[derive(Debug, Clone)]
pub struct EpisodeStateMachine {
    evaluator: CompletionEvaluator,
    encoder: GoalEncoder,
    config: EpisodeConfig,
    assigned: Vec<String>,
    queue: Vec<String>,
    status: EpisodeStatus,
    steps: u32,
}

impl EpisodeStateMachine {
    /// Creates an active machine for the given task list.
    ///
    /// # Errors
    ///
    /// Fails if a task name is not in the evaluator's catalog.
    pub fn new<S: AsRef<str>>(
        evaluator: CompletionEvaluator,
        config: EpisodeConfig,
        tasks: &[S],
    ) -> Result<Self, EpisodeError> {
        let encoder = GoalEncoder::new(evaluator.catalog().clone());
        let mut machine = Self {
            evaluator,
            encoder,
            config,
            assigned: Vec::new(),
            queue: Vec::new(),
            status: EpisodeStatus::Active,
            steps: 0,
        };
        machine.reset(tasks)?;
        Ok(machine)
    }

    /// Starts a new episode: the queue becomes a copy of `tasks`.
    pub fn reset<S: AsRef<str>>(&mut self, tasks: &[S]) -> Result<(), EpisodeError> {
        self.evaluator.catalog().check_names(tasks)?;
        self.assigned = tasks.iter().map(|t| t.as_ref().to_string()).collect();
        self.queue = self.assigned.clone();
        self.status = EpisodeStatus::Active;
        self.steps = 0;
        Ok(())
    }

    /// Advances the episode by one evaluation.
    ///
    /// # Errors
    ///
    /// Returns `EpisodeError::AlreadyDone` after termination, or an
    /// evaluation error for malformed vectors.
    pub fn step(
        &mut self,
        object_state: ArrayView1<'_, f64>,
        goal: ArrayView1<'_, f64>,
        remove_on_complete: bool,
    ) -> Result<StepOutcome, EpisodeError> {
        if self.status == EpisodeStatus::Done {
            return Err(EpisodeError::AlreadyDone);
        }

        let completion = self.evaluator.evaluate(object_state, goal, &self.queue)?;
        if remove_on_complete {
            // credited tasks are always the queue's leading run
            self.queue.drain(..completion.score);
        }
        self.steps += 1;

        let mut done_reason = None;
        if self.config.terminate_on_task_complete && self.queue.is_empty() {
            done_reason = Some(DoneReason::TasksComplete);
        }
        if self.config.terminate_on_wrong_complete && done_reason.is_none() {
            if let Some(task) = self.wrong_task_completed(object_state)? {
                tracing::debug!(task = %task, step = self.steps, "Non-assigned task completed");
                done_reason = Some(DoneReason::WrongTaskCompleted { task });
            }
        }
        if done_reason.is_none() {
            if let Some(limit) = self.config.max_episode_steps {
                if self.steps >= limit {
                    done_reason = Some(DoneReason::TimeLimit);
                }
            }
        }

        let done = done_reason.is_some();
        if done {
            self.status = EpisodeStatus::Done;
        }

        Ok(StepOutcome {
            reward: completion.reward(),
            done,
            completed_this_step: completion.newly_completed,
            done_reason,
        })
    }

    /// Steps with the configured removal policy.
    pub fn step_default(
        &mut self,
        object_state: ArrayView1<'_, f64>,
        goal: ArrayView1<'_, f64>,
    ) -> Result<StepOutcome, EpisodeError> {
        let remove = self.config.remove_tasks_when_complete;
        self.step(object_state, goal, remove)
    }

    /// First non-assigned catalog task (catalog order) within tolerance of its target.
    pub fn wrong_task_completed(
        &self,
        object_state: ArrayView1<'_, f64>,
    ) -> Result<Option<String>, EpisodeError> {
        let all_goal = self.encoder.encode_all();
        self.evaluator.check_dims(object_state, all_goal.view())?;
        for task in self.evaluator.catalog().names() {
            if self.assigned.iter().any(|a| a == task) {
                continue;
            }
            if self
                .evaluator
                .is_achieved(task, object_state, all_goal.view())?
            {
                return Ok(Some(task.to_string()));
            }
        }
        Ok(None)
    }

    /// Assigned tasks no longer in the queue, in assignment order.
    pub fn completed_tasks(&self) -> Vec<String> {
        self.assigned
            .iter()
            .filter(|t| !self.queue.contains(t))
            .cloned()
            .collect()
    }

    /// Tasks still required, in order.
    pub fn queue(&self) -> &[String] {
        &self.queue
    }

    /// Task list of the current episode.
    pub fn assigned(&self) -> &[String] {
        &self.assigned
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status == EpisodeStatus::Done
    }

    /// Steps taken since the last reset.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn config(&self) -> &EpisodeConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &CompletionEvaluator {
        &self.evaluator
    }
}
