//! Ordered sub-task completion evaluation.
//!
//! Given the current object state, a goal vector and the ordered list of
//! tasks still required, the evaluator reports which prefix of that list is
//! within tolerance of its targets. A task that is achieved out of order is
//! not credited until every task before it is achieved in the same
//! evaluation.

use std::sync::Arc;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::error::EvaluationError;
use crate::tasks::TaskCatalog;

/// Distance below which a task counts as achieved, in the benchmark's native units.
pub const DEFAULT_TOLERANCE: f64 = 0.3;

/// Result of one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Tasks credited by this evaluation, in list order.
    pub newly_completed: Vec<String>,

    /// Number of credited tasks.
    pub score: usize,
}

impl Completion {
    /// Score as a reward value.
    pub fn reward(&self) -> f64 {
        self.score as f64
    }
}

/// Stateless, deterministic completion evaluator.
#[derive(Debug, Clone)]
pub struct CompletionEvaluator {
    catalog: Arc<TaskCatalog>,
    tolerance: f64,
}

impl CompletionEvaluator {
    /// Creates an evaluator with the default tolerance.
    pub fn new(catalog: Arc<TaskCatalog>) -> Self {
        Self {
            catalog,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Replaces the tolerance.
    ///
    /// # Errors
    ///
    /// Returns `EvaluationError::InvalidTolerance` unless the value is finite and positive.
    pub fn with_tolerance(mut self, tolerance: f64) -> Result<Self, EvaluationError> {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(EvaluationError::InvalidTolerance(tolerance));
        }
        self.tolerance = tolerance;
        Ok(self)
    }

    /// Achievement tolerance.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The catalog tasks are looked up in.
    pub fn catalog(&self) -> &Arc<TaskCatalog> {
        &self.catalog
    }

    /// Checks that both vectors cover every catalog index.
    pub fn check_dims(
        &self,
        object_state: ArrayView1<'_, f64>,
        goal: ArrayView1<'_, f64>,
    ) -> Result<(), EvaluationError> {
        let expected = self.catalog.required_dim();
        if object_state.len() < expected {
            return Err(EvaluationError::StateTooShort {
                expected,
                actual: object_state.len(),
            });
        }
        if goal.len() < expected {
            return Err(EvaluationError::GoalTooShort {
                expected,
                actual: goal.len(),
            });
        }
        Ok(())
    }

    /// Euclidean distance between the state and goal slices of one task.
    ///
    /// Callers must have checked dimensions with [`check_dims`](Self::check_dims).
    pub fn distance(
        &self,
        task: &str,
        object_state: ArrayView1<'_, f64>,
        goal: ArrayView1<'_, f64>,
    ) -> Result<f64, EvaluationError> {
        let spec = self.catalog.get(task)?;
        let squared: f64 = spec
            .indices
            .iter()
            .map(|&i| {
                let diff = object_state[i] - goal[i];
                diff * diff
            })
            .sum();
        Ok(squared.sqrt())
    }

    /// Whether one task is within tolerance of its goal slice.
    pub fn is_achieved(
        &self,
        task: &str,
        object_state: ArrayView1<'_, f64>,
        goal: ArrayView1<'_, f64>,
    ) -> Result<bool, EvaluationError> {
        Ok(self.distance(task, object_state, goal)? < self.tolerance)
    }

    /// Evaluates the remaining tasks in order.
    ///
    /// Every remaining task is measured, but only the leading run of
    /// achieved tasks is credited.
    ///
    /// # Errors
    ///
    /// Fails on an unknown task name or a vector shorter than the catalog requires.
    pub fn evaluate<S: AsRef<str>>(
        &self,
        object_state: ArrayView1<'_, f64>,
        goal: ArrayView1<'_, f64>,
        remaining: &[S],
    ) -> Result<Completion, EvaluationError> {
        self.check_dims(object_state, goal)?;

        let mut newly_completed = Vec::new();
        let mut all_completed_so_far = true;
        for task in remaining {
            let task = task.as_ref();
            let achieved = self.is_achieved(task, object_state, goal)?;
            if achieved && all_completed_so_far {
                newly_completed.push(task.to_string());
            }
            all_completed_so_far = all_completed_so_far && achieved;
        }

        let score = newly_completed.len();
        Ok(Completion {
            newly_completed,
            score,
        })
    }
}
