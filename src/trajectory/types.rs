//! Trajectory data types for relabeling.
//!
//! A [`RawLog`] is a recorded demonstration: per-step state, observation,
//! action and terminal flag, with no reward for any particular goal. An
//! [`EpisodeRecord`] is one terminal-delimited run of a raw log, annotated
//! with a freshly computed reward stream and the goal used to produce it.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::RelabelError;

/// On-disk layout of a raw log (one row per step).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLogFile {
    /// Full simulator state per step.
    pub states: Vec<Vec<f64>>,

    /// Observation per step: object state followed by the recorded goal.
    pub observations: Vec<Vec<f64>>,

    /// Action per step.
    pub actions: Vec<Vec<f64>>,

    /// Episode boundary flags; missing means no boundary was recorded.
    #[serde(default)]
    pub terminals: Vec<bool>,
}

/// A recorded demonstration log. Immutable once read.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLog {
    name: String,
    states: Array2<f64>,
    observations: Array2<f64>,
    actions: Array2<f64>,
    terminals: Vec<bool>,
}

/// Borrowed view of one recorded step.
#[derive(Debug, Clone, Copy)]
pub struct StepRecord<'a> {
    pub state: ArrayView1<'a, f64>,
    pub observation: ArrayView1<'a, f64>,
    pub action: ArrayView1<'a, f64>,
    pub terminal: bool,
}

impl RawLog {
    /// Creates a log from per-field matrices (one row per step).
    ///
    /// # Errors
    ///
    /// Returns `RelabelError::DataIntegrity` when the fields disagree on the
    /// number of steps.
    pub fn new(
        name: impl Into<String>,
        states: Array2<f64>,
        observations: Array2<f64>,
        actions: Array2<f64>,
        terminals: Vec<bool>,
    ) -> Result<Self, RelabelError> {
        let name = name.into();
        let steps = observations.nrows();
        if states.nrows() != steps || actions.nrows() != steps || terminals.len() != steps {
            return Err(RelabelError::DataIntegrity {
                log: name,
                reason: format!(
                    "field lengths differ: states={}, observations={}, actions={}, terminals={}",
                    states.nrows(),
                    steps,
                    actions.nrows(),
                    terminals.len()
                ),
            });
        }
        Ok(Self {
            name,
            states,
            observations,
            actions,
            terminals,
        })
    }

    /// Converts the on-disk row layout into a log.
    ///
    /// A file without any `terminals` entries is read as "no boundary
    /// recorded" (all false); rows of a field must share one width.
    pub fn from_file(name: impl Into<String>, file: RawLogFile) -> Result<Self, RelabelError> {
        let name = name.into();
        let steps = file.observations.len();
        let terminals = if file.terminals.is_empty() {
            vec![false; steps]
        } else {
            file.terminals
        };
        let states = rows_to_matrix(&name, "states", file.states)?;
        let observations = rows_to_matrix(&name, "observations", file.observations)?;
        let actions = rows_to_matrix(&name, "actions", file.actions)?;
        Self::new(name, states, observations, actions, terminals)
    }

    /// Converts back to the on-disk row layout.
    pub fn to_file(&self) -> RawLogFile {
        RawLogFile {
            states: matrix_to_rows(&self.states),
            observations: matrix_to_rows(&self.observations),
            actions: matrix_to_rows(&self.actions),
            terminals: self.terminals.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.terminals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }

    pub fn states(&self) -> &Array2<f64> {
        &self.states
    }

    pub fn observations(&self) -> &Array2<f64> {
        &self.observations
    }

    pub fn actions(&self) -> &Array2<f64> {
        &self.actions
    }

    pub fn terminals(&self) -> &[bool] {
        &self.terminals
    }

    /// Width of each observation row.
    pub fn observation_dim(&self) -> usize {
        self.observations.ncols()
    }

    /// Indices of steps flagged terminal, ascending.
    pub fn terminal_indices(&self) -> Vec<usize> {
        self.terminals
            .iter()
            .enumerate()
            .filter_map(|(i, &t)| t.then_some(i))
            .collect()
    }

    /// Step `index`, if in range.
    pub fn step(&self, index: usize) -> Option<StepRecord<'_>> {
        if index >= self.len() {
            return None;
        }
        Some(StepRecord {
            state: self.states.row(index),
            observation: self.observations.row(index),
            action: self.actions.row(index),
            terminal: self.terminals[index],
        })
    }

    /// Iterates over all steps in order.
    pub fn steps(&self) -> impl Iterator<Item = StepRecord<'_>> {
        (0..self.len()).filter_map(move |i| self.step(i))
    }
}

/// One relabeled episode. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRecord {
    log_index: u32,
    states: Array2<f64>,
    observations: Array2<f64>,
    actions: Array2<f64>,
    rewards: Vec<f64>,
    terminals: Vec<bool>,
    goal: Array1<f64>,
}

impl EpisodeRecord {
    /// Builds an episode; the last step is marked terminal and every other step is not.
    pub(crate) fn new(
        log_index: u32,
        states: Array2<f64>,
        observations: Array2<f64>,
        actions: Array2<f64>,
        rewards: Vec<f64>,
        goal: Array1<f64>,
    ) -> Self {
        let len = rewards.len();
        let terminals = (0..len).map(|i| i + 1 == len).collect();
        Self {
            log_index,
            states,
            observations,
            actions,
            rewards,
            terminals,
            goal,
        }
    }

    /// Rebuilds an episode read back from an exported dataset.
    pub(crate) fn from_parts(
        log_index: u32,
        states: Array2<f64>,
        observations: Array2<f64>,
        actions: Array2<f64>,
        rewards: Vec<f64>,
        terminals: Vec<bool>,
        goal: Array1<f64>,
    ) -> Self {
        Self {
            log_index,
            states,
            observations,
            actions,
            rewards,
            terminals,
            goal,
        }
    }

    /// Index of the raw log this episode came from.
    pub fn log_index(&self) -> u32 {
        self.log_index
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn states(&self) -> &Array2<f64> {
        &self.states
    }

    pub fn observations(&self) -> &Array2<f64> {
        &self.observations
    }

    pub fn actions(&self) -> &Array2<f64> {
        &self.actions
    }

    pub fn rewards(&self) -> &[f64] {
        &self.rewards
    }

    pub fn terminals(&self) -> &[bool] {
        &self.terminals
    }

    /// Goal vector the rewards were computed against.
    pub fn goal(&self) -> &Array1<f64> {
        &self.goal
    }

    /// Sum of per-step rewards.
    pub fn reward_sum(&self) -> f64 {
        self.rewards.iter().sum()
    }

    /// Reward of the terminal step.
    pub fn final_reward(&self) -> f64 {
        self.rewards.last().copied().unwrap_or(0.0)
    }

    /// Observation of the terminal step.
    pub fn final_observation(&self) -> Option<ArrayView1<'_, f64>> {
        self.len()
            .checked_sub(1)
            .map(|last| self.observations.row(last))
    }
}

fn rows_to_matrix(log: &str, field: &str, rows: Vec<Vec<f64>>) -> Result<Array2<f64>, RelabelError> {
    let steps = rows.len();
    let width = rows.first().map(Vec::len).unwrap_or(0);
    let mut flat = Vec::with_capacity(steps * width);
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != width {
            return Err(RelabelError::DataIntegrity {
                log: log.to_string(),
                reason: format!(
                    "{} row {} has {} values, expected {}",
                    field,
                    i,
                    row.len(),
                    width
                ),
            });
        }
        flat.extend(row);
    }
    Array2::from_shape_vec((steps, width), flat).map_err(|e| RelabelError::DataIntegrity {
        log: log.to_string(),
        reason: format!("{}: {}", field, e),
    })
}

fn matrix_to_rows(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.rows().into_iter().map(|r| r.to_vec()).collect()
}
