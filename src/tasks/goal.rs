//! Goal encoding: task names to goal vectors.

use std::sync::Arc;

use ndarray::Array1;

use super::catalog::TaskCatalog;
use crate::error::CatalogError;

/// Maps a set of catalog tasks to a goal vector.
///
/// The goal vector has the object-state length and is zero everywhere except
/// the index ranges of the requested tasks, which hold their targets. The
/// output is keyed by index, so input order and duplicates do not matter.
#[derive(Debug, Clone)]
pub struct GoalEncoder {
    catalog: Arc<TaskCatalog>,
}

impl GoalEncoder {
    /// Creates an encoder over a validated catalog.
    pub fn new(catalog: Arc<TaskCatalog>) -> Self {
        Self { catalog }
    }

    /// The catalog this encoder writes targets from.
    pub fn catalog(&self) -> &Arc<TaskCatalog> {
        &self.catalog
    }

    /// Encodes the given tasks into a fresh goal vector.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownTask` for a name not in the catalog.
    pub fn encode<S: AsRef<str>>(&self, tasks: &[S]) -> Result<Array1<f64>, CatalogError> {
        let mut goal = Array1::zeros(self.catalog.state_dim());
        for name in tasks {
            let task = self.catalog.get(name.as_ref())?;
            for (&index, &value) in task.indices.iter().zip(&task.target) {
                goal[index] = value;
            }
        }
        Ok(goal)
    }

    /// Encodes every catalog task.
    pub fn encode_all(&self) -> Array1<f64> {
        let mut goal = Array1::zeros(self.catalog.state_dim());
        for task in self.catalog.tasks() {
            for (&index, &value) in task.indices.iter().zip(&task.target) {
                goal[index] = value;
            }
        }
        goal
    }
}
