//! kitchen-forge: goal-conditioned task completion and offline relabeling for
//! the kitchen manipulation benchmark.
//!
//! This library provides the ordered sub-task completion evaluator, the
//! per-episode state machine and environment wrapper, and the pipeline that
//! relabels recorded demonstrations into goal-conditioned datasets.

// Core modules
pub mod cli;
pub mod completion;
pub mod episode;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod tasks;
pub mod trajectory;

// Re-export commonly used types
pub use completion::{Completion, CompletionEvaluator, DEFAULT_TOLERANCE};
pub use error::{CatalogError, EpisodeError, EvaluationError, ExportError, RelabelError};
pub use tasks::{GoalEncoder, TaskCatalog, TaskSpec};
