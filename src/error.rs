//! Error types for kitchen-forge operations.
//!
//! Defines error types for each subsystem:
//! - Task catalog loading and validation
//! - Completion evaluation
//! - Episode stepping and simulator interaction
//! - Dataset relabeling
//! - Dataset export (Parquet)

use thiserror::Error;

/// Errors raised while building, validating or querying a task catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Unknown task '{0}'")]
    UnknownTask(String),

    #[error("Task '{0}' is defined more than once")]
    DuplicateTask(String),

    #[error("Task '{0}' has an empty index range")]
    EmptyIndexRange(String),

    #[error("Task '{task}' has {indices} indices but {targets} target values")]
    TargetLengthMismatch {
        task: String,
        indices: usize,
        targets: usize,
    },

    #[error("Task '{task}' index {index} is outside the object state (dimension {state_dim})")]
    IndexOutOfBounds {
        task: String,
        index: usize,
        state_dim: usize,
    },

    #[error("Tasks '{first}' and '{second}' overlap at object state index {index}")]
    OverlappingRanges {
        first: String,
        second: String,
        index: usize,
    },

    #[error("Object state dimension must be greater than 0")]
    ZeroStateDim,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised by the completion evaluator.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Object state has {actual} values but the catalog requires {expected}")]
    StateTooShort { expected: usize, actual: usize },

    #[error("Goal vector has {actual} values but the catalog requires {expected}")]
    GoalTooShort { expected: usize, actual: usize },

    #[error("Tolerance must be a positive finite number, got {0}")]
    InvalidTolerance(f64),
}

/// Errors raised while driving an episode.
#[derive(Debug, Error)]
pub enum EpisodeError {
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Episode is already done; call reset before stepping again")]
    AlreadyDone,

    #[error("Environment has not been reset; call reset before the first step")]
    NotReset,

    #[error("Unknown environment variant '{0}'")]
    UnknownVariant(String),

    #[error("Reset pose has {actual} values but {expected} are required")]
    PoseTooShort { expected: usize, actual: usize },

    #[error("Invalid joint bound for joint {joint}: [{low}, {high}]")]
    InvalidJointBound { joint: usize, low: f64, high: f64 },

    #[error("Simulator error: {0}")]
    Simulator(String),
}

/// Errors raised by the relabeling pipeline.
#[derive(Debug, Error)]
pub enum RelabelError {
    #[error("Data integrity error in log '{log}': {reason}")]
    DataIntegrity { log: String, reason: String },

    #[error("Log '{0}' has no terminal flag")]
    NoTerminal(String),

    #[error("Log '{0}' is empty")]
    EmptyLog(String),

    #[error("No raw logs found")]
    NoLogs,

    #[error("All {failed} logs failed to relabel")]
    AllLogsFailed { failed: usize },

    #[error(transparent)]
    Config(#[from] crate::pipeline::config::ConfigError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Invalid exclusion pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while exporting or loading a relabeled dataset.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No steps to export")]
    NoSteps,

    #[error("Invalid dataset format: {0}")]
    InvalidFormat(String),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_display() {
        let err = CatalogError::UnknownTask("oven".to_string());
        assert!(err.to_string().contains("oven"));

        let err = CatalogError::OverlappingRanges {
            first: "kettle".to_string(),
            second: "microwave".to_string(),
            index: 22,
        };
        let msg = err.to_string();
        assert!(msg.contains("kettle"));
        assert!(msg.contains("microwave"));
        assert!(msg.contains("22"));
    }

    #[test]
    fn test_evaluation_error_wraps_catalog() {
        let err: EvaluationError = CatalogError::UnknownTask("sink".to_string()).into();
        assert!(matches!(err, EvaluationError::Catalog(_)));
        assert!(err.to_string().contains("sink"));
    }

    #[test]
    fn test_relabel_error_display() {
        let err = RelabelError::DataIntegrity {
            log: "demo_0".to_string(),
            reason: "field lengths differ".to_string(),
        };
        assert!(err.to_string().contains("demo_0"));
        assert!(err.to_string().contains("field lengths differ"));

        let err = RelabelError::AllLogsFailed { failed: 3 };
        assert!(err.to_string().contains('3'));
    }
}
