//! Relabeling configuration.
//!
//! This module provides configuration options for the relabeling pipeline:
//! the target task assignment, completion tolerance, observation layout,
//! terminal handling and raw log discovery.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::completion::DEFAULT_TOLERANCE;
use crate::tasks::{DEFAULT_TARGET_TASKS, KITCHEN_STATE_DIM};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// What to do with a raw log that has no terminal flag at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingTerminalPolicy {
    /// Fail the log with a data-integrity error.
    #[default]
    Fail,
    /// Warn, record the warning in the run report and treat the last step as terminal.
    WarnAndTerminate,
}

impl FromStr for MissingTerminalPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "warn-and-terminate" | "warn" => Ok(Self::WarnAndTerminate),
            _ => Err(ConfigError::InvalidValue {
                key: "missing_terminal".to_string(),
                message: format!("expected 'fail' or 'warn-and-terminate', got '{}'", s),
            }),
        }
    }
}

impl fmt::Display for MissingTerminalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::WarnAndTerminate => write!(f, "warn-and-terminate"),
        }
    }
}

/// Where each relabeled episode ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminalMode {
    /// Keep every step up to the recorded terminal.
    #[default]
    LastStep,
    /// Truncate at the first step where every target task is achieved,
    /// falling back to the recorded terminal.
    FirstSuccess,
}

impl FromStr for TerminalMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last-step" => Ok(Self::LastStep),
            "first-success" => Ok(Self::FirstSuccess),
            _ => Err(ConfigError::InvalidValue {
                key: "terminal_mode".to_string(),
                message: format!("expected 'last-step' or 'first-success', got '{}'", s),
            }),
        }
    }
}

impl fmt::Display for TerminalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastStep => write!(f, "last-step"),
            Self::FirstSuccess => write!(f, "first-success"),
        }
    }
}

/// Configuration for the relabeling pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelabelConfig {
    // Goal settings
    /// Ordered target task assignment written into every observation.
    pub target_tasks: Vec<String>,
    /// Completion tolerance on the per-task L2 distance.
    pub tolerance: f64,
    /// Optional YAML task catalog; the built-in kitchen table when unset.
    pub catalog_path: Option<PathBuf>,

    // Observation layout
    /// Width of the object state and of the goal region.
    pub state_dim: usize,
    /// Offset of the goal region inside each observation.
    pub goal_offset: usize,

    // Terminal handling
    /// Policy for logs without any terminal flag.
    pub missing_terminal: MissingTerminalPolicy,
    /// Where relabeled episodes end.
    pub terminal_mode: TerminalMode,
    /// Episodes shorter than this are dropped.
    pub min_episode_len: usize,
    /// Abort the run on the first failed log instead of continuing.
    pub fail_fast: bool,

    // Discovery
    /// Raw log file extension, without the dot.
    pub log_extension: String,
    /// Paths matching this regex are skipped during discovery.
    pub exclude_pattern: Option<String>,
}

impl Default for RelabelConfig {
    fn default() -> Self {
        Self {
            target_tasks: DEFAULT_TARGET_TASKS.iter().map(|t| t.to_string()).collect(),
            tolerance: DEFAULT_TOLERANCE,
            catalog_path: None,

            state_dim: KITCHEN_STATE_DIM,
            goal_offset: KITCHEN_STATE_DIM,

            missing_terminal: MissingTerminalPolicy::Fail,
            terminal_mode: TerminalMode::LastStep,
            min_episode_len: 1,
            fail_fast: false,

            log_extension: "json".to_string(),
            exclude_pattern: None,
        }
    }
}

impl RelabelConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RELABEL_TASKS`: Comma-separated target tasks (default: microwave,kettle,bottom burner,light switch)
    /// - `RELABEL_TOLERANCE`: Completion tolerance (default: 0.3)
    /// - `RELABEL_CATALOG`: Path to a YAML task catalog
    /// - `RELABEL_STATE_DIM`: Object state width (default: 30)
    /// - `RELABEL_GOAL_OFFSET`: Goal region offset in observations (default: 30)
    /// - `RELABEL_MISSING_TERMINAL`: `fail` or `warn-and-terminate` (default: fail)
    /// - `RELABEL_TERMINAL_MODE`: `last-step` or `first-success` (default: last-step)
    /// - `RELABEL_MIN_EPISODE_LEN`: Minimum episode length (default: 1)
    /// - `RELABEL_FAIL_FAST`: Abort on the first failed log (default: false)
    /// - `RELABEL_LOG_EXTENSION`: Raw log file extension (default: json)
    /// - `RELABEL_EXCLUDE`: Exclusion regex for discovered paths
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup, using the same
    /// keys as [`RelabelConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Goal settings
        if let Some(val) = lookup("RELABEL_TASKS") {
            config.target_tasks = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(val) = lookup("RELABEL_TOLERANCE") {
            config.tolerance = parse_env_value(&val, "RELABEL_TOLERANCE")?;
        }

        if let Some(val) = lookup("RELABEL_CATALOG") {
            config.catalog_path = Some(PathBuf::from(val));
        }

        // Observation layout
        if let Some(val) = lookup("RELABEL_STATE_DIM") {
            config.state_dim = parse_env_value(&val, "RELABEL_STATE_DIM")?;
        }

        if let Some(val) = lookup("RELABEL_GOAL_OFFSET") {
            config.goal_offset = parse_env_value(&val, "RELABEL_GOAL_OFFSET")?;
        }

        // Terminal handling
        if let Some(val) = lookup("RELABEL_MISSING_TERMINAL") {
            config.missing_terminal = val.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RELABEL_MISSING_TERMINAL".to_string(),
                message: format!("could not parse '{}'", val),
            })?;
        }

        if let Some(val) = lookup("RELABEL_TERMINAL_MODE") {
            config.terminal_mode = val.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RELABEL_TERMINAL_MODE".to_string(),
                message: format!("could not parse '{}'", val),
            })?;
        }

        if let Some(val) = lookup("RELABEL_MIN_EPISODE_LEN") {
            config.min_episode_len = parse_env_value(&val, "RELABEL_MIN_EPISODE_LEN")?;
        }

        if let Some(val) = lookup("RELABEL_FAIL_FAST") {
            config.fail_fast = parse_env_bool(&val, "RELABEL_FAIL_FAST")?;
        }

        // Discovery
        if let Some(val) = lookup("RELABEL_LOG_EXTENSION") {
            config.log_extension = val.trim_start_matches('.').to_string();
        }

        if let Some(val) = lookup("RELABEL_EXCLUDE") {
            config.exclude_pattern = Some(val);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Goal validation
        if self.target_tasks.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "target_tasks cannot be empty".to_string(),
            ));
        }

        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "tolerance must be a positive finite number".to_string(),
            ));
        }

        // Layout validation
        if self.state_dim == 0 {
            return Err(ConfigError::ValidationFailed(
                "state_dim must be greater than 0".to_string(),
            ));
        }

        if self.goal_offset < self.state_dim {
            return Err(ConfigError::ValidationFailed(
                "goal_offset cannot be smaller than state_dim".to_string(),
            ));
        }

        // Terminal validation
        if self.min_episode_len == 0 {
            return Err(ConfigError::ValidationFailed(
                "min_episode_len must be at least 1".to_string(),
            ));
        }

        // Discovery validation
        if self.log_extension.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "log_extension cannot be empty".to_string(),
            ));
        }

        if let Some(pattern) = &self.exclude_pattern {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::ValidationFailed(format!("exclude_pattern is not a valid regex: {}", e))
            })?;
        }

        Ok(())
    }

    /// Compiled exclusion regex, if one is configured.
    pub fn exclude_regex(&self) -> Result<Option<regex::Regex>, regex::Error> {
        self.exclude_pattern
            .as_deref()
            .map(regex::Regex::new)
            .transpose()
    }

    /// Builder method to set the target tasks.
    pub fn with_target_tasks<S: AsRef<str>>(mut self, tasks: &[S]) -> Self {
        self.target_tasks = tasks.iter().map(|t| t.as_ref().to_string()).collect();
        self
    }

    /// Builder method to set the completion tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Builder method to set a YAML task catalog.
    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    /// Builder method to set the observation layout.
    pub fn with_layout(mut self, state_dim: usize, goal_offset: usize) -> Self {
        self.state_dim = state_dim;
        self.goal_offset = goal_offset;
        self
    }

    /// Builder method to set the missing-terminal policy.
    pub fn with_missing_terminal(mut self, policy: MissingTerminalPolicy) -> Self {
        self.missing_terminal = policy;
        self
    }

    /// Builder method to set the terminal mode.
    pub fn with_terminal_mode(mut self, mode: TerminalMode) -> Self {
        self.terminal_mode = mode;
        self
    }

    /// Builder method to set the minimum episode length.
    pub fn with_min_episode_len(mut self, len: usize) -> Self {
        self.min_episode_len = len;
        self
    }

    /// Builder method to abort on the first failed log.
    pub fn with_fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Builder method to set the raw log extension.
    pub fn with_log_extension(mut self, extension: impl Into<String>) -> Self {
        self.log_extension = extension.into();
        self
    }

    /// Builder method to set the exclusion pattern.
    pub fn with_exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_pattern = Some(pattern.into());
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
