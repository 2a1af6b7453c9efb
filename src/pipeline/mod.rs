//! Offline relabeling pipeline.
//!
//! Converts recorded demonstration logs into a goal-conditioned dataset for a
//! fixed target task assignment.
//!
//! # Architecture
//!
//! - **Config**: target tasks, tolerance, observation layout and terminal handling
//! - **Relabel**: goal override, segmentation, reward replay and terminal marking
//! - **Report**: per-log statistics, failures and warnings for one run
//!
//! # Pipeline Flow
//!
//! 1. **Discovery**: raw logs are found under an input directory, sorted by path
//! 2. **Goal override**: every observation's goal region is set to the target goal
//! 3. **Segmentation**: each log is split into episodes at its terminal flags
//! 4. **Reward replay**: each step is scored against the full target list
//! 5. **Terminal marking**: the last retained step of each episode is terminal
//! 6. **Aggregation**: episodes are concatenated in log order with provenance
//!
//! # Example
//!
//! ```rust,ignore
//! use kitchen_forge::pipeline::{RelabelConfig, RelabelPipeline, TerminalMode};
//! use kitchen_forge::trajectory::discover_logs;
//!
//! let config = RelabelConfig::new()
//!     .with_target_tasks(&["microwave", "kettle"])
//!     .with_terminal_mode(TerminalMode::FirstSuccess);
//!
//! let pipeline = RelabelPipeline::from_config(config)?;
//! let logs = discover_logs(Path::new("demos"), "json", None)?;
//! let output = pipeline.run(&logs)?;
//!
//! println!("{} episodes, {} steps", output.report.episodes, output.report.retained_steps);
//! ```
//!
//! # Configuration
//!
//! The pipeline can be configured via the `RelabelConfig` struct or `RELABEL_*`
//! environment variables; see [`RelabelConfig::from_env`].

pub mod config;
pub mod relabel;
pub mod report;

pub use config::{ConfigError, MissingTerminalPolicy, RelabelConfig, TerminalMode};
pub use relabel::{goal_observation, RelabelOutput, RelabelPipeline, RelabeledLog};
pub use report::{LogFailure, LogStats, RelabelReport};
