//! Recorded demonstration logs and relabeled episodes.
//!
//! # Overview
//!
//! - [`RawLog`]: a continuous capture of per-step state, observation, action
//!   and terminal flag, read from a JSON file ([`RawLogFile`] layout).
//! - [`EpisodeRecord`]: one terminal-delimited episode with recomputed rewards.
//! - [`LogSource`]: anything the relabeling pipeline can load a log from;
//!   [`discover_logs`] finds JSON logs on disk.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kitchen_forge::trajectory::{discover_logs, LogSource};
//!
//! for source in discover_logs(Path::new("demos"), "json", None)? {
//!     let log = source.load()?;
//!     println!("{}: {} steps, {} terminals", source.name(), log.len(), log.terminal_indices().len());
//! }
//! ```

pub mod storage;
pub mod types;

pub use storage::{discover_logs, load_raw_log, save_raw_log, JsonLogFile, LogSource};
pub use types::{EpisodeRecord, RawLog, RawLogFile, StepRecord};
