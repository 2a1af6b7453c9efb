//! Command-line interface for kitchen-forge.
//!
//! Provides commands for relabeling demonstration logs, inspecting relabeled
//! datasets and listing environment variants.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
