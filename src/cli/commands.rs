//! CLI command definitions for kitchen-forge.
//!
//! This module provides the command-line interface for relabeling recorded
//! kitchen demonstrations, inspecting relabeled datasets and listing the
//! environment variant presets.

use std::path::Path;

use clap::Parser;
use tracing::{info, warn};

use crate::episode::variants;
use crate::export::{read_parquet, summarize, write_parquet, DatasetMetadata};
use crate::pipeline::{MissingTerminalPolicy, RelabelConfig, RelabelPipeline, TerminalMode};
use crate::trajectory::discover_logs;

/// Default output path for relabeled datasets.
const DEFAULT_OUTPUT: &str = "./relabeled/kitchen.parquet";

/// Goal-conditioned relabeling tools for the kitchen manipulation benchmark.
#[derive(Parser)]
#[command(name = "kitchen-forge")]
#[command(about = "Relabel kitchen demonstrations into goal-conditioned datasets")]
#[command(version)]
#[command(
    long_about = "kitchen-forge relabels recorded kitchen demonstrations against a fixed ordered task assignment.\n\nRewards are recomputed with the ordered completion rule and episodes are split at recorded terminals.\n\nExample usage:\n  kitchen-forge relabel --input ./demos --output ./relabeled/kitchen.parquet --tasks microwave,kettle"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Relabel raw demonstration logs and write a Parquet dataset.
    Relabel(RelabelArgs),

    /// Load a relabeled dataset and print its statistics.
    Inspect(InspectArgs),

    /// List the environment variant presets.
    #[command(alias = "envs")]
    Variants(VariantsArgs),
}

/// Arguments for `kitchen-forge relabel`.
#[derive(Parser, Debug)]
pub struct RelabelArgs {
    /// Directory searched recursively for raw logs.
    #[arg(short, long)]
    pub input: String,

    /// Output Parquet file.
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: String,

    /// Comma-separated ordered target tasks (e.g. "microwave,kettle").
    #[arg(short, long)]
    pub tasks: Option<String>,

    /// YAML task catalog replacing the built-in kitchen table.
    #[arg(long)]
    pub catalog: Option<String>,

    /// Completion tolerance.
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Drop episodes shorter than this many steps.
    #[arg(long)]
    pub min_episode_len: Option<usize>,

    /// Handling of logs without a terminal flag: fail or warn-and-terminate.
    #[arg(long)]
    pub missing_terminal: Option<MissingTerminalPolicy>,

    /// Where episodes end: last-step or first-success.
    #[arg(long)]
    pub terminal_mode: Option<TerminalMode>,

    /// Skip discovered paths matching this regex.
    #[arg(long)]
    pub exclude: Option<String>,

    /// Raw log file extension.
    #[arg(long)]
    pub extension: Option<String>,

    /// Abort on the first failed log.
    #[arg(long)]
    pub fail_fast: bool,

    /// Also write the run report to this JSON file.
    #[arg(long)]
    pub report: Option<String>,

    /// Output the run report as JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `kitchen-forge inspect`.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Relabeled Parquet dataset.
    #[arg(short, long)]
    pub input: String,

    /// Output JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `kitchen-forge variants`.
#[derive(Parser, Debug)]
pub struct VariantsArgs {
    /// Output JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For more control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli())
}

/// Run the CLI with the parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Relabel(args) => run_relabel_command(args)?,
        Commands::Inspect(args) => run_inspect_command(args)?,
        Commands::Variants(args) => run_variants_command(args)?,
    }
    Ok(())
}

/// Environment configuration overridden by explicit arguments.
fn build_relabel_config(args: &RelabelArgs) -> anyhow::Result<RelabelConfig> {
    let mut config = RelabelConfig::from_env()?;

    if let Some(tasks) = &args.tasks {
        let tasks: Vec<&str> = tasks
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        config = config.with_target_tasks(&tasks);
    }
    if let Some(path) = &args.catalog {
        config = config.with_catalog_path(path);
    }
    if let Some(tolerance) = args.tolerance {
        config = config.with_tolerance(tolerance);
    }
    if let Some(len) = args.min_episode_len {
        config = config.with_min_episode_len(len);
    }
    if let Some(policy) = args.missing_terminal {
        config = config.with_missing_terminal(policy);
    }
    if let Some(mode) = args.terminal_mode {
        config = config.with_terminal_mode(mode);
    }
    if let Some(pattern) = &args.exclude {
        config = config.with_exclude_pattern(pattern);
    }
    if let Some(ext) = &args.extension {
        config = config.with_log_extension(ext.trim_start_matches('.'));
    }
    if args.fail_fast {
        config = config.with_fail_fast(true);
    }

    config.validate()?;
    Ok(config)
}

fn run_relabel_command(args: RelabelArgs) -> anyhow::Result<()> {
    let config = build_relabel_config(&args)?;
    let exclude = config.exclude_regex()?;
    let pipeline = RelabelPipeline::from_config(config)?;

    let logs = discover_logs(
        Path::new(&args.input),
        &pipeline.config().log_extension,
        exclude.as_ref(),
    )?;
    let output = pipeline.run(&logs)?;

    if output.episodes.is_empty() {
        warn!("Relabeling produced no episodes; no dataset written");
    } else {
        let config = pipeline.config();
        let metadata = DatasetMetadata {
            target_tasks: config.target_tasks.clone(),
            goal: pipeline.goal().to_vec(),
            tolerance: config.tolerance,
            goal_offset: config.goal_offset,
        };
        write_parquet(&output.episodes, Some(&metadata), Path::new(&args.output))?;
    }

    if let Some(path) = &args.report {
        let path = Path::new(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, output.report.to_json()?)?;
        info!(path = %path.display(), "Run report written");
    }

    let report = &output.report;
    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!(
            "Relabeled {} of {} logs ({} failed)",
            report.logs_succeeded, report.logs_seen, report.logs_failed
        );
        println!(
            "  Episodes: {}  Steps: {}  Dropped: {}",
            report.episodes, report.retained_steps, report.dropped_steps
        );
        println!("  Avg episode reward: {:.3}", report.mean_episode_reward);
        println!("  Avg last step reward: {:.3}", report.mean_final_reward);
        for failure in &report.failures {
            println!("  FAILED {}: {}", failure.log, failure.reason);
        }
        for warning in &report.warnings {
            println!("  WARNING {}", warning);
        }
        if !output.episodes.is_empty() {
            println!("  Output: {}", args.output);
        }
    }

    Ok(())
}

fn run_inspect_command(args: InspectArgs) -> anyhow::Result<()> {
    let dataset = read_parquet(Path::new(&args.input))?;
    let max_score = dataset.metadata.as_ref().map(|m| m.target_tasks.len());
    let summary = summarize(&dataset.episodes, max_score);

    if args.json {
        let output = serde_json::json!({
            "source": args.input,
            "metadata": dataset.metadata,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Loaded {} episodes from {}", summary.episodes, args.input);
        if let Some(metadata) = &dataset.metadata {
            println!("  Targets: {}", metadata.target_tasks.join(", "));
        }
        println!("  Steps: {}  Source logs: {}", summary.steps, summary.logs);
        println!(
            "  Reward min/mean/max: {:.3} / {:.3} / {:.3}",
            summary.reward_min, summary.reward_mean, summary.reward_max
        );
        println!("  Avg episode reward: {:.3}", summary.mean_episode_reward);
        println!("  Avg last step reward: {:.3}", summary.mean_final_reward);
        if max_score.is_some() {
            println!(
                "  Fully completed episodes: {}/{}",
                summary.successful_episodes, summary.episodes
            );
        }
    }

    Ok(())
}

fn run_variants_command(args: VariantsArgs) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(variants())?);
        return Ok(());
    }

    for variant in variants() {
        let reset = if variant.reset.is_randomized() {
            "randomized"
        } else {
            "standard"
        };
        println!(
            "{:<24} {:<10} {:>6} steps  {}",
            variant.id,
            reset,
            variant.max_episode_steps,
            variant.tasks.join(", ")
        );
    }
    Ok(())
}
