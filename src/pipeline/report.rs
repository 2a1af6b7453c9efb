//! Run report for a relabeling batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::RelabelConfig;

/// A log that could not be relabeled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogFailure {
    pub log_index: u32,
    pub log: String,
    pub reason: String,
}

/// Per-log summary, reported as each log completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogStats {
    pub log_index: u32,
    pub log: String,
    pub episodes: usize,
    pub steps: usize,
    pub dropped_steps: usize,
    pub mean_episode_reward: f64,
    pub mean_final_reward: f64,
}

/// Summary of one relabeling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelabelReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config: RelabelConfig,

    pub logs_seen: usize,
    pub logs_succeeded: usize,
    pub logs_failed: usize,
    pub failures: Vec<LogFailure>,
    pub warnings: Vec<String>,
    pub log_stats: Vec<LogStats>,

    pub episodes: usize,
    pub retained_steps: usize,
    pub dropped_steps: usize,
    /// Episodes removed by the minimum length filter.
    pub short_episodes: usize,
    pub mean_episode_reward: f64,
    pub mean_final_reward: f64,

    /// Set when the run was stopped before every log was processed.
    pub stopped_early: bool,
}

impl RelabelReport {
    /// Starts an empty report for a run.
    pub fn new(config: RelabelConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            config,
            logs_seen: 0,
            logs_succeeded: 0,
            logs_failed: 0,
            failures: Vec::new(),
            warnings: Vec::new(),
            log_stats: Vec::new(),
            episodes: 0,
            retained_steps: 0,
            dropped_steps: 0,
            short_episodes: 0,
            mean_episode_reward: 0.0,
            mean_final_reward: 0.0,
            stopped_early: false,
        }
    }

    pub(crate) fn record_failure(&mut self, log_index: u32, log: &str, reason: String) {
        self.logs_failed += 1;
        self.failures.push(LogFailure {
            log_index,
            log: log.to_string(),
            reason,
        });
    }

    pub(crate) fn record_success(&mut self, stats: LogStats, short_episodes: usize) {
        self.logs_succeeded += 1;
        self.episodes += stats.episodes;
        self.retained_steps += stats.steps;
        self.dropped_steps += stats.dropped_steps;
        self.short_episodes += short_episodes;
        self.log_stats.push(stats);
    }

    /// Fills in dataset-wide reward means and the finish time.
    pub(crate) fn finish(&mut self, episode_rewards: &[f64], final_rewards: &[f64]) {
        self.mean_episode_reward = mean(episode_rewards);
        self.mean_final_reward = mean(final_rewards);
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration, once finished.
    pub fn duration_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
