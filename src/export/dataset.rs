//! Relabeled dataset metadata and summaries.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::trajectory::EpisodeRecord;

/// Schema metadata key holding the serialized [`DatasetMetadata`].
pub const METADATA_KEY: &str = "kitchen_forge";

/// Goal assignment a dataset was relabeled against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub target_tasks: Vec<String>,
    pub goal: Vec<f64>,
    pub tolerance: f64,
    pub goal_offset: usize,
}

/// A dataset read back from disk.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub metadata: Option<DatasetMetadata>,
    pub episodes: Vec<EpisodeRecord>,
}

/// Aggregate statistics of a relabeled dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub episodes: usize,
    pub steps: usize,
    /// Distinct source logs.
    pub logs: usize,
    pub reward_min: f64,
    pub reward_max: f64,
    pub reward_mean: f64,
    pub mean_episode_reward: f64,
    pub mean_final_reward: f64,
    /// Episodes whose final step reached full completion.
    pub successful_episodes: usize,
}

/// Summarizes `episodes`; `max_score` is the reward of a fully completed step.
pub fn summarize(episodes: &[EpisodeRecord], max_score: Option<usize>) -> DatasetSummary {
    let steps: usize = episodes.iter().map(EpisodeRecord::len).sum();
    let logs: BTreeSet<u32> = episodes.iter().map(EpisodeRecord::log_index).collect();

    let rewards = episodes.iter().flat_map(|e| e.rewards().iter().copied());
    let (mut min, mut max, mut total) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
    for r in rewards {
        min = min.min(r);
        max = max.max(r);
        total += r;
    }
    if steps == 0 {
        min = 0.0;
        max = 0.0;
    }

    let per_episode = |f: fn(&EpisodeRecord) -> f64| {
        if episodes.is_empty() {
            0.0
        } else {
            episodes.iter().map(f).sum::<f64>() / episodes.len() as f64
        }
    };

    let successful_episodes = match max_score {
        Some(score) => episodes
            .iter()
            .filter(|e| e.final_reward() >= score as f64)
            .count(),
        None => 0,
    };

    DatasetSummary {
        episodes: episodes.len(),
        steps,
        logs: logs.len(),
        reward_min: min,
        reward_max: max,
        reward_mean: if steps == 0 { 0.0 } else { total / steps as f64 },
        mean_episode_reward: per_episode(EpisodeRecord::reward_sum),
        mean_final_reward: per_episode(EpisodeRecord::final_reward),
        successful_episodes,
    }
}
