//! Offline trajectory relabeling.
//!
//! Turns recorded demonstration logs into a goal-conditioned dataset for one
//! fixed target assignment:
//!
//! 1. the goal region of every observation is overwritten with the target goal;
//! 2. each log is split into episodes at its recorded terminal flags;
//! 3. rewards are replayed step by step against the full target list, with no
//!    task removal, so the reward is a function of the current state only;
//! 4. each retained episode ends on a terminal step.
//!
//! Logs are processed in the order given. A log that fails is recorded in the
//! run report and skipped; the run fails only when no log succeeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::{s, Array1, Array2, ArrayView2};

use super::config::{ConfigError, MissingTerminalPolicy, RelabelConfig, TerminalMode};
use super::report::{mean, LogStats, RelabelReport};
use crate::completion::CompletionEvaluator;
use crate::error::RelabelError;
use crate::tasks::{GoalEncoder, TaskCatalog};
use crate::trajectory::{EpisodeRecord, LogSource, RawLog};

/// Episodes produced from one raw log.
#[derive(Debug, Clone)]
pub struct RelabeledLog {
    pub episodes: Vec<EpisodeRecord>,
    /// Steps not retained: trailing steps after the last terminal, steps cut by
    /// `first-success` truncation and steps of episodes below the length floor.
    pub dropped_steps: usize,
    pub short_episodes: usize,
    pub warnings: Vec<String>,
}

/// Output of a relabeling run.
#[derive(Debug, Clone)]
pub struct RelabelOutput {
    pub episodes: Vec<EpisodeRecord>,
    pub report: RelabelReport,
}

impl RelabelOutput {
    /// Total number of retained steps.
    pub fn total_steps(&self) -> usize {
        self.episodes.iter().map(EpisodeRecord::len).sum()
    }
}

/// Reward replay of one episode.
struct Replay {
    rewards: Vec<f64>,
    first_success: Option<usize>,
}

/// Relabels raw logs against a fixed target assignment.
pub struct RelabelPipeline {
    config: RelabelConfig,
    evaluator: CompletionEvaluator,
    goal: Array1<f64>,
    stop: Option<Arc<AtomicBool>>,
}

impl RelabelPipeline {
    /// Creates a pipeline over an explicit catalog.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, a catalog whose object state width
    /// differs from the configured layout, or an unknown target task.
    pub fn new(config: RelabelConfig, catalog: Arc<TaskCatalog>) -> Result<Self, RelabelError> {
        config.validate()?;
        if catalog.state_dim() != config.state_dim {
            return Err(ConfigError::ValidationFailed(format!(
                "state_dim {} does not match the catalog object state width {}",
                config.state_dim,
                catalog.state_dim()
            ))
            .into());
        }

        let evaluator = CompletionEvaluator::new(catalog.clone()).with_tolerance(config.tolerance)?;
        let goal = GoalEncoder::new(catalog).encode(&config.target_tasks)?;

        Ok(Self {
            config,
            evaluator,
            goal,
            stop: None,
        })
    }

    /// Creates a pipeline, loading the catalog named by the configuration or
    /// falling back to the built-in kitchen table.
    pub fn from_config(config: RelabelConfig) -> Result<Self, RelabelError> {
        let catalog = match &config.catalog_path {
            Some(path) => TaskCatalog::from_path(path)?,
            None => TaskCatalog::kitchen(),
        };
        Self::new(config, Arc::new(catalog))
    }

    /// Checks `flag` between logs and stops the batch once it is set.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn config(&self) -> &RelabelConfig {
        &self.config
    }

    /// Goal vector written into every observation.
    pub fn goal(&self) -> &Array1<f64> {
        &self.goal
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Relabels every log in order.
    ///
    /// # Errors
    ///
    /// Returns `RelabelError::NoLogs` for an empty batch and
    /// `RelabelError::AllLogsFailed` when no log succeeded. With `fail_fast`
    /// the first log error is returned as is.
    pub fn run<L: LogSource>(&self, sources: &[L]) -> Result<RelabelOutput, RelabelError> {
        if sources.is_empty() {
            return Err(RelabelError::NoLogs);
        }

        let mut report = RelabelReport::new(self.config.clone());
        report.logs_seen = sources.len();
        let mut episodes = Vec::new();

        tracing::info!(
            logs = sources.len(),
            targets = ?self.config.target_tasks,
            "Starting relabel run"
        );

        for (i, source) in sources.iter().enumerate() {
            if self.stop_requested() {
                tracing::warn!(processed = i, remaining = sources.len() - i, "Relabel run stopped");
                report.stopped_early = true;
                break;
            }

            let name = source.name();
            let log_index = u32::try_from(i).map_err(|_| RelabelError::DataIntegrity {
                log: name.clone(),
                reason: "log index exceeds the provenance range".to_string(),
            })?;

            match source.load().and_then(|log| self.relabel_log(&log, log_index)) {
                Ok(relabeled) => {
                    let stats = LogStats {
                        log_index,
                        log: name.clone(),
                        episodes: relabeled.episodes.len(),
                        steps: relabeled.episodes.iter().map(EpisodeRecord::len).sum(),
                        dropped_steps: relabeled.dropped_steps,
                        mean_episode_reward: mean(
                            &relabeled
                                .episodes
                                .iter()
                                .map(EpisodeRecord::reward_sum)
                                .collect::<Vec<_>>(),
                        ),
                        mean_final_reward: mean(
                            &relabeled
                                .episodes
                                .iter()
                                .map(EpisodeRecord::final_reward)
                                .collect::<Vec<_>>(),
                        ),
                    };
                    tracing::info!(
                        log = %name,
                        episodes = stats.episodes,
                        steps = stats.steps,
                        avg_episode_reward = stats.mean_episode_reward,
                        avg_last_step_reward = stats.mean_final_reward,
                        "Log relabeled"
                    );
                    report.warnings.extend(relabeled.warnings);
                    report.record_success(stats, relabeled.short_episodes);
                    episodes.extend(relabeled.episodes);
                }
                Err(e) => {
                    if self.config.fail_fast {
                        return Err(e);
                    }
                    tracing::warn!(log = %name, error = %e, "Log failed to relabel");
                    report.record_failure(log_index, &name, e.to_string());
                }
            }
        }

        if report.logs_succeeded == 0 && report.logs_failed > 0 {
            return Err(RelabelError::AllLogsFailed {
                failed: report.logs_failed,
            });
        }

        let episode_rewards: Vec<f64> = episodes.iter().map(EpisodeRecord::reward_sum).collect();
        let final_rewards: Vec<f64> = episodes.iter().map(EpisodeRecord::final_reward).collect();
        report.finish(&episode_rewards, &final_rewards);

        tracing::info!(
            succeeded = report.logs_succeeded,
            failed = report.logs_failed,
            episodes = report.episodes,
            steps = report.retained_steps,
            dropped = report.dropped_steps,
            "Relabel run complete"
        );

        Ok(RelabelOutput { episodes, report })
    }

    /// Relabels a single log.
    ///
    /// # Errors
    ///
    /// Fails with `RelabelError::EmptyLog`, `RelabelError::DataIntegrity` for
    /// observations narrower than the layout or states narrower than the
    /// highest catalog index, or `RelabelError::NoTerminal`
    /// when the log has no terminal flag under the `fail` policy.
    pub fn relabel_log(&self, log: &RawLog, log_index: u32) -> Result<RelabeledLog, RelabelError> {
        let name = log.name();
        if log.is_empty() {
            return Err(RelabelError::EmptyLog(name.to_string()));
        }

        let required = self.config.goal_offset + self.config.state_dim;
        if log.observation_dim() < required {
            return Err(RelabelError::DataIntegrity {
                log: name.to_string(),
                reason: format!(
                    "observation has {} values, layout requires {}",
                    log.observation_dim(),
                    required
                ),
            });
        }

        let state_required = self.evaluator.catalog().required_dim();
        if log.states().ncols() < state_required {
            return Err(RelabelError::DataIntegrity {
                log: name.to_string(),
                reason: format!(
                    "state has {} values, catalog indices require {}",
                    log.states().ncols(),
                    state_required
                ),
            });
        }

        let mut warnings = Vec::new();
        let mut terminals = log.terminal_indices();
        if terminals.is_empty() {
            match self.config.missing_terminal {
                MissingTerminalPolicy::Fail => {
                    return Err(RelabelError::NoTerminal(name.to_string()));
                }
                MissingTerminalPolicy::WarnAndTerminate => {
                    tracing::warn!(log = %name, steps = log.len(), "No terminal flag, terminating at final step");
                    warnings.push(format!(
                        "log '{}' has no terminal flag; final step {} treated as terminal",
                        name,
                        log.len() - 1
                    ));
                    terminals.push(log.len() - 1);
                }
            }
        }

        let mut dropped_steps = 0;
        if let Some(&last) = terminals.last() {
            let trailing = log.len() - 1 - last;
            if trailing > 0 {
                tracing::warn!(log = %name, trailing, "Dropping steps after the last terminal");
                warnings.push(format!(
                    "log '{}' has {} steps after its last terminal; dropped",
                    name, trailing
                ));
                dropped_steps += trailing;
            }
        }

        let observations = self.relabel_observations(log.observations());
        let mut episodes = Vec::with_capacity(terminals.len());
        let mut short_episodes = 0;
        let mut start = 0;

        for &end in &terminals {
            let segment_start = start;
            let segment_len = end + 1 - segment_start;
            start = end + 1;

            let segment_obs = observations.slice(s![segment_start..=end, ..]);
            let replay = self.replay(segment_obs)?;
            let keep = match self.config.terminal_mode {
                TerminalMode::LastStep => segment_len,
                TerminalMode::FirstSuccess => replay
                    .first_success
                    .map(|i| i + 1)
                    .unwrap_or(segment_len),
            };
            dropped_steps += segment_len - keep;

            if keep < self.config.min_episode_len {
                tracing::debug!(
                    log = %name,
                    start = segment_start,
                    len = keep,
                    min = self.config.min_episode_len,
                    "Dropping short episode"
                );
                short_episodes += 1;
                dropped_steps += keep;
                continue;
            }

            let stop = segment_start + keep;
            let mut rewards = replay.rewards;
            rewards.truncate(keep);

            tracing::debug!(
                log = %name,
                episode = episodes.len(),
                steps = keep,
                reward_sum = rewards.iter().sum::<f64>(),
                "Episode replayed"
            );

            episodes.push(EpisodeRecord::new(
                log_index,
                log.states().slice(s![segment_start..stop, ..]).to_owned(),
                observations.slice(s![segment_start..stop, ..]).to_owned(),
                log.actions().slice(s![segment_start..stop, ..]).to_owned(),
                rewards,
                self.goal.clone(),
            ));
        }

        Ok(RelabeledLog {
            episodes,
            dropped_steps,
            short_episodes,
            warnings,
        })
    }

    /// Copy of `observations` with the goal region set to the target goal.
    pub fn relabel_observations(&self, observations: &Array2<f64>) -> Array2<f64> {
        let offset = self.config.goal_offset;
        let mut relabeled = observations.clone();
        relabeled
            .slice_mut(s![.., offset..offset + self.config.state_dim])
            .assign(&self.goal);
        relabeled
    }

    /// Markovian reward of each step: the number of leading targets achieved.
    fn replay(&self, observations: ArrayView2<'_, f64>) -> Result<Replay, RelabelError> {
        let dim = self.config.state_dim;
        let offset = self.config.goal_offset;
        let targets = &self.config.target_tasks;

        let mut rewards = Vec::with_capacity(observations.nrows());
        let mut first_success = None;
        for (i, row) in observations.rows().into_iter().enumerate() {
            let completion = self.evaluator.evaluate(
                row.slice(s![..dim]),
                row.slice(s![offset..offset + dim]),
                targets,
            )?;
            if first_success.is_none() && completion.score == targets.len() {
                first_success = Some(i);
            }
            rewards.push(completion.reward());
        }

        Ok(Replay {
            rewards,
            first_success,
        })
    }
}

/// Final observation of the `n`-th episode, usable as a goal observation by
/// goal-conditioned consumers.
pub fn goal_observation(episodes: &[EpisodeRecord], n: usize) -> Option<Array1<f64>> {
    episodes
        .get(n)
        .and_then(EpisodeRecord::final_observation)
        .map(|obs| obs.to_owned())
}
