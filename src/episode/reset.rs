//! Episode reset policies.
//!
//! `Standard` hands control to the simulator's own reset. `Randomized`
//! samples a fresh starting pose: every controllable joint is drawn within
//! its bounds (with the two gripper fingers kept symmetric), and every
//! object whose task is *not* assigned is moved to a uniform point between
//! its nominal position and its target. Objects of assigned tasks keep
//! their nominal pose.

use ndarray::{Array1, ArrayView1};
use rand::RngExt;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::EpisodeError;
use crate::tasks::TaskCatalog;

/// Position bounds of one controllable joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointBound {
    pub low: f64,
    pub high: f64,
}

impl JointBound {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

/// Parameters of the randomized start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomizedReset {
    /// Gripper finger joints; the second is set equal to the first after sampling.
    pub gripper_pair: (usize, usize),
}

impl RandomizedReset {
    /// Franka gripper fingers in the kitchen pose vector.
    pub const KITCHEN: Self = Self {
        gripper_pair: (7, 8),
    };

    /// Samples a starting pose.
    ///
    /// `nominal` is the simulator's initial pose; `assigned` are the tasks of
    /// the upcoming episode.
    ///
    /// # Errors
    ///
    /// Fails if the pose does not cover the joints, gripper pair or catalog
    /// indices, if a joint bound is not a finite `low <= high` pair, or if an
    /// assigned task is not in the catalog.
    pub fn sample_pose<S: AsRef<str>>(
        &self,
        nominal: ArrayView1<'_, f64>,
        bounds: &[JointBound],
        catalog: &TaskCatalog,
        assigned: &[S],
        rng: &mut ChaCha8Rng,
    ) -> Result<Array1<f64>, EpisodeError> {
        catalog.check_names(assigned)?;

        let (finger, mirror) = self.gripper_pair;
        let expected = bounds
            .len()
            .max(catalog.required_dim())
            .max(finger + 1)
            .max(mirror + 1);
        if nominal.len() < expected {
            return Err(EpisodeError::PoseTooShort {
                expected,
                actual: nominal.len(),
            });
        }

        let mut pose = nominal.to_owned();

        for (joint, bound) in bounds.iter().enumerate() {
            if !(bound.low.is_finite() && bound.high.is_finite()) || bound.low > bound.high {
                return Err(EpisodeError::InvalidJointBound {
                    joint,
                    low: bound.low,
                    high: bound.high,
                });
            }
            pose[joint] = rng.random_range(bound.low..=bound.high);
        }
        pose[mirror] = pose[finger];

        for task in catalog.tasks() {
            if assigned.iter().any(|a| a.as_ref() == task.name) {
                continue;
            }
            for (&index, &target) in task.indices.iter().zip(&task.target) {
                let current = pose[index];
                let (low, high) = if current <= target {
                    (current, target)
                } else {
                    (target, current)
                };
                pose[index] = rng.random_range(low..=high);
            }
        }

        Ok(pose)
    }
}

/// How an episode picks its starting pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Simulator's nominal reset.
    Standard,
    /// Sampled joints and mid-transition non-target objects.
    Randomized(RandomizedReset),
}

impl ResetPolicy {
    pub fn is_randomized(&self) -> bool {
        matches!(self, ResetPolicy::Randomized(_))
    }
}

impl Default for ResetPolicy {
    fn default() -> Self {
        ResetPolicy::Standard
    }
}
