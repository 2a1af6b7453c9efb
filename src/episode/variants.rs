//! Kitchen environment variant presets.
//!
//! A variant is a task list, a reset policy, a step budget and the reference
//! scores used to normalize episode returns.

use serde::Serialize;

use super::reset::{RandomizedReset, ResetPolicy};
use crate::error::EpisodeError;

/// One kitchen environment configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvVariant {
    pub id: &'static str,
    pub tasks: &'static [&'static str],
    pub reset: ResetPolicy,
    pub max_episode_steps: u32,
    pub ref_min_score: f64,
    pub ref_max_score: f64,
}

const RANDOMIZED: ResetPolicy = ResetPolicy::Randomized(RandomizedReset::KITCHEN);

const fn variant(
    id: &'static str,
    tasks: &'static [&'static str],
    reset: ResetPolicy,
    max_episode_steps: u32,
) -> EnvVariant {
    EnvVariant {
        id,
        tasks,
        reset,
        max_episode_steps,
        ref_min_score: 0.0,
        ref_max_score: 4.0,
    }
}

static VARIANTS: [EnvVariant; 15] = [
    variant(
        "kitchen-2-mixed-v0",
        &["microwave", "kettle", "bottom burner", "light switch"],
        ResetPolicy::Standard,
        100_000,
    ),
    variant("kitchen-2-BB-v0", &["bottom burner"], ResetPolicy::Standard, 50),
    variant("kitchen-2-TB-v0", &["top burner"], ResetPolicy::Standard, 50),
    variant("kitchen-2-LS-v0", &["light switch"], ResetPolicy::Standard, 50),
    variant("kitchen-2-SC-v0", &["slide cabinet"], ResetPolicy::Standard, 50),
    variant("kitchen-2-HC-v0", &["hinge cabinet"], ResetPolicy::Standard, 50),
    variant("kitchen-2-MW-v0", &["microwave"], ResetPolicy::Standard, 50),
    variant("kitchen-2-KET-v0", &["kettle"], ResetPolicy::Standard, 50),
    variant("kitchen-2-BB-rand-v0", &["bottom burner"], RANDOMIZED, 70),
    variant("kitchen-2-TB-rand-v0", &["top burner"], RANDOMIZED, 70),
    variant("kitchen-2-LS-rand-v0", &["light switch"], RANDOMIZED, 70),
    variant("kitchen-2-SC-rand-v0", &["slide cabinet"], RANDOMIZED, 70),
    variant("kitchen-2-HC-rand-v0", &["hinge cabinet"], RANDOMIZED, 70),
    variant("kitchen-2-MW-rand-v0", &["microwave"], RANDOMIZED, 70),
    variant("kitchen-2-KET-rand-v0", &["kettle"], RANDOMIZED, 70),
];

/// All variant presets.
pub fn variants() -> &'static [EnvVariant] {
    &VARIANTS
}

impl EnvVariant {
    /// Finds a preset by id.
    pub fn lookup(id: &str) -> Result<&'static EnvVariant, EpisodeError> {
        VARIANTS
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| EpisodeError::UnknownVariant(id.to_string()))
    }

    /// Owned copy of the task list.
    pub fn task_list(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.to_string()).collect()
    }

    /// Maps a raw episode score onto the reference range (0 = reference min, 1 = reference max).
    pub fn normalized_score(&self, score: f64) -> f64 {
        (score - self.ref_min_score) / (self.ref_max_score - self.ref_min_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskCatalog;

    #[test]
    fn test_lookup() {
        let v = EnvVariant::lookup("kitchen-2-MW-rand-v0").unwrap();
        assert_eq!(v.tasks, &["microwave"]);
        assert!(v.reset.is_randomized());
        assert_eq!(v.max_episode_steps, 70);

        let mixed = EnvVariant::lookup("kitchen-2-mixed-v0").unwrap();
        assert_eq!(mixed.tasks.len(), 4);
        assert_eq!(mixed.reset, ResetPolicy::Standard);

        assert!(matches!(
            EnvVariant::lookup("kitchen-9-v0"),
            Err(EpisodeError::UnknownVariant(_))
        ));
    }

    #[test]
    fn test_all_variant_tasks_are_in_catalog() {
        let catalog = TaskCatalog::kitchen();
        for v in variants() {
            assert!(catalog.check_names(v.tasks).is_ok(), "variant {}", v.id);
        }
    }

    #[test]
    fn test_variant_ids_are_unique() {
        let mut ids: Vec<&str> = variants().iter().map(|v| v.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), variants().len());
    }

    #[test]
    fn test_normalized_score() {
        let v = EnvVariant::lookup("kitchen-2-mixed-v0").unwrap();
        assert!((v.normalized_score(0.0)).abs() < f64::EPSILON);
        assert!((v.normalized_score(2.0) - 0.5).abs() < f64::EPSILON);
        assert!((v.normalized_score(4.0) - 1.0).abs() < f64::EPSILON);
    }
}
