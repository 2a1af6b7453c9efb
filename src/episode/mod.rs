//! Episode lifetime: completion state machine, reset policies and the
//! simulator-facing environment.
//!
//! # Overview
//!
//! - [`EpisodeStateMachine`] owns the ordered queue of tasks still required
//!   and turns each completion evaluation into a reward and a done flag.
//! - [`ResetPolicy`] selects how an episode starts: the simulator's nominal
//!   pose or a randomized start.
//! - [`EnvVariant`] presets pair a task list with a reset policy and a step
//!   budget.
//! - [`KitchenEnv`] drives a [`Simulator`] through all of the above.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kitchen_forge::completion::CompletionEvaluator;
//! use kitchen_forge::episode::{EnvVariant, KitchenEnv};
//! use kitchen_forge::tasks::TaskCatalog;
//!
//! let catalog = Arc::new(TaskCatalog::kitchen());
//! let variant = EnvVariant::lookup("kitchen-2-MW-rand-v0")?;
//! let mut env = KitchenEnv::new(sim, variant, catalog.clone(), CompletionEvaluator::new(catalog), Some(0))?;
//!
//! let mut obs = env.reset()?;
//! loop {
//!     let step = env.step(policy(&obs).view())?;
//!     obs = step.observation;
//!     if step.done {
//!         break;
//!     }
//! }
//! ```

pub mod env;
pub mod machine;
pub mod reset;
pub mod variants;

pub use env::{EnvStep, KitchenEnv, Simulator, StepInfo};
pub use machine::{DoneReason, EpisodeConfig, EpisodeStateMachine, EpisodeStatus, StepOutcome};
pub use reset::{JointBound, RandomizedReset, ResetPolicy};
pub use variants::{variants, EnvVariant};
