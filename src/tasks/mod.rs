//! Task catalog and goal encoding.
//!
//! The catalog names each sub-task of the benchmark and pins it to a fixed
//! slice of the object-state vector together with the values that slice must
//! reach. The goal encoder turns a list of task names into the goal vector
//! consumed by the completion evaluator and the relabeling pipeline.

pub mod catalog;
pub mod goal;

pub use catalog::{
    kitchen_tasks, TaskCatalog, TaskSpec, DEFAULT_TARGET_TASKS, KITCHEN_STATE_DIM,
};
pub use goal::GoalEncoder;
