//! Task catalog: the fixed table of named sub-tasks.
//!
//! Each task owns a set of positions in the object-state vector and the
//! target values those positions must reach for the task to count as
//! achieved. The catalog is validated once on construction; every other
//! component assumes a validated catalog.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Length of the kitchen object-state vector (9 robot joints + 21 object coordinates).
pub const KITCHEN_STATE_DIM: usize = 30;

/// Task list assigned by default when relabeling kitchen demonstrations.
pub const DEFAULT_TARGET_TASKS: [&str; 4] = ["microwave", "kettle", "bottom burner", "light switch"];

/// One named sub-task: where it lives in the object state and what it must reach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Task name, e.g. "bottom burner".
    pub name: String,

    /// Positions within the object-state vector describing this task.
    pub indices: Vec<usize>,

    /// Values the positions must reach, one per index.
    pub target: Vec<f64>,
}

impl TaskSpec {
    /// Creates a task specification.
    pub fn new(name: impl Into<String>, indices: Vec<usize>, target: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            indices,
            target,
        }
    }
}

/// On-disk catalog layout.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    state_dim: usize,
    tasks: Vec<TaskSpec>,
}

/// Validated, ordered table of sub-tasks.
#[derive(Debug, Clone)]
pub struct TaskCatalog {
    state_dim: usize,
    tasks: Vec<TaskSpec>,
    by_name: HashMap<String, usize>,
    required_dim: usize,
}

impl TaskCatalog {
    /// Builds and validates a catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if a task name repeats, an index range is empty, a
    /// target length differs from its index count, an index falls outside the
    /// object state, or two tasks share an index.
    pub fn new(state_dim: usize, tasks: Vec<TaskSpec>) -> Result<Self, CatalogError> {
        if state_dim == 0 {
            return Err(CatalogError::ZeroStateDim);
        }

        let mut by_name = HashMap::with_capacity(tasks.len());
        let mut owner: HashMap<usize, &str> = HashMap::new();

        for (position, task) in tasks.iter().enumerate() {
            if by_name.insert(task.name.clone(), position).is_some() {
                return Err(CatalogError::DuplicateTask(task.name.clone()));
            }
            if task.indices.is_empty() {
                return Err(CatalogError::EmptyIndexRange(task.name.clone()));
            }
            if task.indices.len() != task.target.len() {
                return Err(CatalogError::TargetLengthMismatch {
                    task: task.name.clone(),
                    indices: task.indices.len(),
                    targets: task.target.len(),
                });
            }
            for &index in &task.indices {
                if index >= state_dim {
                    return Err(CatalogError::IndexOutOfBounds {
                        task: task.name.clone(),
                        index,
                        state_dim,
                    });
                }
                if let Some(first) = owner.insert(index, &task.name) {
                    return Err(CatalogError::OverlappingRanges {
                        first: first.to_string(),
                        second: task.name.clone(),
                        index,
                    });
                }
            }
        }

        let required_dim = required_dim_of(&tasks);
        Ok(Self {
            state_dim,
            tasks,
            by_name,
            required_dim,
        })
    }

    /// The kitchen benchmark catalog.
    pub fn kitchen() -> Self {
        let tasks = kitchen_tasks();
        let by_name = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        let required_dim = required_dim_of(&tasks);
        Self {
            state_dim: KITCHEN_STATE_DIM,
            tasks,
            by_name,
            required_dim,
        }
    }

    /// Parses and validates a catalog from YAML.
    ///
    /// ```yaml
    /// state_dim: 30
    /// tasks:
    ///   - name: slide cabinet
    ///     indices: [19]
    ///     target: [0.37]
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Self::new(file.state_dim, file.tasks)
    }

    /// Loads and validates a catalog from a YAML file.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::from_yaml_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            tasks = catalog.len(),
            state_dim = catalog.state_dim,
            "Task catalog loaded"
        );
        Ok(catalog)
    }

    /// Length of the object-state (and goal) vector.
    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    /// Smallest object-state length that covers every task index.
    pub fn required_dim(&self) -> usize {
        self.required_dim
    }

    /// Number of tasks in the catalog.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the catalog has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in catalog order.
    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    /// Task names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    /// Whether `name` is a catalog task.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Looks up a task by name.
    pub fn get(&self, name: &str) -> Result<&TaskSpec, CatalogError> {
        self.by_name
            .get(name)
            .map(|&i| &self.tasks[i])
            .ok_or_else(|| CatalogError::UnknownTask(name.to_string()))
    }

    /// Checks that every name is a catalog task.
    pub fn check_names<S: AsRef<str>>(&self, names: &[S]) -> Result<(), CatalogError> {
        for name in names {
            self.get(name.as_ref())?;
        }
        Ok(())
    }
}

impl Default for TaskCatalog {
    fn default() -> Self {
        Self::kitchen()
    }
}

/// Smallest object-state length covering every index of `tasks`.
fn required_dim_of(tasks: &[TaskSpec]) -> usize {
    tasks
        .iter()
        .flat_map(|t| t.indices.iter())
        .map(|&i| i + 1)
        .max()
        .unwrap_or(0)
}

/// Kitchen task table in catalog order.
pub fn kitchen_tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec::new("bottom burner", vec![9, 10], vec![-0.88, -0.01]),
        TaskSpec::new("top burner", vec![13, 14], vec![-0.92, -0.01]),
        TaskSpec::new("light switch", vec![17, 18], vec![-0.69, -0.05]),
        TaskSpec::new("slide cabinet", vec![19], vec![0.37]),
        TaskSpec::new("hinge cabinet", vec![20, 21], vec![-1.2, 0.0]),
        TaskSpec::new("microwave", vec![22], vec![-0.75]),
        TaskSpec::new(
            "kettle",
            (23..=29).collect(),
            vec![-0.27, 0.75, 1.62, 0.99, 0.0, 0.0, -0.06],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kitchen_catalog_is_valid() {
        let validated = TaskCatalog::new(KITCHEN_STATE_DIM, kitchen_tasks())
            .expect("kitchen catalog should validate");
        let builtin = TaskCatalog::kitchen();
        assert_eq!(validated.tasks(), builtin.tasks());
        assert_eq!(validated.required_dim(), builtin.required_dim());
        assert_eq!(builtin.len(), 7);
        assert_eq!(builtin.state_dim(), 30);
        assert_eq!(builtin.required_dim(), 30);
    }

    #[test]
    fn test_required_dim_follows_table() {
        let tasks = vec![
            TaskSpec::new("slide cabinet", vec![19], vec![0.37]),
            TaskSpec::new("bottom burner", vec![9, 10], vec![-0.88, -0.01]),
        ];
        assert_eq!(required_dim_of(&tasks), 20);
        assert_eq!(required_dim_of(&[]), 0);

        let catalog = TaskCatalog::new(KITCHEN_STATE_DIM, tasks.clone()).unwrap();
        assert_eq!(catalog.required_dim(), required_dim_of(&tasks));
    }

    #[test]
    fn test_lookup_by_name() {
        let catalog = TaskCatalog::kitchen();
        let slide = catalog.get("slide cabinet").unwrap();
        assert_eq!(slide.indices, vec![19]);
        assert_eq!(slide.target, vec![0.37]);
        assert_eq!(catalog.get("kettle").unwrap().indices.len(), 7);
    }

    #[test]
    fn test_unknown_task() {
        let catalog = TaskCatalog::kitchen();
        let err = catalog.get("dishwasher").unwrap_err();
        assert!(matches!(err, CatalogError::UnknownTask(ref n) if n == "dishwasher"));
        assert!(catalog.check_names(&["kettle", "oven"]).is_err());
        assert!(catalog.check_names(&["kettle", "microwave"]).is_ok());
    }

    #[test]
    fn test_names_preserve_catalog_order() {
        let catalog = TaskCatalog::kitchen();
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names.first(), Some(&"bottom burner"));
        assert_eq!(names.last(), Some(&"kettle"));
    }

    #[test]
    fn test_rejects_duplicate_task() {
        let tasks = vec![
            TaskSpec::new("a", vec![0], vec![1.0]),
            TaskSpec::new("a", vec![1], vec![1.0]),
        ];
        let result = TaskCatalog::new(4, tasks);
        assert!(matches!(result, Err(CatalogError::DuplicateTask(_))));
    }

    #[test]
    fn test_rejects_target_length_mismatch() {
        let tasks = vec![TaskSpec::new("a", vec![0, 1], vec![1.0])];
        let result = TaskCatalog::new(4, tasks);
        assert!(matches!(
            result,
            Err(CatalogError::TargetLengthMismatch {
                indices: 2,
                targets: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_out_of_bounds_index() {
        let tasks = vec![TaskSpec::new("a", vec![3, 4], vec![0.0, 0.0])];
        let result = TaskCatalog::new(4, tasks);
        assert!(matches!(
            result,
            Err(CatalogError::IndexOutOfBounds { index: 4, .. })
        ));
    }

    #[test]
    fn test_rejects_overlapping_ranges() {
        let tasks = vec![
            TaskSpec::new("a", vec![0, 1], vec![0.0, 0.0]),
            TaskSpec::new("b", vec![1, 2], vec![0.0, 0.0]),
        ];
        let result = TaskCatalog::new(4, tasks);
        match result {
            Err(CatalogError::OverlappingRanges {
                first,
                second,
                index,
            }) => {
                assert_eq!(first, "a");
                assert_eq!(second, "b");
                assert_eq!(index, 1);
            }
            other => panic!("expected overlap error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_empty_range_and_zero_dim() {
        let tasks = vec![TaskSpec::new("a", vec![], vec![])];
        assert!(matches!(
            TaskCatalog::new(4, tasks),
            Err(CatalogError::EmptyIndexRange(_))
        ));
        assert!(matches!(
            TaskCatalog::new(0, vec![]),
            Err(CatalogError::ZeroStateDim)
        ));
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
state_dim: 4
tasks:
  - name: lever
    indices: [1]
    target: [0.5]
  - name: door
    indices: [2, 3]
    target: [1.0, -1.0]
"#;
        let catalog = TaskCatalog::from_yaml_str(yaml).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.required_dim(), 4);
        assert_eq!(catalog.get("door").unwrap().target, vec![1.0, -1.0]);
    }

    #[test]
    fn test_from_yaml_validates() {
        let yaml = r#"
state_dim: 2
tasks:
  - name: lever
    indices: [5]
    target: [0.5]
"#;
        assert!(matches!(
            TaskCatalog::from_yaml_str(yaml),
            Err(CatalogError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(
            &path,
            "state_dim: 3\ntasks:\n  - name: knob\n    indices: [0]\n    target: [0.1]\n",
        )
        .unwrap();
        let catalog = TaskCatalog::from_path(&path).unwrap();
        assert!(catalog.contains("knob"));
        assert_eq!(catalog.required_dim(), 1);
    }
}
