//! End-to-end tests for the relabeling pipeline.
//!
//! Raw logs are written to a temporary directory, discovered, relabeled,
//! exported to Parquet and read back.

use std::path::Path;

use kitchen_forge::export::{read_parquet, summarize, write_parquet, DatasetMetadata};
use kitchen_forge::pipeline::{MissingTerminalPolicy, RelabelConfig, RelabelPipeline, TerminalMode};
use kitchen_forge::trajectory::{discover_logs, save_raw_log, RawLog};
use kitchen_forge::{RelabelError, TaskCatalog};
use ndarray::Array2;
use regex::Regex;

const OBS_DIM: usize = 60;

/// Observation row with `tasks` on their targets and an unrelated stale goal.
fn obs_row(tasks: &[&str]) -> Vec<f64> {
    let catalog = TaskCatalog::kitchen();
    let mut row = vec![0.0; OBS_DIM];
    for name in tasks {
        let task = catalog.get(name).expect("known task");
        for (&i, &v) in task.indices.iter().zip(&task.target) {
            row[i] = v;
        }
    }
    // stale goal from the recording session
    for v in row.iter_mut().skip(30) {
        *v = 9.0;
    }
    row
}

fn make_log(name: &str, rows: Vec<Vec<f64>>, terminals: Vec<bool>) -> RawLog {
    let n = rows.len();
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    RawLog::new(
        name,
        Array2::from_shape_fn((n, 39), |(i, j)| (i * 100 + j) as f64),
        Array2::from_shape_vec((n, OBS_DIM), flat).expect("observation shape"),
        Array2::from_shape_fn((n, 9), |(i, _)| i as f64 * 0.1),
        terminals,
    )
    .expect("consistent log")
}

/// Demonstration: microwave, then kettle, then idle; one terminal at the end.
fn microwave_kettle_demo(name: &str) -> RawLog {
    make_log(
        name,
        vec![
            obs_row(&[]),
            obs_row(&["microwave"]),
            obs_row(&["microwave", "kettle"]),
            obs_row(&["microwave", "kettle"]),
        ],
        vec![false, false, false, true],
    )
}

/// Two back-to-back episodes in one capture.
fn two_episode_demo(name: &str) -> RawLog {
    make_log(
        name,
        vec![
            obs_row(&[]),
            obs_row(&["kettle"]),
            obs_row(&[]),
            obs_row(&["microwave"]),
            obs_row(&["microwave"]),
        ],
        vec![false, true, false, false, true],
    )
}

fn write_demos(root: &Path) {
    save_raw_log(
        &microwave_kettle_demo("mk"),
        &root.join("microwave_kettle").join("demo_0.json"),
    )
    .unwrap();
    save_raw_log(
        &two_episode_demo("two"),
        &root.join("kettle_light").join("demo_0.json"),
    )
    .unwrap();
    // missing terminal flags entirely
    save_raw_log(
        &make_log("open", vec![obs_row(&[]); 3], vec![false; 3]),
        &root.join("open_ended").join("demo_0.json"),
    )
    .unwrap();
}

fn pipeline(config: RelabelConfig) -> RelabelPipeline {
    RelabelPipeline::from_config(config).expect("valid pipeline")
}

#[test]
fn test_relabel_directory_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let demos = dir.path().join("demos");
    write_demos(&demos);

    let config = RelabelConfig::default().with_target_tasks(&["microwave", "kettle"]);
    let p = pipeline(config);
    let logs = discover_logs(&demos, "json", None).unwrap();
    assert_eq!(logs.len(), 3);

    let output = p.run(&logs).unwrap();
    let report = &output.report;

    // sorted: kettle_light, microwave_kettle, open_ended
    assert_eq!(report.logs_seen, 3);
    assert_eq!(report.logs_succeeded, 2);
    assert_eq!(report.logs_failed, 1);
    assert!(report.failures[0].log.contains("open_ended"));
    assert!(report.failures[0].reason.contains("no terminal"));

    assert_eq!(output.episodes.len(), 3);
    let lens: Vec<usize> = output.episodes.iter().map(|e| e.len()).collect();
    assert_eq!(lens, vec![2, 3, 4]);
    assert_eq!(report.retained_steps, 9);
    assert_eq!(output.total_steps(), 9);

    // kettle before microwave earns nothing
    assert_eq!(output.episodes[0].rewards(), &[0.0, 0.0]);
    assert_eq!(output.episodes[1].rewards(), &[0.0, 1.0, 1.0]);
    assert_eq!(output.episodes[2].rewards(), &[0.0, 1.0, 2.0, 2.0]);
    assert_eq!(output.episodes[0].log_index(), 0);
    assert_eq!(output.episodes[2].log_index(), 1);

    for episode in &output.episodes {
        let last = episode.len() - 1;
        for (i, &terminal) in episode.terminals().iter().enumerate() {
            assert_eq!(terminal, i == last);
        }
        for row in episode.observations().rows() {
            assert_eq!(row.slice(ndarray::s![30..]), p.goal().view());
        }
    }

    // write and read back
    let out_path = dir.path().join("out").join("kitchen.parquet");
    let metadata = DatasetMetadata {
        target_tasks: p.config().target_tasks.clone(),
        goal: p.goal().to_vec(),
        tolerance: p.config().tolerance,
        goal_offset: p.config().goal_offset,
    };
    write_parquet(&output.episodes, Some(&metadata), &out_path).unwrap();

    let loaded = read_parquet(&out_path).unwrap();
    assert_eq!(loaded.metadata.as_ref(), Some(&metadata));
    assert_eq!(loaded.episodes.len(), 3);
    for (orig, back) in output.episodes.iter().zip(&loaded.episodes) {
        assert_eq!(orig.len(), back.len());
        assert_eq!(orig.rewards(), back.rewards());
        assert_eq!(orig.terminals(), back.terminals());
        assert_eq!(orig.log_index(), back.log_index());
        for (a, b) in orig.observations().iter().zip(back.observations().iter()) {
            assert!((a - b).abs() < 1e-6, "observation drift {} vs {}", a, b);
        }
    }

    let summary = summarize(&loaded.episodes, Some(2));
    assert_eq!(summary.steps, 9);
    assert_eq!(summary.logs, 2);
    assert_eq!(summary.successful_episodes, 1);
}

#[test]
fn test_warn_and_terminate_recovers_open_log() {
    let dir = tempfile::tempdir().unwrap();
    write_demos(dir.path());

    let config = RelabelConfig::default()
        .with_target_tasks(&["microwave", "kettle"])
        .with_missing_terminal(MissingTerminalPolicy::WarnAndTerminate);
    let logs = discover_logs(dir.path(), "json", None).unwrap();
    let output = pipeline(config).run(&logs).unwrap();

    assert_eq!(output.report.logs_failed, 0);
    assert_eq!(output.report.logs_succeeded, 3);
    assert_eq!(output.episodes.len(), 4);
    assert_eq!(output.report.warnings.len(), 1);
    assert!(output.report.warnings[0].contains("no terminal flag"));
}

#[test]
fn test_exclusion_filter() {
    let dir = tempfile::tempdir().unwrap();
    write_demos(dir.path());

    let exclude = Regex::new("microwave|open_ended").unwrap();
    let logs = discover_logs(dir.path(), "json", Some(&exclude)).unwrap();
    assert_eq!(logs.len(), 1);

    let output = pipeline(RelabelConfig::default()).run(&logs).unwrap();
    assert_eq!(output.episodes.len(), 2);
    assert_eq!(output.report.logs_failed, 0);
}

#[test]
fn test_first_success_mode() {
    let config = RelabelConfig::default()
        .with_target_tasks(&["microwave", "kettle"])
        .with_terminal_mode(TerminalMode::FirstSuccess);
    let logs = vec![microwave_kettle_demo("mk")];
    let output = pipeline(config).run(&logs).unwrap();

    assert_eq!(output.episodes.len(), 1);
    assert_eq!(output.episodes[0].rewards(), &[0.0, 1.0, 2.0]);
    assert_eq!(output.report.dropped_steps, 1);
    assert_eq!(output.report.retained_steps, 3);
}

#[test]
fn test_malformed_file_does_not_abort_batch() {
    let dir = tempfile::tempdir().unwrap();
    save_raw_log(&microwave_kettle_demo("mk"), &dir.path().join("a.json")).unwrap();
    std::fs::write(
        dir.path().join("b.json"),
        r#"{"states": [[1.0]], "observations": [[1.0, 2.0]], "actions": []}"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("c.json"), "not json").unwrap();

    let logs = discover_logs(dir.path(), "json", None).unwrap();
    let output = pipeline(RelabelConfig::default()).run(&logs).unwrap();

    assert_eq!(output.report.logs_succeeded, 1);
    assert_eq!(output.report.logs_failed, 2);
    assert!(output.report.failures[0].reason.contains("field lengths differ"));
    assert!(output.report.failures[1].reason.contains("JSON"));
}

#[test]
fn test_all_logs_failing_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("c.json"), "not json").unwrap();
    let logs = discover_logs(dir.path(), "json", None).unwrap();

    let result = pipeline(RelabelConfig::default()).run(&logs);
    assert!(matches!(result, Err(RelabelError::AllLogsFailed { failed: 1 })));
}

#[test]
fn test_yaml_catalog_drives_relabeling() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.yaml");
    std::fs::write(
        &catalog_path,
        r#"
state_dim: 30
tasks:
  - name: microwave
    indices: [22]
    target: [-0.75]
  - name: drawer
    indices: [5]
    target: [0.5]
"#,
    )
    .unwrap();

    let config = RelabelConfig::default()
        .with_catalog_path(&catalog_path)
        .with_target_tasks(&["drawer", "microwave"]);
    let p = pipeline(config);

    let mut opened = obs_row(&["microwave"]);
    opened[5] = 0.5;
    let logs = vec![make_log("yaml", vec![obs_row(&["microwave"]), opened], vec![false, true])];
    let output = p.run(&logs).unwrap();
    assert_eq!(output.episodes[0].rewards(), &[0.0, 2.0]);
}
