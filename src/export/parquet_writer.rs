//! Parquet writer for relabeled datasets.
//!
//! One row per step, episodes concatenated in order. Numeric vectors are
//! stored as `list<float32>`; episode boundaries are recovered from the
//! `terminals` column. The relabeling goal is kept in the schema metadata.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, BooleanBuilder, Float32Array, Float32Builder, ListArray,
    ListBuilder, UInt32Array, UInt32Builder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::{Array1, Array2};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::dataset::{DatasetMetadata, LoadedDataset, METADATA_KEY};
use crate::error::ExportError;
use crate::trajectory::EpisodeRecord;

fn vector_field(name: &str) -> Field {
    Field::new_list(name, Field::new("item", DataType::Float32, true), false)
}

/// Schema of a relabeled dataset.
pub fn dataset_schema() -> Schema {
    Schema::new(vec![
        vector_field("states"),
        vector_field("observations"),
        vector_field("actions"),
        Field::new("rewards", DataType::Float32, false),
        Field::new("terminals", DataType::Boolean, false),
        Field::new("log_index", DataType::UInt32, false),
    ])
}

/// Convert episodes into a single Arrow RecordBatch.
pub fn episodes_to_record_batch(
    episodes: &[EpisodeRecord],
    metadata: Option<&DatasetMetadata>,
) -> Result<RecordBatch, ExportError> {
    let steps: usize = episodes.iter().map(EpisodeRecord::len).sum();
    if steps == 0 {
        return Err(ExportError::NoSteps);
    }

    let mut schema = dataset_schema();
    if let Some(metadata) = metadata {
        let json = serde_json::to_string(metadata)
            .map_err(|e| ExportError::InvalidFormat(format!("metadata: {}", e)))?;
        schema = schema.with_metadata(HashMap::from([(METADATA_KEY.to_string(), json)]));
    }

    let mut states = ListBuilder::new(Float32Builder::new());
    let mut observations = ListBuilder::new(Float32Builder::new());
    let mut actions = ListBuilder::new(Float32Builder::new());
    let mut rewards = Float32Builder::with_capacity(steps);
    let mut terminals = BooleanBuilder::with_capacity(steps);
    let mut log_index = UInt32Builder::with_capacity(steps);

    for episode in episodes {
        append_rows(&mut states, episode.states());
        append_rows(&mut observations, episode.observations());
        append_rows(&mut actions, episode.actions());
        for (&reward, &terminal) in episode.rewards().iter().zip(episode.terminals()) {
            rewards.append_value(reward as f32);
            terminals.append_value(terminal);
            log_index.append_value(episode.log_index());
        }
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(states.finish()),
        Arc::new(observations.finish()),
        Arc::new(actions.finish()),
        Arc::new(rewards.finish()),
        Arc::new(terminals.finish()),
        Arc::new(log_index.finish()),
    ];

    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

fn append_rows(builder: &mut ListBuilder<Float32Builder>, rows: &Array2<f64>) {
    for row in rows.rows() {
        for &v in row {
            builder.values().append_value(v as f32);
        }
        builder.append(true);
    }
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .build()
}

/// Write episodes to a Parquet file on disk.
pub fn write_parquet(
    episodes: &[EpisodeRecord],
    metadata: Option<&DatasetMetadata>,
    output_path: &Path,
) -> Result<(), ExportError> {
    let batch = episodes_to_record_batch(episodes, metadata)?;

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(output_path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(writer_properties()))?;
    writer.write(&batch)?;
    writer.close()?;

    tracing::info!(
        path = %output_path.display(),
        rows = batch.num_rows(),
        episodes = episodes.len(),
        "Parquet file written"
    );

    Ok(())
}

/// Write episodes to Parquet bytes in memory.
pub fn write_parquet_bytes(
    episodes: &[EpisodeRecord],
    metadata: Option<&DatasetMetadata>,
) -> Result<Vec<u8>, ExportError> {
    let batch = episodes_to_record_batch(episodes, metadata)?;

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(writer_properties()))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(buf)
}

/// Per-step columns of one record batch.
struct Columns<'a> {
    states: &'a ListArray,
    observations: &'a ListArray,
    actions: &'a ListArray,
    rewards: &'a Float32Array,
    terminals: &'a BooleanArray,
    log_index: &'a UInt32Array,
}

impl<'a> Columns<'a> {
    fn from_batch(batch: &'a RecordBatch) -> Result<Self, ExportError> {
        fn column<'b, T: 'static>(
            batch: &'b RecordBatch,
            name: &str,
        ) -> Result<&'b T, ExportError> {
            batch
                .column_by_name(name)
                .and_then(|col| col.as_any().downcast_ref::<T>())
                .ok_or_else(|| {
                    ExportError::InvalidFormat(format!("missing or mistyped column '{}'", name))
                })
        }

        Ok(Self {
            states: column(batch, "states")?,
            observations: column(batch, "observations")?,
            actions: column(batch, "actions")?,
            rewards: column(batch, "rewards")?,
            terminals: column(batch, "terminals")?,
            log_index: column(batch, "log_index")?,
        })
    }
}

fn list_row(list: &ListArray, i: usize) -> Result<Vec<f64>, ExportError> {
    let values = list.value(i);
    let values = values
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| ExportError::InvalidFormat("list values are not float32".to_string()))?;
    Ok(values.values().iter().map(|&v| f64::from(v)).collect())
}

/// Accumulates rows of one episode.
#[derive(Default)]
struct EpisodeRows {
    states: Vec<Vec<f64>>,
    observations: Vec<Vec<f64>>,
    actions: Vec<Vec<f64>>,
    rewards: Vec<f64>,
    terminals: Vec<bool>,
    log_index: u32,
}

impl EpisodeRows {
    fn finish(self, goal: &Array1<f64>) -> Result<EpisodeRecord, ExportError> {
        Ok(EpisodeRecord::from_parts(
            self.log_index,
            stack("states", self.states)?,
            stack("observations", self.observations)?,
            stack("actions", self.actions)?,
            self.rewards,
            self.terminals,
            goal.clone(),
        ))
    }
}

fn stack(field: &str, rows: Vec<Vec<f64>>) -> Result<Array2<f64>, ExportError> {
    let n = rows.len();
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if rows.iter().any(|r| r.len() != width) {
        return Err(ExportError::InvalidFormat(format!(
            "'{}' rows differ in width within an episode",
            field
        )));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n, width), flat)
        .map_err(|e| ExportError::InvalidFormat(format!("{}: {}", field, e)))
}

/// Read a relabeled dataset, splitting rows back into episodes at terminals.
pub fn read_parquet(input_path: &Path) -> Result<LoadedDataset, ExportError> {
    let file = std::fs::File::open(input_path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let metadata: Option<DatasetMetadata> = builder
        .schema()
        .metadata()
        .get(METADATA_KEY)
        .map(|json| serde_json::from_str::<DatasetMetadata>(json))
        .transpose()
        .map_err(|e| ExportError::InvalidFormat(format!("metadata: {}", e)))?;
    let goal = metadata
        .as_ref()
        .map(|m| Array1::from(m.goal.clone()))
        .unwrap_or_else(|| Array1::zeros(0));

    let reader = builder.build()?;
    let mut episodes = Vec::new();
    let mut current = EpisodeRows::default();

    for batch_result in reader {
        let batch = batch_result?;
        let cols = Columns::from_batch(&batch)?;

        for i in 0..batch.num_rows() {
            if cols.rewards.is_null(i) || cols.terminals.is_null(i) || cols.log_index.is_null(i) {
                return Err(ExportError::InvalidFormat(format!("null value in row {}", i)));
            }
            let log_index = cols.log_index.value(i);
            if !current.rewards.is_empty() && current.log_index != log_index {
                return Err(ExportError::InvalidFormat(format!(
                    "episode from log {} continues into log {} without a terminal",
                    current.log_index, log_index
                )));
            }
            current.log_index = log_index;
            current.states.push(list_row(cols.states, i)?);
            current.observations.push(list_row(cols.observations, i)?);
            current.actions.push(list_row(cols.actions, i)?);
            current.rewards.push(f64::from(cols.rewards.value(i)));

            let terminal = cols.terminals.value(i);
            current.terminals.push(terminal);
            if terminal {
                episodes.push(std::mem::take(&mut current).finish(&goal)?);
            }
        }
    }

    if !current.rewards.is_empty() {
        return Err(ExportError::InvalidFormat(format!(
            "dataset ends with {} steps after the last terminal",
            current.rewards.len()
        )));
    }

    tracing::info!(
        path = %input_path.display(),
        episodes = episodes.len(),
        "Parquet file loaded"
    );

    Ok(LoadedDataset { metadata, episodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn make_episode(log_index: u32, rewards: Vec<f64>) -> EpisodeRecord {
        let n = rewards.len();
        EpisodeRecord::new(
            log_index,
            Array2::from_shape_fn((n, 3), |(i, j)| (i + j) as f64),
            Array2::from_shape_fn((n, 4), |(i, _)| i as f64 * 0.5),
            Array2::from_shape_fn((n, 2), |(_, j)| j as f64 - 0.25),
            rewards,
            array![1.0, 2.0],
        )
    }

    fn metadata() -> DatasetMetadata {
        DatasetMetadata {
            target_tasks: vec!["microwave".to_string()],
            goal: vec![1.0, 2.0],
            tolerance: 0.3,
            goal_offset: 2,
        }
    }

    #[test]
    fn test_schema_fields() {
        let schema = dataset_schema();
        assert!(schema.field_with_name("states").is_ok());
        assert!(schema.field_with_name("observations").is_ok());
        assert!(schema.field_with_name("actions").is_ok());
        assert!(schema.field_with_name("rewards").is_ok());
        assert!(schema.field_with_name("terminals").is_ok());
        assert!(schema.field_with_name("log_index").is_ok());
        assert_eq!(schema.fields().len(), 6);
    }

    #[test]
    fn test_episodes_to_record_batch() {
        let episodes = vec![make_episode(0, vec![0.0, 1.0]), make_episode(1, vec![2.0])];
        let batch = episodes_to_record_batch(&episodes, None).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 6);
    }

    #[test]
    fn test_write_and_read_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("kitchen.parquet");
        let episodes = vec![
            make_episode(0, vec![0.0, 1.0, 1.0]),
            make_episode(0, vec![2.0]),
            make_episode(2, vec![0.0, 0.0]),
        ];

        write_parquet(&episodes, Some(&metadata()), &path).unwrap();
        assert!(path.exists());

        let loaded = read_parquet(&path).unwrap();
        assert_eq!(loaded.metadata, Some(metadata()));
        assert_eq!(loaded.episodes.len(), 3);
        assert_eq!(loaded.episodes[0].len(), 3);
        assert_eq!(loaded.episodes[0].rewards(), &[0.0, 1.0, 1.0]);
        assert_eq!(loaded.episodes[0].terminals(), &[false, false, true]);
        assert_eq!(loaded.episodes[2].log_index(), 2);
        assert_eq!(loaded.episodes[0].states(), episodes[0].states());
        assert_eq!(loaded.episodes[1].actions(), episodes[1].actions());
        assert_eq!(loaded.episodes[0].goal(), &array![1.0, 2.0]);
    }

    #[test]
    fn test_write_parquet_bytes() {
        let bytes = write_parquet_bytes(&[make_episode(0, vec![1.0])], None).unwrap();
        assert!(!bytes.is_empty());
        // Parquet magic bytes: PAR1
        assert_eq!(&bytes[..4], b"PAR1");
    }

    #[test]
    fn test_empty_episodes_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.parquet");
        assert!(matches!(
            write_parquet(&[], None, &path),
            Err(ExportError::NoSteps)
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_metadata_reads_empty_goal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.parquet");
        write_parquet(&[make_episode(5, vec![0.0])], None, &path).unwrap();

        let loaded = read_parquet(&path).unwrap();
        assert!(loaded.metadata.is_none());
        assert!(loaded.episodes[0].goal().is_empty());
        assert_eq!(loaded.episodes[0].log_index(), 5);
    }
}
