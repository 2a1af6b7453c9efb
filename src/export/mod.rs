//! Export module for relabeled datasets.
//!
//! Provides Parquet dataset export and loading, plus dataset summaries.

pub mod dataset;
pub mod parquet_writer;

pub use dataset::{summarize, DatasetMetadata, DatasetSummary, LoadedDataset, METADATA_KEY};
pub use parquet_writer::{
    dataset_schema, episodes_to_record_batch, read_parquet, write_parquet, write_parquet_bytes,
};
