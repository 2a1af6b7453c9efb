//! Raw log storage and discovery.
//!
//! Raw logs are JSON files in the [`RawLogFile`] layout. Discovery walks a
//! directory tree, keeps files with the configured extension, drops paths
//! matching an optional exclusion pattern and returns the rest sorted so that
//! runs are reproducible.

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use super::types::{RawLog, RawLogFile};
use crate::error::RelabelError;

/// A log the relabeling pipeline can load on demand.
pub trait LogSource {
    /// Name used in reports and error messages.
    fn name(&self) -> String;

    /// Reads the log.
    fn load(&self) -> Result<RawLog, RelabelError>;
}

impl LogSource for RawLog {
    fn name(&self) -> String {
        RawLog::name(self).to_string()
    }

    fn load(&self) -> Result<RawLog, RelabelError> {
        Ok(self.clone())
    }
}

/// Raw log stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonLogFile {
    path: PathBuf,
}

impl JsonLogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSource for JsonLogFile {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<RawLog, RelabelError> {
        load_raw_log(&self.path)
    }
}

/// Reads one raw log file.
pub fn load_raw_log(path: &Path) -> Result<RawLog, RelabelError> {
    let contents = std::fs::read_to_string(path)?;
    let file: RawLogFile = serde_json::from_str(&contents)?;
    RawLog::from_file(path.display().to_string(), file)
}

/// Writes a raw log as JSON, creating parent directories.
pub fn save_raw_log(log: &RawLog, path: &Path) -> Result<(), RelabelError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(&log.to_file())?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Finds raw log files under `root`, sorted by path.
///
/// # Arguments
///
/// * `root` - Directory to search recursively
/// * `extension` - File extension to keep, without the dot
/// * `exclude` - Paths matching this pattern are skipped
pub fn discover_logs(
    root: &Path,
    extension: &str,
    exclude: Option<&Regex>,
) -> Result<Vec<JsonLogFile>, RelabelError> {
    let mut paths = Vec::new();
    let mut excluded = 0usize;

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().map(|e| e == extension).unwrap_or(false) {
            if exclude.is_some_and(|re| re.is_match(&path.to_string_lossy())) {
                excluded += 1;
                continue;
            }
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    tracing::info!(
        root = %root.display(),
        found = paths.len(),
        excluded,
        "Discovered raw logs"
    );

    Ok(paths.into_iter().map(JsonLogFile::new).collect())
}
