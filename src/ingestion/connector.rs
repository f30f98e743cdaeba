//! Source Connector - Read capability over newline-delimited JSON files

use crate::error::{EtlError, Result};
use crate::ingestion::schema_inference::SchemaInference;
use polars::prelude::*;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read capability consumed by the pipeline.
///
/// Implementations:
/// - NdjsonSource: local newline-delimited JSON files matched by a glob
pub trait TableSource: Send + Sync {
    /// Read every file matching `pattern` and union their rows into one table
    fn read(&self, pattern: &str) -> Result<DataFrame>;
}

/// Newline-delimited JSON files under a root directory
pub struct NdjsonSource {
    root: PathBuf,
}

impl NdjsonSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a glob pattern relative to the root into a sorted file list
    pub fn resolve(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let full_pattern = self.root.join(pattern);
        let full_pattern = full_pattern.to_string_lossy();

        let entries = glob::glob(&full_pattern)
            .map_err(|e| EtlError::SourceRead(format!("Invalid pattern {}: {}", full_pattern, e)))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| EtlError::SourceRead(format!("Failed to list {}: {}", full_pattern, e)))?;
            if path.is_file() {
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(EtlError::SourceRead(format!(
                "Pattern {} matched no files",
                full_pattern
            )));
        }

        files.sort();
        Ok(files)
    }

    fn read_file(&self, path: &Path, records: &mut Vec<Map<String, Value>>) -> Result<()> {
        let content = fs::read_to_string(path)
            .map_err(|e| EtlError::SourceRead(format!("Failed to read {}: {}", path.display(), e)))?;

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(line).map_err(|e| {
                EtlError::SourceRead(format!(
                    "{}:{}: invalid JSON: {}",
                    path.display(),
                    line_no + 1,
                    e
                ))
            })?;

            match value {
                Value::Object(record) => records.push(record),
                other => {
                    return Err(EtlError::SourceRead(format!(
                        "{}:{}: expected a JSON object, found {}",
                        path.display(),
                        line_no + 1,
                        json_kind(&other)
                    )));
                }
            }
        }

        Ok(())
    }
}

impl TableSource for NdjsonSource {
    fn read(&self, pattern: &str) -> Result<DataFrame> {
        let files = self.resolve(pattern)?;

        let mut records = Vec::new();
        for file in &files {
            let before = records.len();
            self.read_file(file, &mut records)?;
            debug!(file = %file.display(), records = records.len() - before, "Read source file");
        }

        let df = SchemaInference::to_dataframe(&records)?;
        info!(pattern, files = files.len(), rows = df.height(), columns = df.width(), "Source read");
        Ok(df)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_read_unions_files_across_levels() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "song_data/A/B/C/one.json", r#"{"song_id": "S1", "year": 0}"#);
        write(dir.path(), "song_data/A/B/D/two.json", "{\"song_id\": \"S2\"}\n\n{\"song_id\": \"S3\", \"title\": \"x\"}\n");

        let source = NdjsonSource::new(dir.path());
        let df = source.read("song_data/*/*/*/*.json").unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.column("title").unwrap().null_count(), 2);
    }

    #[test]
    fn test_unmatched_pattern_is_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = NdjsonSource::new(dir.path());

        let err = source.read("log_data/*/*/*.json").unwrap_err();
        assert!(matches!(err, EtlError::SourceRead(_)));
    }

    #[test]
    fn test_invalid_json_reports_file_and_line() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "log_data/bad.json", "{\"page\": \"Home\"}\n{not json\n");

        let source = NdjsonSource::new(dir.path());
        let err = source.read("log_data/*.json").unwrap_err();

        match err {
            EtlError::SourceRead(msg) => assert!(msg.contains("bad.json:2")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_object_line_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "log_data/list.json", "[1, 2, 3]\n");

        let source = NdjsonSource::new(dir.path());
        let err = source.read("log_data/*.json").unwrap_err();

        assert!(matches!(err, EtlError::SourceRead(_)));
    }
}
