//! Parquet Sink
//!
//! Writes tables as Parquet files under an output root, one file per
//! partition-key combination in Hive-style directories.

use crate::error::{EtlError, Result};
use crate::storage::partition::partition_path;
use polars::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Marker file written once a table has been completely written
pub const SUCCESS_MARKER: &str = "_SUCCESS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Replace whatever exists at the location
    Overwrite,
    /// Add new part files next to existing ones
    Append,
}

/// Outcome of one table write
#[derive(Debug, Clone, Serialize)]
pub struct WriteSummary {
    pub location: PathBuf,
    pub rows: usize,
    pub files: usize,
}

/// Write capability consumed by the pipeline
pub trait TableSink: Send + Sync {
    fn write(
        &self,
        table: &mut DataFrame,
        location: &str,
        mode: WriteMode,
        partition_by: &[&str],
    ) -> Result<WriteSummary>;
}

/// Local filesystem Parquet writer
pub struct ParquetSink {
    root: PathBuf,
}

impl ParquetSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn prepare_location(&self, table_dir: &Path, mode: WriteMode) -> Result<()> {
        if mode == WriteMode::Overwrite && table_dir.exists() {
            fs::remove_dir_all(table_dir)
                .map_err(|e| write_error(table_dir, "remove previous output", e))?;
        }
        fs::create_dir_all(table_dir)
            .map_err(|e| write_error(table_dir, "create directory", e))?;

        // A rerun in append mode must not look complete until it finishes
        let marker = table_dir.join(SUCCESS_MARKER);
        if marker.exists() {
            fs::remove_file(&marker)
                .map_err(|e| write_error(&marker, "remove marker", e))?;
        }
        Ok(())
    }

    fn write_part(&self, dir: &Path, file_name: &str, df: &mut DataFrame) -> Result<()> {
        fs::create_dir_all(dir)
            .map_err(|e| write_error(dir, "create directory", e))?;

        let path = dir.join(file_name);
        let mut file = fs::File::create(&path)
            .map_err(|e| write_error(&path, "create file", e))?;

        ParquetWriter::new(&mut file)
            .finish(df)
            .map_err(|e| EtlError::Write(format!("Failed to write Parquet file {}: {}", path.display(), e)))?;

        debug!(file = %path.display(), rows = df.height(), "Wrote part file");
        Ok(())
    }
}

impl TableSink for ParquetSink {
    fn write(
        &self,
        table: &mut DataFrame,
        location: &str,
        mode: WriteMode,
        partition_by: &[&str],
    ) -> Result<WriteSummary> {
        let table_dir = self.root.join(location);
        self.prepare_location(&table_dir, mode)?;

        let batch = Uuid::new_v4();
        let mut files = 0;

        if partition_by.is_empty() {
            self.write_part(&table_dir, &format!("part-00000-{}.parquet", batch), table)?;
            files += 1;
        } else {
            for name in partition_by {
                if table.column(name).is_err() {
                    return Err(EtlError::Write(format!(
                        "Partition column {} not found in table {}",
                        name, location
                    )));
                }
            }

            let keys: Vec<String> = partition_by.iter().map(|s| s.to_string()).collect();
            let groups = table.partition_by_stable(keys, true)?;
            for (i, mut group) in groups.into_iter().enumerate() {
                if group.height() == 0 {
                    continue;
                }
                let dir = table_dir.join(partition_path(&group, partition_by)?);
                self.write_part(&dir, &format!("part-{:05}-{}.parquet", i, batch), &mut group)?;
                files += 1;
            }
        }

        let marker = table_dir.join(SUCCESS_MARKER);
        fs::write(&marker, b"")
            .map_err(|e| write_error(&marker, "write marker", e))?;

        info!(
            location,
            rows = table.height(),
            files,
            ?mode,
            partition_by = ?partition_by,
            "Table written"
        );

        Ok(WriteSummary {
            location: table_dir,
            rows: table.height(),
            files,
        })
    }
}

fn write_error(path: &Path, action: &str, err: std::io::Error) -> EtlError {
    EtlError::Write(format!("Failed to {} {}: {}", action, path.display(), err))
}
