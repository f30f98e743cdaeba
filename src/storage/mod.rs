//! Storage Module
//!
//! Write capability: partitioned Parquet output under a single root.

pub mod parquet_sink;
pub mod partition;

pub use parquet_sink::{ParquetSink, TableSink, WriteMode, WriteSummary, SUCCESS_MARKER};
pub use partition::{partition_path, NULL_PARTITION};
