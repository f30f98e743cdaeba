//! Batch ETL that turns song metadata and usage logs into a star schema:
//! `songs`, `artists`, `users` and `time` dimensions plus a `songplays` fact
//! table, each written as partitioned Parquet.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod operators;
pub mod pipeline;
pub mod reconcile;
pub mod schema;
pub mod songs;
pub mod storage;
pub mod time;
pub mod usage;

pub use config::EtlConfig;
pub use error::{EtlError, Result};
pub use pipeline::{Pipeline, RunSummary};
