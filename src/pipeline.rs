//! Pipeline - runs the three components and writes the star schema.
//!
//! Order: song dimensions, usage dimensions, then song plays. Each table is
//! written as soon as it is built; a failure later in the run leaves earlier
//! tables in place and a rerun overwrites them.

use crate::config::EtlConfig;
use crate::error::Result;
use crate::ingestion::{NdjsonSource, TableSource};
use crate::reconcile::{FactReconciler, ReconcileStats, SONGPLAYS_PARTITION};
use crate::songs::{SongExtractor, SONGS_PARTITION};
use crate::storage::{ParquetSink, TableSink, WriteMode, WriteSummary};
use crate::usage::{UsageNormalizer, TIME_PARTITION};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, info_span};
use uuid::Uuid;

pub const SONGS_TABLE: &str = "songs";
pub const ARTISTS_TABLE: &str = "artists";
pub const USERS_TABLE: &str = "users";
pub const TIME_TABLE: &str = "time";
pub const SONGPLAYS_TABLE: &str = "songplays";

/// What one run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tables: BTreeMap<String, WriteSummary>,
    pub reconciliation: ReconcileStats,
}

impl RunSummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct Pipeline {
    config: EtlConfig,
    source: Box<dyn TableSource>,
    sink: Box<dyn TableSink>,
}

impl Pipeline {
    pub fn new(config: EtlConfig, source: Box<dyn TableSource>, sink: Box<dyn TableSink>) -> Self {
        Self { config, source, sink }
    }

    /// Local NDJSON in, partitioned Parquet out, both rooted in the config
    pub fn from_config(config: EtlConfig) -> Result<Self> {
        config.validate()?;
        let source = NdjsonSource::new(config.input_root.clone());
        let sink = ParquetSink::new(config.output_root.clone());
        Ok(Self::new(config, Box::new(source), Box::new(sink)))
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);
        let _guard = span.enter();

        let started_at = Utc::now();
        info!(
            input = %self.config.input_root.display(),
            output = %self.config.output_root.display(),
            strategy = ?self.config.match_strategy,
            "Starting pipeline run"
        );

        let mut tables = BTreeMap::new();

        let mut song_dims = SongExtractor::extract(self.source.as_ref(), &self.config.song_pattern)?;
        tables.insert(
            SONGS_TABLE.to_string(),
            self.sink.write(&mut song_dims.songs, SONGS_TABLE, WriteMode::Overwrite, &SONGS_PARTITION)?,
        );
        tables.insert(
            ARTISTS_TABLE.to_string(),
            self.sink.write(&mut song_dims.artists, ARTISTS_TABLE, WriteMode::Overwrite, &[])?,
        );

        let normalizer = UsageNormalizer::new(self.config.users_policy);
        let mut usage = normalizer.normalize(self.source.as_ref(), &self.config.log_pattern)?;
        tables.insert(
            USERS_TABLE.to_string(),
            self.sink.write(&mut usage.users, USERS_TABLE, WriteMode::Overwrite, &[])?,
        );
        tables.insert(
            TIME_TABLE.to_string(),
            self.sink.write(&mut usage.time, TIME_TABLE, WriteMode::Overwrite, &TIME_PARTITION)?,
        );

        let reconciler = FactReconciler::from_strategy(
            self.config.match_strategy,
            self.config.duration_tolerance_secs,
        );
        let mut songplays = reconciler.reconcile(&usage.events, &song_dims.catalog)?;
        tables.insert(
            SONGPLAYS_TABLE.to_string(),
            self.sink.write(&mut songplays.table, SONGPLAYS_TABLE, WriteMode::Overwrite, &SONGPLAYS_PARTITION)?,
        );

        let finished_at = Utc::now();
        info!(
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "Pipeline run complete"
        );

        Ok(RunSummary {
            run_id,
            started_at,
            finished_at,
            tables,
            reconciliation: songplays.stats,
        })
    }
}
