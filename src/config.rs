//! Pipeline configuration.
//!
//! Layered lowest to highest: built-in defaults, an optional JSON file,
//! `SONGPLAYS_*` environment variables, then command-line overrides applied
//! by the binary.

use crate::error::{EtlError, Result};
use crate::reconcile::MatchStrategy;
use crate::usage::UsersPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SONG_PATTERN: &str = "song_data/*/*/*/*.json";
pub const DEFAULT_LOG_PATTERN: &str = "log_data/*/*/*.json";
pub const DEFAULT_DURATION_TOLERANCE_SECS: f64 = 2.0;

pub const ENV_INPUT_ROOT: &str = "SONGPLAYS_INPUT_ROOT";
pub const ENV_OUTPUT_ROOT: &str = "SONGPLAYS_OUTPUT_ROOT";
pub const ENV_SONG_PATTERN: &str = "SONGPLAYS_SONG_PATTERN";
pub const ENV_LOG_PATTERN: &str = "SONGPLAYS_LOG_PATTERN";
pub const ENV_MATCH_STRATEGY: &str = "SONGPLAYS_MATCH_STRATEGY";
pub const ENV_DURATION_TOLERANCE: &str = "SONGPLAYS_DURATION_TOLERANCE";
pub const ENV_USERS_POLICY: &str = "SONGPLAYS_USERS_POLICY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtlConfig {
    /// Root directory both source patterns are resolved against
    pub input_root: PathBuf,
    /// Glob for song metadata files, relative to `input_root`
    pub song_pattern: String,
    /// Glob for usage log files, relative to `input_root`
    pub log_pattern: String,
    /// Root directory for the five output tables
    pub output_root: PathBuf,
    pub match_strategy: MatchStrategy,
    /// Only used by the `artist_title_duration` strategy
    pub duration_tolerance_secs: f64,
    pub users_policy: UsersPolicy,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("data"),
            song_pattern: DEFAULT_SONG_PATTERN.to_string(),
            log_pattern: DEFAULT_LOG_PATTERN.to_string(),
            output_root: PathBuf::from("output"),
            match_strategy: MatchStrategy::default(),
            duration_tolerance_secs: DEFAULT_DURATION_TOLERANCE_SECS,
            users_policy: UsersPolicy::default(),
        }
    }
}

impl EtlConfig {
    /// Load a JSON config file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EtlError::Config(format!("Failed to read config {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| EtlError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Apply `SONGPLAYS_*` overrides from the process environment
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable lookup
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_INPUT_ROOT) {
            self.input_root = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_OUTPUT_ROOT) {
            self.output_root = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_SONG_PATTERN) {
            self.song_pattern = v;
        }
        if let Some(v) = lookup(ENV_LOG_PATTERN) {
            self.log_pattern = v;
        }
        if let Some(v) = lookup(ENV_MATCH_STRATEGY) {
            self.match_strategy = v.parse().map_err(EtlError::Config)?;
        }
        if let Some(v) = lookup(ENV_DURATION_TOLERANCE) {
            self.duration_tolerance_secs = v.trim().parse().map_err(|_| {
                EtlError::Config(format!("{} must be a number, got '{}'", ENV_DURATION_TOLERANCE, v))
            })?;
        }
        if let Some(v) = lookup(ENV_USERS_POLICY) {
            self.users_policy = v.parse().map_err(EtlError::Config)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.song_pattern.trim().is_empty() {
            return Err(EtlError::Config("song_pattern must not be empty".to_string()));
        }
        if self.log_pattern.trim().is_empty() {
            return Err(EtlError::Config("log_pattern must not be empty".to_string()));
        }
        if !self.duration_tolerance_secs.is_finite() || self.duration_tolerance_secs < 0.0 {
            return Err(EtlError::Config(format!(
                "duration_tolerance_secs must be a non-negative number, got {}",
                self.duration_tolerance_secs
            )));
        }
        if self.input_root == self.output_root {
            return Err(EtlError::Config(format!(
                "output_root must differ from input_root ({})",
                self.input_root.display()
            )));
        }
        Ok(())
    }
}
