use anyhow::{Context, Result};
use clap::Parser;
use songplays_etl::reconcile::MatchStrategy;
use songplays_etl::usage::UsersPolicy;
use songplays_etl::{EtlConfig, Pipeline};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "songplays-etl")]
#[command(about = "Build the songplays star schema from song metadata and usage logs")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root directory the source patterns are resolved against
    #[arg(short, long)]
    input_root: Option<PathBuf>,

    /// Root directory the output tables are written under
    #[arg(short, long)]
    output_root: Option<PathBuf>,

    #[arg(long)]
    song_pattern: Option<String>,

    #[arg(long)]
    log_pattern: Option<String>,

    /// artist, artist_title or artist_title_duration
    #[arg(long)]
    match_strategy: Option<MatchStrategy>,

    /// Seconds; only used by artist_title_duration
    #[arg(long)]
    duration_tolerance: Option<f64>,

    /// history or latest
    #[arg(long)]
    users_policy: Option<UsersPolicy>,
}

impl Args {
    fn into_config(self) -> Result<EtlConfig> {
        let base = match &self.config {
            Some(path) => EtlConfig::from_file(path)?,
            None => EtlConfig::default(),
        };
        let mut config = base.apply_env()?;

        if let Some(v) = self.input_root {
            config.input_root = v;
        }
        if let Some(v) = self.output_root {
            config.output_root = v;
        }
        if let Some(v) = self.song_pattern {
            config.song_pattern = v;
        }
        if let Some(v) = self.log_pattern {
            config.log_pattern = v;
        }
        if let Some(v) = self.match_strategy {
            config.match_strategy = v;
        }
        if let Some(v) = self.duration_tolerance {
            config.duration_tolerance_secs = v;
        }
        if let Some(v) = self.users_policy {
            config.users_policy = v;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Args::parse().into_config().context("Failed to resolve configuration")?;
    let pipeline = Pipeline::from_config(config).context("Invalid configuration")?;

    info!("songplays-etl starting...");
    let summary = match pipeline.run() {
        Ok(summary) => summary,
        Err(e) => {
            error!("Run failed: {}", e);
            return Err(e).context("Pipeline run failed");
        }
    };

    println!("{}", summary.to_json()?);
    Ok(())
}
