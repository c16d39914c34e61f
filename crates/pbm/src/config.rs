//! Runtime configuration, validated once at startup out of the parsed CLI.

use std::path::PathBuf;

use thiserror::Error;

use crate::cli::Cli;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("speedup must be a positive decimal (>= 1.0), got {0}")]
    InvalidSpeedup(f64),
    #[error("batch-size must be greater than zero")]
    ZeroBatchSize,
    #[error("insert-batch-size must be greater than zero")]
    ZeroInsertBatchSize,
}

/// Validated run configuration, derived from the CLI once at startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub speedup: f64,
    pub database_url: String,
    pub input_dir: PathBuf,
    pub input_pattern: String,
    pub batch_size: usize,
    pub insert_batch_size: usize,
    pub metrics_dir: PathBuf,
    pub progress_interval_secs: u64,
    pub fidelity_delays: bool,
    pub seed: Option<u64>,
    pub dry_run: bool,
    pub verify_reference_only: bool,
}

impl RunConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if !(cli.speedup >= 1.0) {
            return Err(ConfigError::InvalidSpeedup(cli.speedup));
        }
        if cli.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if cli.insert_batch_size == 0 {
            return Err(ConfigError::ZeroInsertBatchSize);
        }
        Ok(Self {
            speedup: cli.speedup,
            database_url: cli.database_url,
            input_dir: cli.input_dir,
            input_pattern: cli.input_pattern,
            batch_size: cli.batch_size,
            insert_batch_size: cli.insert_batch_size,
            metrics_dir: cli.metrics_dir,
            progress_interval_secs: cli.progress_interval_secs,
            fidelity_delays: cli.fidelity_delays,
            seed: cli.seed,
            dry_run: cli.dry_run,
            verify_reference_only: cli.verify_reference,
        })
    }
}
