//! Command-line surface: a single entry point taking `speedup` plus flags
//! for the collaborators the core treats as externally supplied (database
//! URL, input directory/pattern, batch size, metrics directory).

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pbm", about = "Pharmacy claims adjudication simulator")]
pub struct Cli {
    /// Simulated-time speedup factor (>= 1.0). 1.0 means real time.
    #[arg(default_value = "1.0")]
    pub speedup: f64,

    /// SQLite/Postgres connection URL for the reference + claims store.
    #[arg(long, env = "PBM_DATABASE_URL", default_value = "sqlite://pbm_sim.db")]
    pub database_url: String,

    /// Directory to scan for input claim files.
    #[arg(long, env = "PBM_INPUT_DIR", default_value = "data")]
    pub input_dir: PathBuf,

    /// Filename pattern (single `*` wildcard) identifying input shards.
    #[arg(long, env = "PBM_INPUT_PATTERN", default_value = "pharmacy_claims_simulation_*.csv")]
    pub input_pattern: String,

    /// Rows adjudicated and persisted per batch.
    #[arg(long, env = "PBM_BATCH_SIZE", default_value = "100")]
    pub batch_size: usize,

    /// Rows per `insert_batch` driver call inside the persistence sink.
    #[arg(long, env = "PBM_INSERT_BATCH_SIZE", default_value_t = pbm_db::DEFAULT_BATCH_SIZE)]
    pub insert_batch_size: usize,

    /// Directory for the pipe-delimited per-entity metrics logs.
    #[arg(long, env = "PBM_METRICS_DIR", default_value = "metrics")]
    pub metrics_dir: PathBuf,

    /// Seconds between progress reports.
    #[arg(long, env = "PBM_PROGRESS_INTERVAL_SECS", default_value = "10")]
    pub progress_interval_secs: u64,

    /// Enable per-step fidelity delays inside the decision engine (off by
    /// default so high-speedup runs aren't dominated by sleeping).
    #[arg(long, env = "PBM_FIDELITY_DELAYS")]
    pub fidelity_delays: bool,

    /// Pin the decision engine's RNG for a reproducible run.
    #[arg(long, env = "PBM_SEED")]
    pub seed: Option<u64>,

    /// Run ingestion and adjudication but skip persistence; prints the
    /// final report only.
    #[arg(long)]
    pub dry_run: bool,

    /// Run only the reference-data pre-flight check (coordinator step 1)
    /// and exit, without ingesting or adjudicating anything.
    #[arg(long)]
    pub verify_reference: bool,

    /// Emit info/debug logging to stderr in addition to the rolling file.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
