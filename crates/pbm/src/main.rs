//! Pharmacy Claims Adjudication Simulator — unified entry point.
//!
//! Ingests one or more delimited claim files, adjudicates each record
//! through the eight-step decision engine, and persists the results at a
//! configurable speedup. See `SPEC_FULL.md` for the full contract.

use std::process::ExitCode;

use clap::Parser;

use pbm::cancel::CancellationToken;
use pbm::cli::Cli;
use pbm::config::RunConfig;
use pbm::coordinator::{self, CoordinatorError};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    if let Err(err) = pbm_logging::init_logging(pbm_logging::LogConfig { app_name: "pbm", verbose }) {
        eprintln!("warning: failed to initialize logging: {err:?}");
    }

    // ConfigError isn't one of spec.md §6.2's four assigned failure codes
    // (those are reference/input/database/cancellation specific); a
    // malformed CLI invocation gets the generic failure code.
    let config = match RunConfig::from_cli(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(config))
}

async fn run(config: RunConfig) -> ExitCode {
    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received interrupt; finishing current batch before exit");
            cancel_for_signal.cancel();
        }
    });

    match coordinator::run(&config, cancel).await {
        Ok(report) if report.cancelled => {
            tracing::warn!("run terminated by cooperative cancellation");
            ExitCode::from(130)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(err @ CoordinatorError::ReferenceVerification(_)) => {
            eprintln!("{err}");
            ExitCode::from(2)
        }
        Err(err @ CoordinatorError::InputDiscovery(_)) => {
            eprintln!("{err}");
            ExitCode::from(3)
        }
        Err(err @ CoordinatorError::Persistence { .. }) => {
            eprintln!("{err}");
            ExitCode::from(4)
        }
    }
}
