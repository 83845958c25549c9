//! # P2P Sweep - Main Entry Point
//!
//! 1. **Parse arguments**: usage errors exit with code 1
//! 2. **Initialize logging**: tracing to stderr, optionally to a log file
//! 3. **Build the configuration**: one worker per message size
//! 4. **Run the harness**: all workers concurrently, diagnostics on stderr
//! 5. **Emit the result line**: once, on stdout, after every worker finished
//!
//! Any fatal trial error aborts the sweep and exits with code 2 without
//! printing a result line.

use anyhow::{Context, Result};
use clap::Parser;
use p2p_sweep::{
    error::{EXIT_ABORTED, EXIT_USAGE},
    logging::init_tracing,
    Args, Diagnostics, Harness, HarnessConfig, ResultsManager, SystemProcessRunner,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    // The guard flushes the log file when main returns.
    let _log_guard = match init_tracing(args.verbose, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    info!("Starting P2P sweep {}", p2p_sweep::VERSION);
    info!("Configuration: {:?}", args);

    let config = match HarnessConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(config, &args).await {
        Ok(()) => {
            info!("P2P sweep completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Sweep aborted: {:#}", e);
            ExitCode::from(EXIT_ABORTED)
        }
    }
}

async fn run(config: HarnessConfig, args: &Args) -> Result<()> {
    let diagnostics = Diagnostics::stderr();
    let harness = Harness::new(config, Arc::new(SystemProcessRunner), diagnostics.clone());

    let outcome = harness.run().await?;

    let stdout = std::io::stdout();
    outcome
        .result
        .emit(&mut stdout.lock(), &diagnostics)
        .context("failed to write result line")?;

    if let Some(ref path) = args.json_output {
        let summary = ResultsManager::summary(harness.config(), &outcome.result, &outcome.reports);
        ResultsManager::new(path).write(&summary)?;
    }

    Ok(())
}
