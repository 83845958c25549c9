//! # P2P Sweep Library
//!
//! A harness that measures point-to-point MPI throughput in a simulator for
//! several message sizes at once, repeating each measurement until its mean
//! is known precisely enough.
//!
//! ## How a Sweep Runs
//!
//! Every message size gets its own worker. A worker repeatedly launches the
//! external benchmark under the simulation launcher (`smpirun` by default),
//! reads the single throughput record it prints, and updates running
//! statistics. It stops once the relative standard error of the mean drops
//! below its threshold, or when the iteration budget runs out. When all
//! workers are done, their means are printed on one line in the order the
//! sizes were given.
//!
//! ## Architecture Overview
//!
//! - `benchmark`: configuration fan-out and the concurrent harness
//! - `worker`: the per-size trial loop and its stopping state
//! - `runner`: external command construction and execution
//! - `record`: parser for the benchmark's result file
//! - `metrics`: online mean / relative standard error
//! - `results`: result slots, the final line, and the JSON summary
//! - `logging`: tracing setup and the serialized diagnostics channel
//! - `cli`, `error`, `utils`: argument parsing, error types, helpers
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use p2p_sweep::{Diagnostics, Harness, HarnessConfig, SystemProcessRunner};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HarnessConfig {
//!         platform_file: "summit_temp.so".into(),
//!         hostfile: "hostfile.txt".into(),
//!         executable: "/usr/local/bin/IMB-P2P".into(),
//!         benchmark: "PingPong".to_string(),
//!         max_iters: 10,
//!         configurations: p2p_sweep::benchmark::build_configurations("1024,65536", "0.05,0.05", 10)?,
//!         extra_args: vec!["--log=root.threshold:error".to_string()],
//!         launcher: "smpirun".to_string(),
//!         work_dir: ".".into(),
//!         trial_timeout: None,
//!         pin_cpus: false,
//!     };
//!
//!     let harness = Harness::new(config, Arc::new(SystemProcessRunner), Diagnostics::stderr());
//!     let outcome = harness.run().await?;
//!     println!("{}", outcome.result.line());
//!     Ok(())
//! }
//! ```

/// Configuration fan-out and the fork-join harness
pub mod benchmark;

/// Command-line interface
///
/// Positional arguments mirror the launcher-facing invocation; options
/// tune where files go, timeouts, pinning, and logging.
pub mod cli;

pub mod error;

/// Tracing subscriber setup and the diagnostics channel
pub mod logging;

/// Online statistics used by the stopping rule
pub mod metrics;

/// Result file parsing
pub mod record;

/// Result slots, the final line, and the JSON summary
pub mod results;

/// Building and executing trial commands
pub mod runner;

pub mod utils;

/// Per-configuration trial loop
pub mod worker;

pub use benchmark::{Configuration, Harness, HarnessConfig, HarnessOutcome};
pub use cli::Args;
pub use error::{ConfigError, RecordParseError, RunnerError, TrialError};
pub use logging::Diagnostics;
pub use metrics::OnlineStats;
pub use record::{parse_file, BenchmarkRecord, RecordReader};
pub use results::{AggregateResult, ResultsManager, WorkerReport};
pub use runner::{ProcessOutcome, ProcessRunner, SystemProcessRunner, TrialCommand, TrialRunner};
pub use worker::{AbortSignal, Worker};

/// The current version of the sweep harness
///
/// Populated from Cargo.toml and recorded in JSON summaries.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Launcher that starts the benchmark inside the simulator
    pub const LAUNCHER: &str = "smpirun";

    /// Prefix of per-worker result files; the worker index follows
    pub const RESULT_FILE_PREFIX: &str = "p2p_";

    /// Largest message size still treated as "small"
    pub const SMALL_MESSAGE_LIMIT: usize = 8192;

    /// `-iter` passed to the benchmark for small messages
    pub const SMALL_MESSAGE_REPETITIONS: usize = 10;

    /// `-iter` passed to the benchmark for larger messages
    pub const LARGE_MESSAGE_REPETITIONS: usize = 1;

    /// Decimal digits of each value on the result line
    pub const RESULT_PRECISION: usize = 2;

    /// Log filter used when neither `-v` nor `RUST_LOG` is given
    pub const LOG_LEVEL: &str = "warn";
}
