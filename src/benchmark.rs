//! # Sweep Harness
//!
//! This module turns the command line into one [`Configuration`] per
//! message size and runs them all at once.
//!
//! ## Execution Model
//!
//! The harness is a single fork-join region:
//!
//! 1. **Fan-out**: one [`Worker`] task per configuration, all spawned before
//!    any is awaited
//! 2. **Trials**: each worker runs its trials strictly in sequence, so the
//!    only parallelism is across message sizes
//! 3. **Join**: results are collected in whatever order workers finish and
//!    stored by configuration index
//! 4. **Aggregation**: after the last worker joins, the slots are joined into
//!    the result line
//!
//! ## Failure Handling
//!
//! The first fatal trial error raises the shared [`AbortSignal`], aborts
//! every remaining task (their child processes are killed on drop) and is
//! returned to the caller. No partial result line is produced.

use crate::{
    cli::Args,
    error::{ConfigError, TrialError},
    logging::Diagnostics,
    results::{AggregateResult, WorkerReport},
    runner::{ProcessRunner, TrialCommand, TrialRunner},
    utils::{available_cores, parse_list},
    worker::{AbortSignal, Worker},
};
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Settings of one worker, derived from the CLI lists by position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Configuration {
    /// Worker identity and result slot
    pub index: usize,
    pub message_size: usize,
    /// Relative standard error target; negative disables the precision stop
    pub threshold: f64,
    pub iteration_cap: usize,
}

/// Everything the harness needs to run a sweep.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub platform_file: PathBuf,
    pub hostfile: PathBuf,
    pub executable: PathBuf,
    pub benchmark: String,
    pub max_iters: usize,
    pub configurations: Vec<Configuration>,
    pub extra_args: Vec<String>,
    pub launcher: String,
    pub work_dir: PathBuf,
    pub trial_timeout: Option<Duration>,
    pub pin_cpus: bool,
}

impl HarnessConfig {
    /// Build the harness configuration from parsed CLI arguments.
    ///
    /// ## Validation
    ///
    /// - both lists must parse entry by entry
    /// - thresholds must not be NaN
    /// - the lists must have the same length; mismatched lists are rejected
    ///   instead of guessing which entries belong together
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let configurations =
            build_configurations(&args.byte_sizes, &args.thresholds, args.max_iters)?;

        if args.max_iters == 0 {
            warn!("max_iters is 0: no trials will run and every result slot stays empty");
        }

        Ok(Self {
            platform_file: args.platform_file.clone(),
            hostfile: args.hostfile.clone(),
            executable: args.executable.clone(),
            benchmark: args.benchmark.clone(),
            max_iters: args.max_iters,
            configurations,
            extra_args: args.extra_args.clone(),
            launcher: args.launcher.clone(),
            work_dir: args.work_dir.clone(),
            trial_timeout: args.timeout,
            pin_cpus: args.pin_cpus,
        })
    }
}

/// Zip the size and threshold lists into configurations.
pub fn build_configurations(
    byte_sizes: &str,
    thresholds: &str,
    max_iters: usize,
) -> Result<Vec<Configuration>, ConfigError> {
    let sizes: Vec<usize> = parse_list(byte_sizes, "byte size")?;
    let thresholds: Vec<f64> = parse_list(thresholds, "threshold")?;

    if let Some(position) = thresholds.iter().position(|t| t.is_nan()) {
        return Err(ConfigError::NanThreshold { position });
    }
    if sizes.len() != thresholds.len() {
        return Err(ConfigError::LengthMismatch {
            sizes: sizes.len(),
            thresholds: thresholds.len(),
        });
    }

    Ok(sizes
        .into_iter()
        .zip(thresholds)
        .enumerate()
        .map(|(index, (message_size, threshold))| Configuration {
            index,
            message_size,
            threshold,
            iteration_cap: max_iters,
        })
        .collect())
}

/// Result of a completed sweep.
#[derive(Debug, Clone)]
pub struct HarnessOutcome {
    pub result: AggregateResult,
    /// One report per configuration, ordered by index
    pub reports: Vec<WorkerReport>,
}

/// Runs every configuration concurrently and aggregates the means.
pub struct Harness {
    config: Arc<HarnessConfig>,
    runner: Arc<dyn ProcessRunner>,
    diagnostics: Diagnostics,
}

impl Harness {
    pub fn new(
        config: HarnessConfig,
        runner: Arc<dyn ProcessRunner>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            config: Arc::new(config),
            runner,
            diagnostics,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Core for worker `index` when pinning is enabled, round-robin over
    /// the cores this process may use.
    fn core_for(cores: &[usize], index: usize) -> Option<usize> {
        (!cores.is_empty()).then(|| cores[index % cores.len()])
    }

    /// Run the sweep to completion or to the first fatal error.
    pub async fn run(&self) -> Result<HarnessOutcome> {
        let cores = available_cores();
        self.diagnostics
            .line(format!("Available CPUs: {}", cores.len()));

        if self.config.pin_cpus && cores.is_empty() {
            warn!("CPU pinning requested but the affinity mask is unavailable; running unpinned");
        }

        let abort = AbortSignal::new();
        let mut tasks = JoinSet::new();

        for configuration in &self.config.configurations {
            let core = if self.config.pin_cpus {
                Self::core_for(&cores, configuration.index)
            } else {
                None
            };
            let command = TrialCommand::for_configuration(&self.config, configuration, core);
            let trials = TrialRunner::new(
                configuration.index,
                command,
                Arc::clone(&self.runner),
                self.config.trial_timeout,
                self.diagnostics.clone(),
            );
            let worker = Worker::new(
                *configuration,
                trials,
                self.diagnostics.clone(),
                abort.clone(),
            );

            debug!(
                "Spawning worker {} for {} bytes",
                configuration.index, configuration.message_size
            );
            tasks.spawn(worker.run());
        }
        info!("Started {} workers", tasks.len());

        let mut reports = join_workers(tasks, &abort).await?;
        reports.sort_by_key(|report| report.index);

        let mut result = AggregateResult::new(self.config.configurations.len());
        for report in &reports {
            if report.mean.is_some() {
                result.set(report.index, report.result())?;
            }
        }

        Ok(HarnessOutcome { result, reports })
    }
}

/// Collect every worker report, or the error that ended the sweep.
///
/// Workers that stopped because another one failed report
/// [`TrialError::Aborted`]; those are only returned when no worker joined
/// with the failure that raised the abort.
async fn join_workers(
    mut tasks: JoinSet<Result<WorkerReport, TrialError>>,
    abort: &AbortSignal,
) -> Result<Vec<WorkerReport>> {
    let mut reports = Vec::with_capacity(tasks.len());
    let mut stopped = None;

    while let Some(joined) = tasks.join_next().await {
        let failure = match joined {
            Ok(Ok(report)) => {
                reports.push(report);
                continue;
            }
            Ok(Err(e @ TrialError::Aborted { .. })) => {
                stopped.get_or_insert(e);
                continue;
            }
            Ok(Err(e)) => anyhow::Error::new(e),
            Err(e) => anyhow!("worker task failed: {}", e),
        };

        abort.raise();
        tasks.abort_all();
        debug!("Raising abort signal: {:#}", failure);
        return Err(failure);
    }

    match stopped {
        Some(e) => Err(e.into()),
        None => Ok(reports),
    }
}
