//! # Trial Execution
//!
//! A trial is one run of the external benchmark under the simulation
//! launcher, with its standard output redirected to a per-worker result
//! file. This module builds that command ([`TrialCommand`]), runs it through
//! the [`ProcessRunner`] abstraction, and turns the result file into exactly
//! one [`BenchmarkRecord`] ([`TrialRunner`]).
//!
//! ## Command Shape
//!
//! ```text
//! [taskset -c <core>] <launcher> -platform <platform_file> -hostfile <hostfile> \
//!     <executable> <benchmark> -iter <reps> -msgsz <size> [extra_args...] > p2p_<index>.log
//! ```
//!
//! ## Failure Policy
//!
//! The exit status of the command is reported but does not decide anything
//! on its own. What matters is the result file: anything other than exactly
//! one record is a fatal [`TrialError::RecordCount`].

use crate::{
    benchmark::{Configuration, HarnessConfig},
    error::{RunnerError, TrialError},
    logging::Diagnostics,
    record::{parse_file, BenchmarkRecord},
};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A fully resolved external command with its stdout target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdout_path: PathBuf,
}

impl TrialCommand {
    /// Build the command for one worker.
    ///
    /// `core` pins the launcher with `taskset` when set.
    pub fn for_configuration(
        config: &HarnessConfig,
        configuration: &Configuration,
        core: Option<usize>,
    ) -> Self {
        let mut args = Vec::new();
        let program = match core {
            Some(core) => {
                args.extend(["-c".to_string(), core.to_string(), config.launcher.clone()]);
                "taskset".to_string()
            }
            None => config.launcher.clone(),
        };

        args.extend([
            "-platform".to_string(),
            config.platform_file.display().to_string(),
            "-hostfile".to_string(),
            config.hostfile.display().to_string(),
            config.executable.display().to_string(),
            config.benchmark.clone(),
            "-iter".to_string(),
            repetitions_for(configuration.message_size).to_string(),
            "-msgsz".to_string(),
            configuration.message_size.to_string(),
        ]);
        args.extend(config.extra_args.iter().cloned());

        Self {
            program,
            args,
            stdout_path: result_file_path(&config.work_dir, configuration.index),
        }
    }
}

impl fmt::Display for TrialCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        write!(f, " > {}", self.stdout_path.display())
    }
}

/// Inner repetition count handed to the benchmark via `-iter`.
///
/// Small messages finish quickly, so they are repeated inside each trial
/// to smooth out per-message noise.
pub fn repetitions_for(message_size: usize) -> usize {
    if message_size <= crate::defaults::SMALL_MESSAGE_LIMIT {
        crate::defaults::SMALL_MESSAGE_REPETITIONS
    } else {
        crate::defaults::LARGE_MESSAGE_REPETITIONS
    }
}

/// Result file of worker `index`. Keyed by index so concurrent workers
/// never share a file.
pub fn result_file_path(work_dir: &Path, index: usize) -> PathBuf {
    work_dir.join(format!("{}{}.log", crate::defaults::RESULT_FILE_PREFIX, index))
}

/// How an external command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Something that can execute a [`TrialCommand`] to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command`, redirecting its stdout to `command.stdout_path`, and
    /// wait for it to exit.
    async fn run(
        &self,
        command: &TrialCommand,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutcome, RunnerError>;
}

/// Runs commands as real child processes.
///
/// Children are killed if the waiting task is dropped, so aborting a worker
/// also stops its in-flight simulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(
        &self,
        command: &TrialCommand,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutcome, RunnerError> {
        let stdout =
            std::fs::File::create(&command.stdout_path).map_err(|source| RunnerError::Redirect {
                path: command.stdout_path.clone(),
                source,
            })?;

        let mut child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let status = match timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => status,
                    Err(_) => {
                        if let Err(e) = child.kill().await {
                            warn!("Failed to kill {} after timeout: {}", command.program, e);
                        }
                        return Err(RunnerError::TimedOut {
                            program: command.program.clone(),
                            limit,
                        });
                    }
                }
            }
            None => child.wait().await,
        }
        .map_err(|source| RunnerError::Wait {
            program: command.program.clone(),
            source,
        })?;

        Ok(ProcessOutcome {
            code: status.code(),
        })
    }
}

/// Runs the trials of one worker.
pub struct TrialRunner {
    index: usize,
    command: TrialCommand,
    runner: Arc<dyn ProcessRunner>,
    timeout: Option<Duration>,
    diagnostics: Diagnostics,
}

impl TrialRunner {
    pub fn new(
        index: usize,
        command: TrialCommand,
        runner: Arc<dyn ProcessRunner>,
        timeout: Option<Duration>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            index,
            command,
            runner,
            timeout,
            diagnostics,
        }
    }

    pub fn command(&self) -> &TrialCommand {
        &self.command
    }

    /// Execute one trial and return its single record.
    ///
    /// The result file is removed afterwards whatever happened.
    pub async fn run(&self, iteration: usize) -> Result<BenchmarkRecord, TrialError> {
        let outcome = self.runner.run(&self.command, self.timeout).await;

        let records = match outcome {
            Ok(outcome) => {
                if !outcome.success() {
                    let status = outcome
                        .code
                        .map_or("a signal".to_string(), |code| format!("code {}", code));
                    warn!(
                        "Worker {} trial {}: {} exited with {}",
                        self.index, iteration, self.command.program, status
                    );
                    self.diagnostics.line(format!(
                        "[{}] Iteration {}: command exited with {}",
                        self.index, iteration, status
                    ));
                }
                parse_file(&self.command.stdout_path)
            }
            Err(source) => {
                remove_result_file(&self.command.stdout_path);
                return Err(TrialError::Process {
                    index: self.index,
                    iteration,
                    source,
                });
            }
        };
        remove_result_file(&self.command.stdout_path);

        let count = records.len();
        let mut records = records.into_iter();
        match (records.next(), count) {
            (Some(record), 1) => Ok(record),
            _ => Err(TrialError::RecordCount {
                index: self.index,
                iteration,
                count,
            }),
        }
    }
}

fn remove_result_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove result file {:?}: {}", path, e),
    }
}
