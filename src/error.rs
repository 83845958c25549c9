//! Error types for the sweep harness.
//!
//! Configuration problems are reported before any worker starts. Everything
//! that goes wrong while a trial runs is a [`TrialError`], and every
//! `TrialError` is fatal for the whole harness: there is no per-worker
//! recovery path.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Exit code for usage and configuration errors.
pub const EXIT_USAGE: u8 = 1;

/// Exit code when the harness aborts mid-run.
pub const EXIT_ABORTED: u8 = 2;

/// Invalid command-line configuration, detected at startup.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{list} list is empty")]
    EmptyList { list: &'static str },

    #[error("invalid {list} entry {value:?} at position {position}")]
    InvalidEntry {
        list: &'static str,
        position: usize,
        value: String,
    },

    #[error("threshold at position {position} is NaN")]
    NanThreshold { position: usize },

    #[error(
        "{sizes} message sizes but {thresholds} thresholds; \
         both lists need one entry per worker"
    )]
    LengthMismatch { sizes: usize, thresholds: usize },
}

/// A data line that cannot be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordParseError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid {name} value {value:?}")]
    InvalidField { name: &'static str, value: String },
}

/// Failure to run the external measurement command.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("cannot create result file {path}: {source}")]
    Redirect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {limit:?}")]
    TimedOut { program: String, limit: Duration },
}

/// A trial that cannot be turned into exactly one sample.
#[derive(Debug, Error)]
pub enum TrialError {
    #[error("worker {index}, trial {iteration}: {source}")]
    Process {
        index: usize,
        iteration: usize,
        #[source]
        source: RunnerError,
    },

    #[error("worker {index}, trial {iteration}: expected exactly 1 record, parsed {count}")]
    RecordCount {
        index: usize,
        iteration: usize,
        count: usize,
    },

    #[error("worker {index} stopped: harness is aborting")]
    Aborted { index: usize },
}
