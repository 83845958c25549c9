use crate::{
    benchmark::{Configuration, HarnessConfig},
    logging::Diagnostics,
    utils::format_value,
    worker::WorkerState,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Outcome of one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub index: usize,
    pub message_size: usize,
    pub threshold: f64,
    pub iteration_cap: usize,
    /// Trials that produced a sample
    pub samples: usize,
    /// Mean MB/s, `None` if no trial ran
    pub mean: Option<f64>,
    pub relative_stderr: Option<f64>,
    /// Whether the precision target ended sampling before the budget did
    pub converged: bool,
}

impl WorkerReport {
    pub fn from_state(configuration: &Configuration, state: &WorkerState) -> Self {
        Self {
            index: configuration.index,
            message_size: configuration.message_size,
            threshold: configuration.threshold,
            iteration_cap: configuration.iteration_cap,
            samples: state.stats.count(),
            mean: state.stats.mean(),
            relative_stderr: state.stats.relative_stderr(),
            converged: state.converged(),
        }
    }

    /// Slot text for the result line: the mean with two decimals, or an
    /// empty string when nothing was measured.
    pub fn result(&self) -> String {
        self.mean.map(format_value).unwrap_or_default()
    }
}

/// One result slot per configuration, in configuration order.
///
/// Slots start empty and each can be filled once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResult {
    slots: Vec<Option<String>>,
}

impl AggregateResult {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    /// Fill slot `index`.
    pub fn set(&mut self, index: usize, value: String) -> Result<()> {
        let len = self.slots.len();
        let Some(slot) = self.slots.get_mut(index) else {
            bail!("result slot {} out of range ({} slots)", index, len);
        };
        if slot.is_some() {
            bail!("result slot {} written twice", index);
        }
        *slot = Some(value);
        Ok(())
    }

    /// All slots joined by single spaces; unfilled slots are empty strings.
    pub fn line(&self) -> String {
        self.slots
            .iter()
            .map(|slot| slot.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Write the result line once to `out` and mirror it to diagnostics.
    pub fn emit<W: Write>(&self, out: &mut W, diagnostics: &Diagnostics) -> std::io::Result<()> {
        let line = self.line();
        writeln!(out, "{}", line)?;
        out.flush()?;
        diagnostics.line(format!("Result: {}\n", line));
        Ok(())
    }
}

/// Host details recorded alongside results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub available_cores: usize,
    pub sweep_version: String,
}

impl SystemInfo {
    pub fn collect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: crate::utils::get_cpu_cores(),
            available_cores: crate::utils::available_cores().len(),
            sweep_version: crate::VERSION.to_string(),
        }
    }
}

/// What was run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSetup {
    pub platform_file: PathBuf,
    pub hostfile: PathBuf,
    pub executable: PathBuf,
    pub benchmark: String,
    pub launcher: String,
    pub max_iters: usize,
    pub extra_args: Vec<String>,
}

impl From<&HarnessConfig> for SweepSetup {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            platform_file: config.platform_file.clone(),
            hostfile: config.hostfile.clone(),
            executable: config.executable.clone(),
            benchmark: config.benchmark.clone(),
            launcher: config.launcher.clone(),
            max_iters: config.max_iters,
            extra_args: config.extra_args.clone(),
        }
    }
}

/// Document written by [`ResultsManager`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSummary {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub system_info: SystemInfo,
    pub setup: SweepSetup,
    pub result_line: String,
    pub workers: Vec<WorkerReport>,
}

/// Writes the optional JSON summary of a sweep.
pub struct ResultsManager {
    output_file: PathBuf,
}

impl ResultsManager {
    pub fn new(output_file: &Path) -> Self {
        Self {
            output_file: output_file.to_path_buf(),
        }
    }

    pub fn summary(
        config: &HarnessConfig,
        result: &AggregateResult,
        reports: &[WorkerReport],
    ) -> SweepSummary {
        SweepSummary {
            timestamp: chrono::Utc::now(),
            system_info: SystemInfo::collect(),
            setup: SweepSetup::from(config),
            result_line: result.line(),
            workers: reports.to_vec(),
        }
    }

    pub fn write(&self, summary: &SweepSummary) -> Result<()> {
        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(&self.output_file, json)
            .with_context(|| format!("failed to write {:?}", self.output_file))?;

        info!("Summary written to: {:?}", self.output_file);
        Ok(())
    }
}
