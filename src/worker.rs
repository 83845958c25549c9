//! Per-configuration trial loop.
//!
//! A [`Worker`] owns one message size. It runs trials one after another,
//! feeds each sample into its [`OnlineStats`], and stops as soon as the
//! estimate is precise enough or the iteration budget is spent.

use crate::{
    benchmark::Configuration,
    error::TrialError,
    logging::Diagnostics,
    metrics::OnlineStats,
    results::WorkerReport,
    runner::TrialRunner,
    utils::format_value,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Harness-wide stop flag.
///
/// Raised once a worker hits a fatal error; every other worker checks it
/// before starting its next trial.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Running,
    Done,
}

/// Statistics and stopping parameters of one worker.
#[derive(Debug, Clone)]
pub struct WorkerState {
    pub threshold: f64,
    pub iteration_cap: usize,
    pub stats: OnlineStats,
    pub phase: WorkerPhase,
}

impl WorkerState {
    pub fn new(configuration: &Configuration) -> Self {
        Self {
            threshold: configuration.threshold,
            iteration_cap: configuration.iteration_cap,
            stats: OnlineStats::new(),
            phase: WorkerPhase::Running,
        }
    }

    /// Record one sample; moves to [`WorkerPhase::Done`] once no more
    /// trials are needed.
    pub fn record(&mut self, mb_per_sec: f64) {
        self.stats.observe(mb_per_sec);
        if !self.stats.need_more(self.threshold, self.iteration_cap) {
            self.phase = WorkerPhase::Done;
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == WorkerPhase::Done
    }

    /// True when the precision target, not the budget, ended sampling.
    pub fn converged(&self) -> bool {
        self.threshold >= 0.0
            && self
                .stats
                .relative_stderr()
                .map_or(false, |rse| rse < self.threshold)
    }
}

pub struct Worker {
    configuration: Configuration,
    trials: TrialRunner,
    diagnostics: Diagnostics,
    abort: AbortSignal,
}

impl Worker {
    pub fn new(
        configuration: Configuration,
        trials: TrialRunner,
        diagnostics: Diagnostics,
        abort: AbortSignal,
    ) -> Self {
        Self {
            configuration,
            trials,
            diagnostics,
            abort,
        }
    }

    /// Run trials until the stopping rule is satisfied.
    ///
    /// Any trial error raises the abort signal and ends the worker; an abort
    /// raised by another worker ends it before its next trial.
    pub async fn run(self) -> Result<WorkerReport, TrialError> {
        let index = self.configuration.index;
        let mut state = WorkerState::new(&self.configuration);

        self.diagnostics.block(&[
            "---------------".to_string(),
            format!(
                "[{}] Benchmarking with {} byte",
                index, self.configuration.message_size
            ),
            self.trials.command().to_string(),
            "---------------".to_string(),
        ]);

        for iteration in 0..state.iteration_cap {
            if self.abort.is_raised() {
                return Err(TrialError::Aborted { index });
            }

            let record = match self.trials.run(iteration).await {
                Ok(record) => record,
                Err(e) => {
                    self.abort.raise();
                    return Err(e);
                }
            };
            state.record(record.mb_per_sec);

            let rse = state
                .stats
                .relative_stderr()
                .map_or("n/a".to_string(), |rse| format!("{:.2}", rse));
            self.diagnostics.line(format!(
                "[{}] Iteration {}: relstderr {}, {} MBps",
                index,
                iteration,
                rse,
                format_value(record.mb_per_sec)
            ));

            if state.is_done() {
                break;
            }
        }

        self.diagnostics
            .line(format!("[{}] Iterations: {}", index, state.stats.count()));
        debug!(
            "Worker {} finished after {} trials (converged: {})",
            index,
            state.stats.count(),
            state.converged()
        );

        Ok(WorkerReport::from_state(&self.configuration, &state))
    }
}
