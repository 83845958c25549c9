//! Running statistics for a stream of throughput samples.
//!
//! [`OnlineStats`] keeps the sample count, mean and the sum of squared
//! deviations (Welford's update), which is enough to answer the stopping
//! question after every trial without storing the samples themselves.

use serde::{Deserialize, Serialize};

/// Incremental mean/variance accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OnlineStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl OnlineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample.
    pub fn observe(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of the samples seen so far, `None` before the first one.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Population standard deviation divided by the mean.
    ///
    /// Undefined (`None`) with fewer than two samples. A zero mean gives
    /// `0.0` when the deviation is zero too, and `+inf` otherwise so that
    /// such a stream never looks precise enough.
    pub fn relative_stderr(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }

        // m2 can drift a hair below zero on nearly constant input
        let std_dev = (self.m2 / self.count as f64).max(0.0).sqrt();
        if self.mean == 0.0 {
            return Some(if std_dev == 0.0 { 0.0 } else { f64::INFINITY });
        }

        Some(std_dev / self.mean.abs())
    }

    /// Whether another trial is needed.
    ///
    /// A negative `threshold` disables the precision stop, so exactly
    /// `iterations` samples are taken. Otherwise sampling stops at the first
    /// point with two or more samples whose relative standard error is
    /// below `threshold`, or when the budget is spent.
    pub fn need_more(&self, threshold: f64, iterations: usize) -> bool {
        if self.count >= iterations {
            return false;
        }
        if threshold < 0.0 {
            return true;
        }

        match self.relative_stderr() {
            Some(rse) => rse >= threshold,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_of(samples: &[f64]) -> OnlineStats {
        let mut stats = OnlineStats::new();
        for &x in samples {
            stats.observe(x);
        }
        stats
    }

    /// Number of samples drawn from `samples` before `need_more` says stop.
    fn samples_taken(samples: &[f64], threshold: f64, iterations: usize) -> usize {
        let mut stats = OnlineStats::new();
        for &x in samples.iter().take(iterations) {
            stats.observe(x);
            if !stats.need_more(threshold, iterations) {
                break;
            }
        }
        stats.count()
    }

    #[test]
    fn test_empty() {
        let stats = OnlineStats::new();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.mean(), None);
        assert_eq!(stats.relative_stderr(), None);
        assert!(stats.need_more(0.1, 3));
    }

    #[test]
    fn test_single_sample_has_no_stderr() {
        let stats = stats_of(&[42.0]);
        assert_eq!(stats.mean(), Some(42.0));
        assert_eq!(stats.relative_stderr(), None);
    }

    #[test]
    fn test_constant_samples_have_zero_stderr() {
        for n in 2..10 {
            let stats = stats_of(&vec![123.45; n]);
            assert_eq!(stats.relative_stderr(), Some(0.0));
        }
    }

    #[test]
    fn test_matches_population_formula() {
        let samples = [10.0, 20.0, 30.0, 40.0];
        let stats = stats_of(&samples);

        let n = samples.len() as f64;
        let sum: f64 = samples.iter().sum();
        let sum_sq: f64 = samples.iter().map(|x| x * x).sum();
        let mean = sum / n;
        let expected = (sum_sq / n - mean * mean).sqrt() / mean;

        assert_eq!(stats.mean(), Some(25.0));
        assert!((stats.relative_stderr().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_mean() {
        assert_eq!(stats_of(&[0.0, 0.0]).relative_stderr(), Some(0.0));
        assert_eq!(
            stats_of(&[-1.0, 1.0]).relative_stderr(),
            Some(f64::INFINITY)
        );
        assert!(stats_of(&[-1.0, 1.0]).need_more(0.5, 10));
    }

    #[test]
    fn test_negative_threshold_runs_full_budget() {
        let constant = [5.0; 8];
        assert_eq!(samples_taken(&constant, -1.0, 8), 8);
        assert_eq!(samples_taken(&[1.0, 100.0, 3.0, 7.0], -0.5, 4), 4);
    }

    #[test]
    fn test_stops_at_first_precise_point() {
        // 50, 60: mean 55, deviation 5, rse ~0.09
        assert_eq!(samples_taken(&[50.0, 60.0, 70.0, 80.0], 0.5, 4), 2);
        assert_eq!(samples_taken(&[100.0, 100.0, 100.0], 0.01, 4), 2);
        // rse of 10,20,30,40 never drops below 0.01
        assert_eq!(samples_taken(&[10.0, 20.0, 30.0, 40.0], 0.01, 4), 4);
    }

    #[test]
    fn test_budget_caps_precise_threshold() {
        assert_eq!(samples_taken(&[1.0, 1.0, 1.0], 0.1, 1), 1);
        assert!(!stats_of(&[1.0, 2.0]).need_more(0.0, 2));
    }

    #[test]
    fn test_zero_threshold_needs_strictly_smaller_stderr() {
        // rse 0.0 is not < 0.0, so a zero threshold always uses the budget
        assert_eq!(samples_taken(&[7.0; 5], 0.0, 5), 5);
    }
}
