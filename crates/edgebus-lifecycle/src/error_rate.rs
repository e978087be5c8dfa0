//! Sliding-window error rate per phase (spec §4.H): after `K` failures
//! within `W` seconds the FSM treats the component as Broken. In-memory
//! only — a crash resets the counter (spec §9 design note).

use std::time::{Duration, Instant};

/// Default `K` (failure count) and `W` (window) from spec §4.H.
pub const DEFAULT_MAX_FAILURES: usize = 3;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

/// Minimum delay between retry attempts (spec §4.H: "Retry inter-attempt
/// delay >= 1 s").
pub const MIN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Tracks failure timestamps for one phase of one component.
#[derive(Debug, Clone)]
pub struct ErrorRate {
    max_failures: usize,
    window: Duration,
    failures: Vec<Instant>,
}

impl Default for ErrorRate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILURES, DEFAULT_WINDOW)
    }
}

impl ErrorRate {
    pub fn new(max_failures: usize, window: Duration) -> Self {
        Self { max_failures, window, failures: Vec::new() }
    }

    /// Records a failure at `now`, dropping failures that have aged out of
    /// the window, and returns whether the component has now tripped
    /// Broken (`K` failures observed within `W`).
    pub fn record_failure_at(&mut self, now: Instant) -> bool {
        self.failures.retain(|&t| now.duration_since(t) < self.window);
        self.failures.push(now);
        self.failures.len() >= self.max_failures
    }

    pub fn record_failure(&mut self) -> bool {
        self.record_failure_at(Instant::now())
    }

    /// A successful run does not reset history: the window is purely
    /// time-based, matching the original `errorRate` counter (a success
    /// does not forgive a prior failure early).
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn reset(&mut self) {
        self.failures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_broken_on_kth_failure_within_window() {
        let mut rate = ErrorRate::new(3, Duration::from_secs(3600));
        let t0 = Instant::now();
        assert!(!rate.record_failure_at(t0));
        assert!(!rate.record_failure_at(t0 + Duration::from_secs(10)));
        assert!(rate.record_failure_at(t0 + Duration::from_secs(20)));
    }

    #[test]
    fn old_failures_age_out_of_the_window() {
        let mut rate = ErrorRate::new(3, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(!rate.record_failure_at(t0));
        assert!(!rate.record_failure_at(t0 + Duration::from_secs(10)));
        // this failure is well past the first two once they've aged out
        assert!(!rate.record_failure_at(t0 + Duration::from_secs(200)));
        assert_eq!(rate.failure_count(), 1);
    }
}
