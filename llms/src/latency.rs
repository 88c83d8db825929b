//! Wall-clock latency measurement for vendor calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const UNSET: u64 = u64::MAX;

/// Holds the latency of the most recently finished call.
///
/// Concurrent calls on one tracker race for the slot; whichever finishes last
/// wins. Results carry the latency of their own call, taken from the guard.
#[derive(Debug)]
pub struct LatencyTracker {
    last_nanos: AtomicU64,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyTracker {
    /// Creates a tracker with no recorded latency.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_nanos: AtomicU64::new(UNSET),
        }
    }

    /// Starts timing a call. The elapsed time is recorded when the guard is
    /// finished or dropped, so early returns are measured too.
    #[must_use = "dropping the guard immediately records a zero-length call"]
    pub fn track(&self) -> LatencyGuard<'_> {
        LatencyGuard {
            tracker: self,
            start: Instant::now(),
            recorded: false,
        }
    }

    /// Latency of the last finished call, if any.
    #[must_use]
    pub fn last(&self) -> Option<Duration> {
        match self.last_nanos.load(Ordering::Relaxed) {
            UNSET => None,
            nanos => Some(Duration::from_nanos(nanos)),
        }
    }

    fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(UNSET - 1);
        self.last_nanos.store(nanos.min(UNSET - 1), Ordering::Relaxed);
    }
}

/// Scoped timer returned by [`LatencyTracker::track`].
#[derive(Debug)]
pub struct LatencyGuard<'a> {
    tracker: &'a LatencyTracker,
    start: Instant,
    recorded: bool,
}

impl LatencyGuard<'_> {
    /// Stops the timer, records the latency and returns it.
    pub fn finish(mut self) -> Duration {
        let elapsed = self.start.elapsed();
        self.tracker.record(elapsed);
        self.recorded = true;
        elapsed
    }
}

impl Drop for LatencyGuard<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            self.tracker.record(self.start.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        assert_eq!(LatencyTracker::new().last(), None);
    }

    #[test]
    fn finish_records_and_returns() {
        let tracker = LatencyTracker::new();
        let guard = tracker.track();
        std::thread::sleep(Duration::from_millis(5));
        let elapsed = guard.finish();

        assert!(elapsed >= Duration::from_millis(5));
        assert_eq!(tracker.last(), Some(elapsed));
    }

    #[test]
    fn drop_records_on_early_exit() {
        fn failing_call(tracker: &LatencyTracker) -> Result<(), &'static str> {
            let _timer = tracker.track();
            Err("vendor down")
        }

        let tracker = LatencyTracker::new();
        assert!(failing_call(&tracker).is_err());
        assert!(tracker.last().is_some());
    }

    #[test]
    fn later_call_overwrites() {
        let tracker = LatencyTracker::new();
        let first = tracker.track().finish();
        let guard = tracker.track();
        std::thread::sleep(Duration::from_millis(2));
        let second = guard.finish();

        assert!(second >= first);
        assert_eq!(tracker.last(), Some(second));
    }
}
