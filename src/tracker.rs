//! Restart-loop detection with sliding-window, entry/exit hysteresis (§4.2).
//!
//! Not authoritative on its own: the reducer combines this with persisted
//! `restart_loop` flags, so losing this in-memory state across a process
//! restart is tolerable (§4.7 reseeds it from the latest loop alert).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Default)]
struct Series {
    timestamps: VecDeque<DateTime<Utc>>,
    in_loop: bool,
}

/// Per-name sliding-window restart tracker, guarded by window `W` and
/// threshold `T`.
pub struct RestartTracker {
    window: Duration,
    threshold: usize,
    series: HashMap<String, Series>,
}

impl RestartTracker {
    pub fn new(window: Duration, threshold: u32) -> Self {
        Self {
            window,
            threshold: threshold.max(1) as usize,
            series: HashMap::new(),
        }
    }

    /// Append `ts`, prune anything older than `ts - window`, and report the
    /// current streak length plus whether this call is the one that crossed
    /// the threshold into a loop.
    pub fn record(&mut self, name: &str, ts: DateTime<Utc>) -> (usize, bool) {
        let window = self.window;
        let threshold = self.threshold;
        let entry = self.series.entry(name.to_string()).or_default();

        entry.timestamps.push_back(ts);
        let cutoff = ts - chrono::Duration::from_std(window).unwrap_or_default();
        while let Some(front) = entry.timestamps.front() {
            if *front < cutoff {
                entry.timestamps.pop_front();
            } else {
                break;
            }
        }

        let streak = entry.timestamps.len();
        let entered_loop = if streak >= threshold && !entry.in_loop {
            entry.in_loop = true;
            true
        } else {
            false
        };

        (streak, entered_loop)
    }

    pub fn in_loop(&self, name: &str) -> bool {
        self.series.get(name).map(|s| s.in_loop).unwrap_or(false)
    }

    /// Clear both the timestamp series and the in-loop flag (autorestart
    /// policy off, or an explicit start from a clean state).
    pub fn reset(&mut self, name: &str) {
        self.series.remove(name);
    }

    /// Alias for `reset`, used by the heal scanner — kept as its own method
    /// so call sites read as intent rather than implementation.
    pub fn mark_healed(&mut self, name: &str) {
        self.reset(name);
    }

    /// Seed the in-loop flag without a timestamp series, used by startup
    /// reconciliation (§4.7) when a persisted `restart_loop` alert says the
    /// container was mid-loop when the process last exited.
    pub fn seed_in_loop(&mut self, name: &str) {
        self.series.entry(name.to_string()).or_default().in_loop = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn sliding_window_law_crosses_threshold_once() {
        let mut tracker = RestartTracker::new(Duration::from_secs(30), 3);
        assert_eq!(tracker.record("web", t(0)), (1, false));
        assert_eq!(tracker.record("web", t(5)), (2, false));
        assert_eq!(tracker.record("web", t(12)), (3, true));
        assert!(tracker.in_loop("web"));
        // a fourth restart while already in loop does not re-enter
        assert_eq!(tracker.record("web", t(15)), (4, false));
    }

    #[test]
    fn pruning_drops_entries_outside_window() {
        let mut tracker = RestartTracker::new(Duration::from_secs(30), 3);
        tracker.record("web", t(0));
        tracker.record("web", t(5));
        // this arrives 40s after the first two, well outside a 30s window
        let (streak, entered) = tracker.record("web", t(40));
        assert_eq!(streak, 1);
        assert!(!entered);
    }

    #[test]
    fn healing_allows_a_fresh_crossing_to_re_enter() {
        let mut tracker = RestartTracker::new(Duration::from_secs(30), 3);
        tracker.record("web", t(0));
        tracker.record("web", t(5));
        tracker.record("web", t(12));
        assert!(tracker.in_loop("web"));

        tracker.mark_healed("web");
        assert!(!tracker.in_loop("web"));

        let (_, entered) = tracker.record("web", t(100));
        assert!(!entered);
        tracker.record("web", t(105));
        let (streak, entered) = tracker.record("web", t(110));
        assert_eq!(streak, 3);
        assert!(entered);
    }

    #[test]
    fn reset_clears_series_independent_of_other_names() {
        let mut tracker = RestartTracker::new(Duration::from_secs(30), 3);
        tracker.record("a", t(0));
        tracker.record("b", t(0));
        tracker.reset("a");
        assert!(!tracker.in_loop("a"));
        assert_eq!(tracker.record("a", t(1)).0, 1);
    }
}
