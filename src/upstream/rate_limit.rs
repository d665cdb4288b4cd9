// =============================================================================
// CreditTracker — per-minute/per-day credit budget for the forex adapter
// =============================================================================
//
// Modeled directly on the teacher's rate-limit tracker: atomic counters, a
// `can_send_request`-shaped preflight check, periodic resets. One forex
// symbol consumes one credit; when the budget is exhausted the adapter
// returns an empty map for the remainder of the job rather than erroring
// (spec §4.B, §7 UpstreamBudgetExhausted).
// =============================================================================

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

pub struct CreditTracker {
    per_minute_limit: u32,
    per_day_limit: u32,
    used_this_minute: AtomicU32,
    used_today: AtomicU32,
    minute_window_started: AtomicU64,
    day_window_started: AtomicU64,
}

impl CreditTracker {
    pub fn new(per_minute_limit: u32, per_day_limit: u32) -> Self {
        let now = now_secs();
        Self {
            per_minute_limit,
            per_day_limit,
            used_this_minute: AtomicU32::new(0),
            used_today: AtomicU32::new(0),
            minute_window_started: AtomicU64::new(now),
            day_window_started: AtomicU64::new(now),
        }
    }

    fn roll_windows(&self) {
        let now = now_secs();
        let minute_start = self.minute_window_started.load(Ordering::Relaxed);
        if now.saturating_sub(minute_start) >= 60 {
            self.used_this_minute.store(0, Ordering::Relaxed);
            self.minute_window_started.store(now, Ordering::Relaxed);
        }
        let day_start = self.day_window_started.load(Ordering::Relaxed);
        if now.saturating_sub(day_start) >= 86_400 {
            self.used_today.store(0, Ordering::Relaxed);
            self.day_window_started.store(now, Ordering::Relaxed);
        }
    }

    /// Returns `true` if `credits` more requests can be sent without
    /// exceeding either budget.
    pub fn can_send(&self, credits: u32) -> bool {
        self.roll_windows();
        let minute_used = self.used_this_minute.load(Ordering::Relaxed);
        let day_used = self.used_today.load(Ordering::Relaxed);
        minute_used + credits <= self.per_minute_limit && day_used + credits <= self.per_day_limit
    }

    /// Record that `credits` were spent.
    pub fn record_spend(&self, credits: u32) {
        self.used_this_minute.fetch_add(credits, Ordering::Relaxed);
        self.used_today.fetch_add(credits, Ordering::Relaxed);
    }

    /// How many more credits can be spent this minute, respecting both
    /// budgets, without blocking.
    pub fn remaining_this_minute(&self) -> u32 {
        self.roll_windows();
        let minute_left = self
            .per_minute_limit
            .saturating_sub(self.used_this_minute.load(Ordering::Relaxed));
        let day_left = self
            .per_day_limit
            .saturating_sub(self.used_today.load(Ordering::Relaxed));
        minute_left.min(day_left)
    }

    pub fn note_exhausted(&self, remaining_symbols: usize) {
        info!(
            remaining_symbols,
            budget_remaining_this_minute = self.remaining_this_minute(),
            "forex credit budget exhausted for this tick"
        );
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_at_per_minute_budget() {
        let tracker = CreditTracker::new(8, 800);
        assert!(tracker.can_send(8));
        assert!(!tracker.can_send(9));
        tracker.record_spend(8);
        assert!(!tracker.can_send(1));
    }

    #[test]
    fn remaining_reflects_both_budgets() {
        let tracker = CreditTracker::new(8, 10);
        tracker.record_spend(8);
        // per-minute budget exhausted even though the day budget has room.
        assert_eq!(tracker.remaining_this_minute(), 0);
    }
}
