use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::EndpointCategory;

/// Consecutive failures of one category since its last success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ErrorStreak {
    pub count: u32,
    pub last_failure: Instant,
}

/// Per-category exponential backoff after consecutive failures.
///
/// The cooldown after `n` failures is `min(2^n * base, max)`, measured from the
/// most recent failure. A single success resets the streak to zero and ends
/// any cooldown at once; there is no gradual recovery.
#[derive(Debug)]
pub(crate) struct BackoffController {
    base: Duration,
    max: Duration,
    streaks: DashMap<EndpointCategory, ErrorStreak>,
}

impl BackoffController {
    pub(crate) fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            streaks: DashMap::new(),
        }
    }

    /// Cooldown length for a streak of `count` failures.
    pub(crate) fn cooldown_for(&self, count: u32) -> Duration {
        if count == 0 {
            return Duration::ZERO;
        }

        let factor = 1u32.checked_shl(count).unwrap_or(u32::MAX);

        self.base
            .checked_mul(factor)
            .map_or(self.max, |cooldown| cooldown.min(self.max))
    }

    /// Remaining cooldown for `category`, or `None` when calls may go through.
    pub(crate) fn cooling_down(&self, category: EndpointCategory, now: Instant) -> Option<Duration> {
        let streak = *self.streaks.get(&category)?;

        let cooldown = self.cooldown_for(streak.count);
        let elapsed = now.saturating_duration_since(streak.last_failure);

        (elapsed < cooldown).then(|| cooldown - elapsed)
    } // end method cooling_down

    /// Register one more failure; returns the new streak length.
    pub(crate) fn record_failure(&self, category: EndpointCategory, now: Instant) -> u32 {
        let mut streak = self.streaks.entry(category).or_insert(ErrorStreak {
            count: 0,
            last_failure: now,
        });

        streak.count = streak.count.saturating_add(1);
        streak.last_failure = now;
        streak.count
    } // end method record_failure

    pub(crate) fn record_success(&self, category: EndpointCategory) {
        if let Some(mut streak) = self.streaks.get_mut(&category) {
            streak.count = 0;
        }
    }

    /// Current streak length of every category that has ever failed.
    pub(crate) fn error_counts(&self) -> impl Iterator<Item = (EndpointCategory, u32)> + '_ {
        self.streaks.iter().map(|entry| (*entry.key(), entry.count))
    }
} // end of impl
