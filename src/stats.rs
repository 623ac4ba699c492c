use std::{collections::BTreeMap, sync::atomic::Ordering, time::Instant};

use serde::Serialize;

use crate::{EndpointCategory, RequestGuard};

/// Point-in-time usage summary of a [`RequestGuard`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    /// Calls recorded as successful since the guard was built.
    pub total_requests: u64,
    /// Calls rejected since the guard was built.
    pub blocked_requests: u64,
    /// Admissions in the global window at the time of the snapshot.
    pub current_rpm: u64,
    /// Entries held by the response cache.
    pub cache_size: usize,
    /// Current error streak of every category that has failed at least once.
    pub error_counts: BTreeMap<EndpointCategory, u32>,
    /// Share of attempts that were not blocked, in percent.
    pub efficiency: f64,
}

/// `(1 - blocked / max(1, total + blocked)) * 100`.
pub(crate) fn efficiency(total: u64, blocked: u64) -> f64 {
    let attempts = total.saturating_add(blocked).max(1);
    (1f64 - blocked as f64 / attempts as f64) * 100f64
}

impl<V: Clone> RequestGuard<V> {
    /// Summarize usage at `now`.
    ///
    /// Only the global window is touched, and only to prune it so
    /// `current_rpm` is accurate.
    pub fn snapshot(&self, now: Instant) -> UsageStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let blocked_requests = self.blocked_requests.load(Ordering::Relaxed);

        UsageStats {
            total_requests,
            blocked_requests,
            current_rpm: self.windows.global_usage(now).count as u64,
            cache_size: self.cache.len(),
            error_counts: self.backoff.error_counts().collect(),
            efficiency: efficiency(total_requests, blocked_requests),
        }
    } // end method snapshot
}
