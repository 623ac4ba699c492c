use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::{EndpointCategory, ScopeLimit, WindowSizeMs};

// Upper bound on up-front allocation for very large ceilings.
const MAX_PREALLOCATED: u32 = 4096;

/// Admission instants for one scope, oldest first.
///
/// Entries are only ever appended at the back and removed from the front, so
/// the queue stays sorted and pruning costs O(removed).
#[derive(Debug)]
pub(crate) struct TimestampWindow {
    window: Duration,
    entries: VecDeque<Instant>,
}

impl TimestampWindow {
    pub(crate) fn new(window: WindowSizeMs, capacity_hint: u32) -> Self {
        Self {
            window: window.as_duration(),
            entries: VecDeque::with_capacity(capacity_hint.min(MAX_PREALLOCATED) as usize),
        }
    }

    /// Drop every leading entry older than `now - window`.
    pub(crate) fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.entries.front()
            && now.saturating_duration_since(*oldest) > self.window
        {
            self.entries.pop_front();
        }
    } // end method prune

    pub(crate) fn record(&mut self, now: Instant) {
        // An instant older than the newest entry is clamped to keep the order.
        let at = match self.entries.back() {
            Some(newest) if *newest > now => *newest,
            _ => now,
        };

        self.entries.push_back(at);
    } // end method record

    pub(crate) fn count(&self) -> usize {
        self.entries.len()
    }

    /// Time until the oldest entry leaves the window.
    pub(crate) fn retry_after(&self, now: Instant) -> Duration {
        match self.entries.front() {
            None => Duration::ZERO,
            Some(oldest) => self
                .window
                .saturating_sub(now.saturating_duration_since(*oldest)),
        }
    }
}

/// Count and retry hint of one pruned window, read under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WindowUsage {
    pub count: usize,
    pub retry_after: Duration,
}

/// Burst, global and per-category sliding windows.
///
/// Burst and global windows each sit behind their own lock; per-category
/// windows live in a [`DashMap`] and are created on first use.
#[derive(Debug)]
pub(crate) struct WindowTracker {
    burst: Mutex<TimestampWindow>,
    global: Mutex<TimestampWindow>,
    endpoint_window: WindowSizeMs,
    endpoints: DashMap<EndpointCategory, TimestampWindow>,
}

impl WindowTracker {
    pub(crate) fn new(burst: ScopeLimit, global: ScopeLimit, endpoint_window: WindowSizeMs) -> Self {
        Self {
            burst: Mutex::new(TimestampWindow::new(burst.window, *burst.ceiling)),
            global: Mutex::new(TimestampWindow::new(global.window, *global.ceiling)),
            endpoint_window,
            endpoints: DashMap::new(),
        }
    } // end constructor

    pub(crate) fn burst_usage(&self, now: Instant) -> WindowUsage {
        Self::usage(&mut self.burst.lock(), now)
    }

    pub(crate) fn global_usage(&self, now: Instant) -> WindowUsage {
        Self::usage(&mut self.global.lock(), now)
    }

    pub(crate) fn endpoint_usage(&self, category: EndpointCategory, now: Instant) -> WindowUsage {
        let mut window = self
            .endpoints
            .entry(category)
            .or_insert_with(|| TimestampWindow::new(self.endpoint_window, 0));

        Self::usage(window.value_mut(), now)
    }

    /// Append `now` to the burst, global and category windows.
    pub(crate) fn record(&self, category: EndpointCategory, now: Instant) {
        self.burst.lock().record(now);
        self.global.lock().record(now);

        self.endpoints
            .entry(category)
            .or_insert_with(|| TimestampWindow::new(self.endpoint_window, 0))
            .record(now);
    } // end method record

    fn usage(window: &mut TimestampWindow, now: Instant) -> WindowUsage {
        window.prune(now);

        WindowUsage {
            count: window.count(),
            retry_after: window.retry_after(now),
        }
    }
} // end of impl
