//! Admission control facade.
//!
//! [`RequestGuard`] answers one question per outgoing call: may it go upstream,
//! can it be served from cache, or must it wait? The guard performs no I/O;
//! the transport layer asks before each call and reports the outcome after.

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use crate::{
    AdmissionDecision, CacheCapacity, EndpointCategory, EvictionFraction, GuardedCallError,
    Method, QuotaTable, RejectReason, ScopeLimit, WindowSizeMs,
    backoff::BackoffController,
    cache::CacheStore,
    common::duration_ms,
    window::{WindowTracker, WindowUsage},
};

/// Configuration for [`RequestGuard`].
///
/// [`Default`] gives 10 calls per 10s burst, 200 calls per minute globally,
/// the default [`QuotaTable`] per minute, a 1000-entry cache evicting 20% on
/// overflow with a 5 minute TTL, and a `2^n` second backoff capped at 5 minutes.
#[derive(Clone, Debug)]
pub struct RequestGuardOptions {
    /// Short window shared by every category.
    pub burst: ScopeLimit,
    /// Long window shared by every category.
    pub global: ScopeLimit,
    /// Window the per-category ceilings apply to.
    pub endpoint_window: WindowSizeMs,
    /// Per-category ceilings.
    pub quotas: QuotaTable,
    /// Cache entry bound.
    pub cache_capacity: CacheCapacity,
    /// Share of `cache_capacity` evicted when the cache overflows.
    pub eviction_fraction: EvictionFraction,
    /// Initial cache TTL; see [`RequestGuard::set_cache_ttl`].
    pub cache_ttl: Duration,
    /// Cooldown unit: after `n` consecutive failures a category waits
    /// `2^n * backoff_base`.
    pub backoff_base: Duration,
    /// Upper bound on the cooldown.
    pub max_backoff: Duration,
}

impl Default for RequestGuardOptions {
    fn default() -> Self {
        Self {
            burst: ScopeLimit::burst(),
            global: ScopeLimit::global(),
            endpoint_window: ScopeLimit::global().window,
            quotas: QuotaTable::default(),
            cache_capacity: CacheCapacity::default(),
            eviction_fraction: EvictionFraction::default(),
            cache_ttl: Duration::from_secs(300),
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
        }
    }
}

/// Client-side admission controller for calls to one upstream API.
///
/// Combines, per call target category:
///
/// 1. a response cache for `GET` results, checked first and bypassing every
///    quota on a hit;
/// 2. exponential backoff after consecutive failures;
/// 3. burst, global and per-category sliding windows, checked in that order.
///
/// The first binding constraint is reported as the [`RejectReason`].
///
/// # Thread Safety
///
/// All state is internally synchronized, so a guard can be shared behind an
/// [`Arc`](std::sync::Arc). `evaluate` followed by `record_outcome` is not one
/// atomic step: concurrent callers may both pass a check for the last slot of a
/// window. Limits are therefore soft under contention.
///
/// # Examples
///
/// ```
/// use std::time::Instant;
/// use upstream_guard::{AdmissionDecision, Method, RequestGuard, RequestGuardOptions};
///
/// let guard: RequestGuard<String> = RequestGuard::new(RequestGuardOptions::default());
/// let url = "https://api.example.com/leaderboards/players";
///
/// let now = Instant::now();
/// match guard.evaluate(url, Method::Get, now) {
///     AdmissionDecision::Proceed => {
///         let body = "[]".to_string(); // issue the real request here
///         guard.record_outcome(url, Method::Get, now, true);
///         guard.store_cacheable(url, Method::Get, body, now);
///     }
///     AdmissionDecision::Cached(body) => println!("cached: {body}"),
///     AdmissionDecision::Rejected(reason) => println!("{reason}"),
/// }
///
/// assert!(matches!(
///     guard.evaluate(url, Method::Get, Instant::now()),
///     AdmissionDecision::Cached(_)
/// ));
/// ```
#[derive(Debug)]
pub struct RequestGuard<V> {
    burst: ScopeLimit,
    global: ScopeLimit,
    endpoint_window: WindowSizeMs,
    quotas: QuotaTable,
    pub(crate) windows: WindowTracker,
    pub(crate) backoff: BackoffController,
    pub(crate) cache: CacheStore<V>,
    pub(crate) total_requests: AtomicU64,
    pub(crate) blocked_requests: AtomicU64,
}

impl<V: Clone> RequestGuard<V> {
    /// Create a new guard.
    pub fn new(options: RequestGuardOptions) -> Self {
        Self {
            burst: options.burst,
            global: options.global,
            endpoint_window: options.endpoint_window,
            windows: WindowTracker::new(options.burst, options.global, options.endpoint_window),
            backoff: BackoffController::new(options.backoff_base, options.max_backoff),
            cache: CacheStore::new(
                options.cache_capacity,
                options.eviction_fraction,
                options.cache_ttl,
            ),
            quotas: options.quotas,
            total_requests: AtomicU64::new(0),
            blocked_requests: AtomicU64::new(0),
        }
    } // end constructor

    /// Category a target is accounted under.
    pub fn categorize(&self, target: &str) -> EndpointCategory {
        EndpointCategory::categorize(target)
    }

    /// Decide whether a call to `target` may go upstream at `now`.
    ///
    /// # Behavior
    ///
    /// 1. For `GET`, a fresh cache entry short-circuits to
    ///    [`AdmissionDecision::Cached`] without touching any quota.
    /// 2. Burst, global and category windows are pruned.
    /// 3. A category in cooldown is rejected with [`RejectReason::BackingOff`].
    /// 4. Burst, then global, then category counts are compared with their
    ///    ceilings; the first one reached is reported.
    /// 5. Otherwise [`AdmissionDecision::Proceed`].
    ///
    /// Nothing is recorded on `Proceed`; report the call with
    /// [`RequestGuard::record_outcome`]. Every rejection bumps the blocked
    /// counter.
    pub fn evaluate(&self, target: &str, method: Method, now: Instant) -> AdmissionDecision<V> {
        if method.is_cacheable_read()
            && let Some(value) = self.cache.lookup(method, target, now)
        {
            tracing::trace!(%method, key = target, "request.cached");
            return AdmissionDecision::Cached(value);
        }

        let category = EndpointCategory::categorize(target);

        let burst = self.windows.burst_usage(now);
        let global = self.windows.global_usage(now);
        let endpoint = self.windows.endpoint_usage(category, now);

        if let Some(remaining) = self.backoff.cooling_down(category, now) {
            return self.reject(
                target,
                RejectReason::BackingOff {
                    category,
                    retry_after_ms: duration_ms(remaining),
                },
            );
        }

        if is_exhausted(&burst, &self.burst) {
            return self.reject(
                target,
                RejectReason::BurstLimit {
                    limit: *self.burst.ceiling,
                    window_ms: *self.burst.window,
                    retry_after_ms: duration_ms(burst.retry_after),
                },
            );
        }

        if is_exhausted(&global, &self.global) {
            return self.reject(
                target,
                RejectReason::GlobalLimit {
                    limit: *self.global.ceiling,
                    window_ms: *self.global.window,
                    retry_after_ms: duration_ms(global.retry_after),
                },
            );
        }

        let ceiling = self.quotas.limit_for(category);
        if endpoint.count >= *ceiling as usize {
            return self.reject(
                target,
                RejectReason::EndpointLimit {
                    category,
                    limit: *ceiling,
                    window_ms: *self.endpoint_window,
                    retry_after_ms: duration_ms(endpoint.retry_after),
                },
            );
        }

        tracing::trace!(%method, %category, key = target, "request.admitted");
        AdmissionDecision::Proceed
    } // end method evaluate

    /// Report how an admitted call ended.
    ///
    /// A success is appended to the burst, global and category windows, counted
    /// in `total_requests`, and resets the category's error streak. A failure only
    /// lengthens the error streak; it does not consume window quota.
    pub fn record_outcome(&self, target: &str, method: Method, now: Instant, success: bool) {
        let category = EndpointCategory::categorize(target);

        if success {
            self.windows.record(category, now);
            self.total_requests.fetch_add(1, Ordering::Relaxed);
            self.backoff.record_success(category);
            return;
        }

        let streak = self.backoff.record_failure(category, now);
        tracing::warn!(
            %method,
            %category,
            streak,
            cooldown_ms = duration_ms(self.backoff.cooldown_for(streak)),
            "request.failed, backing off"
        );
    } // end method record_outcome

    /// Cache the result of a successful call.
    ///
    /// Only cacheable reads (`GET`) are stored; returns whether `value` was kept.
    pub fn store_cacheable(&self, target: &str, method: Method, value: V, now: Instant) -> bool {
        if !method.is_cacheable_read() {
            return false;
        }

        self.cache.store(method, target, value, now);
        true
    }

    /// Remaining cooldown of `category` at `now`, or `None` if it is not backing off.
    pub fn cooldown(&self, category: EndpointCategory, now: Instant) -> Option<Duration> {
        self.backoff.cooling_down(category, now)
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Change the cache TTL.
    ///
    /// Applies to existing entries on their next lookup.
    pub fn set_cache_ttl(&self, ttl: Duration) {
        self.cache.set_ttl(ttl);
    }

    /// Current cache TTL.
    pub fn cache_ttl(&self) -> Duration {
        self.cache.ttl()
    }

    /// Run `call` under the guard.
    ///
    /// Returns the cached value when there is one, the [`RejectReason`] when the
    /// call is not admitted, and otherwise runs `call` and reports its outcome:
    /// a success is recorded (and cached for `GET`), an error lengthens the
    /// category's error streak and is handed back as [`GuardedCallError::Upstream`].
    pub fn execute<F, E>(&self, target: &str, method: Method, call: F) -> Result<V, GuardedCallError<E>>
    where
        F: FnOnce() -> Result<V, E>,
    {
        match self.evaluate(target, method, Instant::now()) {
            AdmissionDecision::Proceed => self.settle(target, method, call()),
            AdmissionDecision::Cached(value) => Ok(value),
            AdmissionDecision::Rejected(reason) => Err(reason.into()),
        }
    }

    /// Async counterpart of [`RequestGuard::execute`].
    ///
    /// The guard itself never awaits; only `call` does.
    pub async fn execute_async<F, Fut, E>(
        &self,
        target: &str,
        method: Method,
        call: F,
    ) -> Result<V, GuardedCallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        match self.evaluate(target, method, Instant::now()) {
            AdmissionDecision::Proceed => self.settle(target, method, call().await),
            AdmissionDecision::Cached(value) => Ok(value),
            AdmissionDecision::Rejected(reason) => Err(reason.into()),
        }
    }

    fn settle<E>(&self, target: &str, method: Method, result: Result<V, E>) -> Result<V, GuardedCallError<E>> {
        let now = Instant::now();

        match result {
            Ok(value) => {
                self.record_outcome(target, method, now, true);
                if method.is_cacheable_read() {
                    self.store_cacheable(target, method, value.clone(), now);
                }
                Ok(value)
            }
            Err(err) => {
                self.record_outcome(target, method, now, false);
                Err(GuardedCallError::Upstream(err))
            }
        }
    }

    fn reject(&self, target: &str, reason: RejectReason) -> AdmissionDecision<V> {
        self.blocked_requests.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = target, %reason, "request.rejected");

        AdmissionDecision::Rejected(reason)
    }
} // end of impl

fn is_exhausted(usage: &WindowUsage, limit: &ScopeLimit) -> bool {
    usage.count >= *limit.ceiling as usize
}
