use std::{fmt, ops::Deref, str::FromStr, time::Duration};

use crate::{EndpointCategory, UpstreamGuardError};

/// Maximum number of admissions allowed inside one sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RateCeiling(u32);

impl RateCeiling {
    /// Ceiling for values known to be non-zero at compile time.
    pub(crate) const fn nonzero(value: u32) -> Self {
        assert!(value > 0);
        Self(value)
    }
}

impl Deref for RateCeiling {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u32> for RateCeiling {
    type Error = UpstreamGuardError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(UpstreamGuardError::InvalidRateCeiling(
                "Rate ceiling must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Sliding window duration in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowSizeMs(u64);

impl WindowSizeMs {
    /// The window as a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl Deref for WindowSizeMs {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for WindowSizeMs {
    type Error = UpstreamGuardError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(UpstreamGuardError::InvalidWindowSize(
                "Window size must be at least 1ms".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// A ceiling paired with the window it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeLimit {
    /// Admissions allowed per window.
    pub ceiling: RateCeiling,
    /// Window length.
    pub window: WindowSizeMs,
}

impl ScopeLimit {
    /// 10 admissions per 10 seconds, shared across all categories.
    pub fn burst() -> Self {
        Self {
            ceiling: RateCeiling(10),
            window: WindowSizeMs(10_000),
        }
    }

    /// 200 admissions per minute, shared across all categories.
    pub fn global() -> Self {
        Self {
            ceiling: RateCeiling(200),
            window: WindowSizeMs(60_000),
        }
    }
}

/// Maximum number of entries held by the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheCapacity(usize);

impl Default for CacheCapacity {
    /// Returns a capacity of 1000 entries.
    fn default() -> Self {
        Self(1000)
    }
}

impl Deref for CacheCapacity {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<usize> for CacheCapacity {
    type Error = UpstreamGuardError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(UpstreamGuardError::InvalidCacheCapacity(
                "Cache capacity must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Share of the cache capacity evicted in one batch when the cache overflows.
///
/// Must be within `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct EvictionFraction(f64);

impl EvictionFraction {
    /// Number of entries one eviction batch removes for `capacity`.
    ///
    /// Always at least one, so an overflowing insert can make room.
    pub fn batch_size(&self, capacity: CacheCapacity) -> usize {
        let batch = (*capacity as f64 * self.0).round() as usize;
        batch.clamp(1, *capacity)
    }
}

impl Default for EvictionFraction {
    /// Returns a fraction of 20%.
    fn default() -> Self {
        Self(0.2)
    }
}

impl Deref for EvictionFraction {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<f64> for EvictionFraction {
    type Error = UpstreamGuardError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !(value > 0f64 && value <= 1f64) {
            Err(UpstreamGuardError::InvalidEvictionFraction(
                "Eviction fraction must be within (0, 1]".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Request method of an outgoing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
}

impl Method {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }

    /// Whether results of this method may be served from the response cache.
    ///
    /// Only `GET` qualifies.
    pub fn is_cacheable_read(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = UpstreamGuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(UpstreamGuardError::UnknownMethod(s.to_string())),
        }
    }
}

/// Outcome of [`RequestGuard::evaluate`](crate::RequestGuard::evaluate).
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision<V> {
    /// The call may go upstream. Report the result with `record_outcome`.
    Proceed,
    /// A fresh cached result exists; no upstream call is needed.
    Cached(V),
    /// The call must not go upstream right now.
    Rejected(RejectReason),
}

impl<V> AdmissionDecision<V> {
    /// `true` for [`AdmissionDecision::Proceed`] and [`AdmissionDecision::Cached`].
    pub fn is_admitted(&self) -> bool {
        !matches!(self, AdmissionDecision::Rejected(_))
    }

    /// The rejection reason, if any.
    pub fn rejection(&self) -> Option<&RejectReason> {
        match self {
            AdmissionDecision::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Why a call was rejected.
///
/// Rejections are advisory: the caller decides whether to wait and retry or
/// abandon the call. Every variant carries a best-effort `retry_after_ms` hint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// The category is cooling down after consecutive failures.
    #[error("Backing off due to errors on {category} endpoints (retry after {retry_after_ms}ms)")]
    BackingOff {
        /// Category in cooldown.
        category: EndpointCategory,
        /// Milliseconds of cooldown left.
        retry_after_ms: u64,
    },
    /// Too many admissions across all categories in the short burst window.
    #[error("Burst limit exceeded (max {limit} requests per {}s)", .window_ms / 1000)]
    BurstLimit {
        /// Burst ceiling.
        limit: u32,
        /// Burst window length.
        window_ms: u64,
        /// Milliseconds until the oldest burst entry ages out.
        retry_after_ms: u64,
    },
    /// Too many admissions across all categories in the global window.
    #[error("Global rate limit exceeded (max {limit} requests per {}s)", .window_ms / 1000)]
    GlobalLimit {
        /// Global ceiling.
        limit: u32,
        /// Global window length.
        window_ms: u64,
        /// Milliseconds until the oldest global entry ages out.
        retry_after_ms: u64,
    },
    /// Too many admissions for this category.
    #[error("Endpoint rate limit exceeded (max {limit} requests per {}s for {category})", .window_ms / 1000)]
    EndpointLimit {
        /// Category whose quota is exhausted.
        category: EndpointCategory,
        /// Category ceiling.
        limit: u32,
        /// Category window length.
        window_ms: u64,
        /// Milliseconds until the oldest category entry ages out.
        retry_after_ms: u64,
    },
}

impl RejectReason {
    /// Best-effort wait before the same call could be admitted.
    pub fn retry_after(&self) -> Duration {
        let ms = match self {
            RejectReason::BackingOff { retry_after_ms, .. }
            | RejectReason::BurstLimit { retry_after_ms, .. }
            | RejectReason::GlobalLimit { retry_after_ms, .. }
            | RejectReason::EndpointLimit { retry_after_ms, .. } => *retry_after_ms,
        };

        Duration::from_millis(ms)
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
