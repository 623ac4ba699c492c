/// Error type for this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamGuardError {
    /// Invalid admission ceiling.
    #[error("invalid rate ceiling: {0}")]
    InvalidRateCeiling(String),
    /// Invalid sliding window size.
    #[error("invalid window size: {0}")]
    InvalidWindowSize(String),
    /// Invalid cache capacity.
    #[error("invalid cache capacity: {0}")]
    InvalidCacheCapacity(String),
    /// Invalid eviction batch fraction.
    #[error("invalid eviction fraction: {0}")]
    InvalidEvictionFraction(String),
    /// A string that does not name a known endpoint category.
    #[error("unknown endpoint category: {0}")]
    UnknownCategory(String),
    /// A string that does not name a known request method.
    #[error("unknown request method: {0}")]
    UnknownMethod(String),
}

/// Error returned by [`RequestGuard::execute`](crate::RequestGuard::execute).
#[derive(Debug, thiserror::Error)]
pub enum GuardedCallError<E> {
    /// The guard did not admit the call; it never went upstream.
    #[error(transparent)]
    Rejected(#[from] crate::RejectReason),
    /// The call went upstream and failed.
    #[error("upstream call failed: {0}")]
    Upstream(E),
}
