#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod request_guard;
pub use request_guard::*;

mod category;
pub use category::*;

mod error;
pub use error::*;

mod common;
pub use common::{
    AdmissionDecision, CacheCapacity, EvictionFraction, Method, RateCeiling, RejectReason,
    ScopeLimit, WindowSizeMs,
};

mod stats;
pub use stats::UsageStats;

mod backoff;
mod cache;
mod window;

#[cfg(test)]
mod tests;
