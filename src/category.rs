use std::{collections::HashMap, fmt, str::FromStr};

use serde::Serialize;

use crate::{RateCeiling, UpstreamGuardError};

/// Coarse classification of a call target, used for per-category quotas and
/// backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointCategory {
    /// Login and session endpoints.
    Auth,
    /// Marketplace and search queries.
    Search,
    /// Single property lookups.
    Property,
    /// Leaderboard queries.
    Leaderboard,
    /// User info lookups.
    User,
    /// Per-property resource queries.
    Resources,
    /// Everything else.
    Default,
}

impl EndpointCategory {
    /// All categories, in classification order.
    pub const ALL: [EndpointCategory; 7] = [
        EndpointCategory::Auth,
        EndpointCategory::Search,
        EndpointCategory::Property,
        EndpointCategory::Leaderboard,
        EndpointCategory::User,
        EndpointCategory::Resources,
        EndpointCategory::Default,
    ];

    /// Classify a call target (usually a URL).
    ///
    /// Substring tests run in a fixed order against the lower-cased target and
    /// the first match wins. Property lookups exclude `/resources` paths so a
    /// resource query under a property path lands in [`EndpointCategory::Resources`].
    pub fn categorize(target: &str) -> Self {
        let target = target.to_lowercase();
        let has = |needle: &str| target.contains(needle);

        if has("auth") || has("login") {
            EndpointCategory::Auth
        } else if has("marketplace") || has("search") {
            EndpointCategory::Search
        } else if has("landfields") && !has("/resources") {
            EndpointCategory::Property
        } else if has("leaderboard") {
            EndpointCategory::Leaderboard
        } else if has("user_info") || has("users") {
            EndpointCategory::User
        } else if has("resources") {
            EndpointCategory::Resources
        } else {
            EndpointCategory::Default
        }
    }

    /// Lower-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointCategory::Auth => "auth",
            EndpointCategory::Search => "search",
            EndpointCategory::Property => "property",
            EndpointCategory::Leaderboard => "leaderboard",
            EndpointCategory::User => "user",
            EndpointCategory::Resources => "resources",
            EndpointCategory::Default => "default",
        }
    }
}

impl fmt::Display for EndpointCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointCategory {
    type Err = UpstreamGuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EndpointCategory::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UpstreamGuardError::UnknownCategory(s.to_string()))
    }
}

/// Per-category admission ceilings for the endpoint window.
///
/// Categories without an explicit entry use the ceiling of
/// [`EndpointCategory::Default`]. Read-only once the guard is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaTable {
    limits: HashMap<EndpointCategory, RateCeiling>,
    fallback: RateCeiling,
}

impl QuotaTable {
    /// A table where every category uses `fallback`.
    pub fn uniform(fallback: RateCeiling) -> Self {
        Self {
            limits: HashMap::new(),
            fallback,
        }
    }

    /// Set the ceiling for one category.
    ///
    /// Setting [`EndpointCategory::Default`] changes the fallback.
    pub fn with_limit(mut self, category: EndpointCategory, ceiling: RateCeiling) -> Self {
        if category == EndpointCategory::Default {
            self.fallback = ceiling;
        } else {
            self.limits.insert(category, ceiling);
        }
        self
    }

    /// Ceiling that applies to `category`.
    pub fn limit_for(&self, category: EndpointCategory) -> RateCeiling {
        self.limits.get(&category).copied().unwrap_or(self.fallback)
    }
}

impl Default for QuotaTable {
    /// `auth:5, search:30, property:60, leaderboard:20, user:40, resources:30, default:50`.
    fn default() -> Self {
        Self::uniform(RateCeiling::nonzero(50))
            .with_limit(EndpointCategory::Auth, RateCeiling::nonzero(5))
            .with_limit(EndpointCategory::Search, RateCeiling::nonzero(30))
            .with_limit(EndpointCategory::Property, RateCeiling::nonzero(60))
            .with_limit(EndpointCategory::Leaderboard, RateCeiling::nonzero(20))
            .with_limit(EndpointCategory::User, RateCeiling::nonzero(40))
            .with_limit(EndpointCategory::Resources, RateCeiling::nonzero(30))
    }
}
