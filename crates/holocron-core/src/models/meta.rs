use serde::{Deserialize, Serialize};

/// Runtimes at or above this many minutes are treated as corrupt upstream data.
pub const MAX_PLAUSIBLE_RUNTIME: i64 = 100_000;

/// Cached result of resolving a movie against the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieMeta {
    pub external_id: u64,
    #[serde(default)]
    pub runtime_minutes: i64,
    /// Vote average on a 0-10 scale.
    #[serde(default)]
    pub rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_ref: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub fetched_at: i64,
}

impl MovieMeta {
    /// Runtime in minutes if it is positive and plausible.
    pub fn valid_runtime(&self) -> Option<i64> {
        plausible_runtime(self.runtime_minutes)
    }
}

/// Last-known episode totals for a series.
///
/// `checked_episodes` mirrors the number of `tv:<external_id>:*` keys in the
/// watched set and is rewritten by every operation that touches episodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesMeta {
    pub external_id: u64,
    #[serde(default)]
    pub total_episodes: u32,
    #[serde(default)]
    pub checked_episodes: u32,
    #[serde(default)]
    pub total_runtime_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_ref: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub fetched_at: i64,
}

impl SeriesMeta {
    /// Total runtime in minutes, or `None` when unset or implausible.
    pub fn valid_runtime(&self) -> Option<i64> {
        plausible_runtime(self.total_runtime_minutes)
    }

    /// Every known episode is checked. A resolved series with no episodes
    /// counts as complete.
    pub fn is_fully_checked(&self) -> bool {
        self.checked_episodes >= self.total_episodes
    }

    /// Fraction of episodes checked, or `None` when the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        (self.total_episodes > 0)
            .then(|| (f64::from(self.checked_episodes) / f64::from(self.total_episodes)).min(1.0))
    }
}

fn plausible_runtime(minutes: i64) -> Option<i64> {
    (minutes > 0 && minutes < MAX_PLAUSIBLE_RUNTIME).then_some(minutes)
}
