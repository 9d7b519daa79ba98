use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use super::{MovieMeta, SeriesMeta};
use crate::keys::{episode_prefix, WatchKey};

/// Set of watched keys.
///
/// Serialized as a `{key: true}` object. Absence is the only "not watched"
/// representation: `false` entries found on input are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, bool>", into = "BTreeMap<String, bool>")]
pub struct WatchedSet(BTreeSet<String>);

impl WatchedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    /// Set presence explicitly. Returns `true` if the set changed.
    pub fn set(&mut self, key: &str, checked: bool) -> bool {
        if checked {
            self.0.insert(key.to_string())
        } else {
            self.0.remove(key)
        }
    }

    /// Flip presence. Returns the new presence.
    pub fn toggle(&mut self, key: &str) -> bool {
        if self.0.remove(key) {
            false
        } else {
            self.0.insert(key.to_string());
            true
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of keys starting with `prefix`.
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.0
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|k| k.starts_with(prefix))
            .count()
    }
}

impl From<BTreeMap<String, bool>> for WatchedSet {
    fn from(map: BTreeMap<String, bool>) -> Self {
        Self(map.into_iter().filter(|(_, v)| *v).map(|(k, _)| k).collect())
    }
}

impl From<WatchedSet> for BTreeMap<String, bool> {
    fn from(set: WatchedSet) -> Self {
        set.0.into_iter().map(|k| (k, true)).collect()
    }
}

impl<S: Into<String>> FromIterator<S> for WatchedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// The entire persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalState {
    pub watched: WatchedSet,
    #[serde(default)]
    pub movie_meta: BTreeMap<String, MovieMeta>,
    #[serde(default)]
    pub series_meta: BTreeMap<String, SeriesMeta>,
}

impl CanonicalState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.is_empty() && self.movie_meta.is_empty() && self.series_meta.is_empty()
    }

    pub fn is_watched(&self, key: &WatchKey) -> bool {
        self.watched.contains(&key.to_string())
    }

    pub fn is_movie_watched(&self, slug: &str) -> bool {
        self.is_watched(&WatchKey::movie(slug))
    }

    /// The series aggregate flag.
    pub fn is_series_flagged(&self, slug: &str) -> bool {
        self.is_watched(&WatchKey::series(slug))
    }

    /// Number of watched episode keys for the series with this external id.
    pub fn checked_episodes(&self, series_id: u64) -> u32 {
        let count = self.watched.count_prefix(&episode_prefix(series_id));
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_false_entries_are_dropped() {
        let json = r#"{"watched": {"movie:a": true, "movie:b": false}}"#;
        let state: CanonicalState = serde_json::from_str(json).unwrap();
        assert!(state.is_movie_watched("a"));
        assert!(!state.is_movie_watched("b"));
        assert_eq!(state.watched.len(), 1);
    }

    #[test]
    fn test_serializes_true_only() {
        let mut state = CanonicalState::empty();
        state.watched.set("movie:a", true);
        state.watched.set("movie:a", false);
        state.watched.set("series:b", true);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["watched"], serde_json::json!({"series:b": true}));
        assert_eq!(json["movieMeta"], serde_json::json!({}));
    }

    #[test]
    fn test_checked_episodes_counts_only_own_series() {
        let state = CanonicalState {
            watched: ["tv:4:S1:E1", "tv:4:S1:E2", "tv:42:S1:E1", "series:x"]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        assert_eq!(state.checked_episodes(4), 2);
        assert_eq!(state.checked_episodes(42), 1);
        assert_eq!(state.checked_episodes(7), 0);
    }

    #[test]
    fn test_toggle_returns_presence() {
        let mut set = WatchedSet::new();
        assert!(set.toggle("movie:a"));
        assert!(!set.toggle("movie:a"));
        assert!(set.is_empty());
    }
}
