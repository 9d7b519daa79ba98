//! One-way migration from the legacy flat record.
//!
//! The legacy schema stored everything in one `key -> bool` map. Metadata was
//! packed into colon-delimited positional keys:
//!
//! ```text
//! movie-meta:<slug>:<externalId>:<runtime>:<rating>:<timestamp>
//! series-meta:<slug>:<externalId>:<total>:<checked>:<timestamp>
//! series-meta:<slug>:<externalId>:<total>:<checked>:<runtime>:<timestamp>
//! ```
//!
//! Movie and series completion also shared the `movie:` namespace. This is
//! the only place those formats are understood.

use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::keys::{WatchKey, EPISODE_PREFIX, MOVIE_PREFIX, SERIES_PREFIX};
use crate::models::{CanonicalState, MovieMeta, SeriesMeta};

const MOVIE_META_PREFIX: &str = "movie-meta:";
const SERIES_META_PREFIX: &str = "series-meta:";

/// The legacy record with only its `true` entries kept.
pub type LegacyRecord = BTreeMap<String, bool>;

/// Classification of one legacy key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LegacyKey<'a> {
    Episode(&'a str),
    Completion(&'a str),
    MovieMeta(&'a str),
    SeriesMeta(&'a str),
    Unknown,
}

fn classify(key: &str) -> LegacyKey<'_> {
    if key.starts_with(EPISODE_PREFIX) {
        LegacyKey::Episode(key)
    } else if let Some(rest) = key.strip_prefix(MOVIE_META_PREFIX) {
        LegacyKey::MovieMeta(rest)
    } else if let Some(rest) = key.strip_prefix(SERIES_META_PREFIX) {
        LegacyKey::SeriesMeta(rest)
    } else if key.starts_with(MOVIE_PREFIX) || key.starts_with(SERIES_PREFIX) {
        LegacyKey::Completion(key)
    } else {
        LegacyKey::Unknown
    }
}

/// Convert a legacy record into the structured state.
///
/// Deterministic: the same record and catalog always produce the same state.
/// Running it over an already-migrated watched set changes nothing.
pub fn migrate_legacy(record: &LegacyRecord, catalog: &Catalog) -> CanonicalState {
    let mut state = CanonicalState::empty();
    // Latest timestamp wins when one slug has several meta keys.
    let mut movie_meta: BTreeMap<String, MovieMeta> = BTreeMap::new();
    let mut series_meta: BTreeMap<String, SeriesMeta> = BTreeMap::new();

    for key in record.iter().filter(|(_, v)| **v).map(|(k, _)| k.as_str()) {
        match classify(key) {
            LegacyKey::Episode(k) => {
                state.watched.set(k, true);
            }
            LegacyKey::Completion(k) => {
                state.watched.set(&completion_key(k, catalog), true);
            }
            LegacyKey::MovieMeta(rest) => {
                if let Some((slug, meta)) = parse_movie_meta(rest) {
                    keep_latest(&mut movie_meta, slug, meta, |m| m.fetched_at);
                }
            }
            LegacyKey::SeriesMeta(rest) => {
                if let Some((slug, meta)) = parse_series_meta(rest) {
                    keep_latest(&mut series_meta, slug, meta, |m| m.fetched_at);
                }
            }
            LegacyKey::Unknown => {
                tracing::debug!(key, "Dropping unrecognized legacy key");
            }
        }
    }

    state.movie_meta = movie_meta;
    state.series_meta = series_meta;
    state
}

/// `movie:<slug>` becomes `series:<slug>` when the catalog lists a series.
fn completion_key(key: &str, catalog: &Catalog) -> String {
    match key.strip_prefix(MOVIE_PREFIX) {
        Some(slug) if catalog.is_series(slug) => WatchKey::series(slug).to_string(),
        _ => key.to_string(),
    }
}

fn keep_latest<T>(map: &mut BTreeMap<String, T>, slug: &str, meta: T, stamp: impl Fn(&T) -> i64) {
    match map.get(slug) {
        Some(existing) if stamp(existing) > stamp(&meta) => {}
        _ => {
            map.insert(slug.to_string(), meta);
        }
    }
}

/// `<slug>:<externalId>:<runtime>:<rating>:<timestamp>`
fn parse_movie_meta(rest: &str) -> Option<(&str, MovieMeta)> {
    let fields: Vec<&str> = rest.split(':').collect();
    let slug = fields.first().copied().filter(|s| !s.is_empty())?;
    let meta = MovieMeta {
        external_id: field_u64(&fields, 1),
        runtime_minutes: field_i64(&fields, 2),
        rating: field_f64(&fields, 3),
        poster_ref: None,
        fetched_at: field_i64(&fields, 4),
    };
    Some((slug, meta))
}

/// Two layouts, told apart by field count:
/// `<slug>:<id>:<total>:<checked>:<timestamp>` and
/// `<slug>:<id>:<total>:<checked>:<runtime>:<timestamp>`.
fn parse_series_meta(rest: &str) -> Option<(&str, SeriesMeta)> {
    let fields: Vec<&str> = rest.split(':').collect();
    let slug = fields.first().copied().filter(|s| !s.is_empty())?;
    let (runtime, fetched_at) = if fields.len() >= 6 {
        (field_i64(&fields, 4), field_i64(&fields, 5))
    } else {
        (0, field_i64(&fields, 4))
    };
    let meta = SeriesMeta {
        external_id: field_u64(&fields, 1),
        total_episodes: field_u32(&fields, 2),
        checked_episodes: field_u32(&fields, 3),
        total_runtime_minutes: runtime,
        poster_ref: None,
        fetched_at,
    };
    Some((slug, meta))
}

// Positional fields are coerced to numbers; anything unparseable becomes 0.

fn field_f64(fields: &[&str], idx: usize) -> f64 {
    fields
        .get(idx)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn field_i64(fields: &[&str], idx: usize) -> i64 {
    field_f64(fields, idx).trunc() as i64
}

fn field_u64(fields: &[&str], idx: usize) -> u64 {
    field_f64(fields, idx).max(0.0).trunc() as u64
}

fn field_u32(fields: &[&str], idx: usize) -> u32 {
    field_f64(fields, idx).clamp(0.0, f64::from(u32::MAX)).trunc() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, MediaKind};

    fn catalog() -> Catalog {
        let entry = |id: &str, kind| CatalogEntry {
            id: id.into(),
            title: id.to_uppercase(),
            year: 2000,
            kind,
            tier: None,
            runtime_estimate: None,
        };
        Catalog::new(vec![
            entry("a", MediaKind::Movie),
            entry("b", MediaKind::Series),
        ])
        .unwrap()
    }

    fn record(pairs: &[(&str, bool)]) -> LegacyRecord {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_movie_key_and_series_meta() {
        let legacy = record(&[("movie:a", true), ("series-meta:b:42:10:3:1700000000", true)]);
        let state = migrate_legacy(&legacy, &catalog());

        let watched: Vec<&str> = state.watched.iter().collect();
        assert_eq!(watched, vec!["movie:a"]);
        assert_eq!(
            state.series_meta["b"],
            SeriesMeta {
                external_id: 42,
                total_episodes: 10,
                checked_episodes: 3,
                total_runtime_minutes: 0,
                poster_ref: None,
                fetched_at: 1_700_000_000,
            }
        );
    }

    #[test]
    fn test_series_completion_is_rewritten() {
        let legacy = record(&[("movie:b", true), ("tv:42:S1:E1", true), ("movie:zzz", true)]);
        let state = migrate_legacy(&legacy, &catalog());
        assert!(state.is_series_flagged("b"));
        assert!(!state.is_movie_watched("b"));
        assert!(state.watched.contains("tv:42:S1:E1"));
        // Unknown to the catalog: stays a movie key.
        assert!(state.is_movie_watched("zzz"));
    }

    #[test]
    fn test_series_meta_with_runtime_field() {
        let legacy = record(&[("series-meta:b:42:10:3:480:1700000000", true)]);
        let state = migrate_legacy(&legacy, &catalog());
        let meta = &state.series_meta["b"];
        assert_eq!(meta.total_runtime_minutes, 480);
        assert_eq!(meta.fetched_at, 1_700_000_000);
    }

    #[test]
    fn test_movie_meta() {
        let legacy = record(&[("movie-meta:a:11:121:8.2:1700000000", true)]);
        let state = migrate_legacy(&legacy, &catalog());
        let meta = &state.movie_meta["a"];
        assert_eq!(meta.external_id, 11);
        assert_eq!(meta.runtime_minutes, 121);
        assert!((meta.rating - 8.2).abs() < f64::EPSILON);
        // Meta keys never land in the watched set.
        assert!(state.watched.is_empty());
    }

    #[test]
    fn test_garbage_fields_default_to_zero() {
        let legacy = record(&[("series-meta:b:NaN:ten:-3", true)]);
        let state = migrate_legacy(&legacy, &catalog());
        let meta = &state.series_meta["b"];
        assert_eq!(meta.external_id, 0);
        assert_eq!(meta.total_episodes, 0);
        assert_eq!(meta.checked_episodes, 0);
        assert_eq!(meta.fetched_at, 0);
    }

    #[test]
    fn test_latest_meta_wins() {
        let legacy = record(&[
            ("series-meta:b:42:10:3:1700000000", true),
            ("series-meta:b:42:10:7:1800000000", true),
        ]);
        let state = migrate_legacy(&legacy, &catalog());
        assert_eq!(state.series_meta["b"].checked_episodes, 7);
    }

    #[test]
    fn test_false_and_unknown_entries_ignored() {
        let legacy = record(&[("movie:a", false), ("welcome-dismissed", true)]);
        let state = migrate_legacy(&legacy, &catalog());
        assert!(state.is_empty());
    }

    #[test]
    fn test_deterministic_and_fixed_point() {
        let legacy = record(&[
            ("movie:a", true),
            ("movie:b", true),
            ("tv:42:S1:E2", true),
            ("series-meta:b:42:10:1:1700000000", true),
        ]);
        let first = migrate_legacy(&legacy, &catalog());
        let second = migrate_legacy(&legacy, &catalog());
        assert_eq!(first, second);

        let again: LegacyRecord = first.watched.iter().map(|k| (k.to_string(), true)).collect();
        let remigrated = migrate_legacy(&again, &catalog());
        assert_eq!(remigrated.watched, first.watched);
    }
}
