//! Derived progress figures.
//!
//! Everything here is a pure function of the state and the catalog and is
//! recomputed on demand; nothing derived is ever persisted.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::catalog::{Catalog, CatalogEntry};
use crate::keys::{EPISODE_PREFIX, MOVIE_PREFIX, SERIES_PREFIX};
use crate::models::CanonicalState;

/// Minutes of content, both rounded to whole minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeProgress {
    pub total_minutes: i64,
    pub watched_minutes: i64,
}

impl RuntimeProgress {
    /// `round(watched / total * 100)`, or 0 when nothing is known.
    pub fn time_percent(&self) -> u32 {
        if self.total_minutes <= 0 {
            return 0;
        }
        let pct = (self.watched_minutes as f64 / self.total_minutes as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u32
    }
}

/// How far along one catalog entry is, in `[0, 1]`.
pub fn item_contribution(state: &CanonicalState, entry: &CatalogEntry) -> f64 {
    if entry.is_movie() {
        return if state.is_movie_watched(&entry.id) { 1.0 } else { 0.0 };
    }
    if state.is_series_flagged(&entry.id) {
        return 1.0;
    }
    state
        .series_meta
        .get(&entry.id)
        .and_then(|m| m.fraction())
        .unwrap_or(0.0)
}

/// Mean contribution across the catalog as a percentage with two decimals.
pub fn title_percent(state: &CanonicalState, catalog: &Catalog) -> f64 {
    if catalog.is_empty() {
        return 0.0;
    }
    let sum: f64 = catalog.iter().map(|e| item_contribution(state, e)).sum();
    let pct = sum / catalog.len() as f64 * 100.0;
    ((pct * 100.0).round() / 100.0).clamp(0.0, 100.0)
}

/// Total and watched runtime across the catalog.
///
/// A partly watched series counts `checked * runtime / total`, the average
/// episode length times the episodes checked. Exact per-episode sums need the
/// episode guide; see [`crate::guide::EpisodeGuide::watched_runtime_minutes`].
pub fn runtime_progress(state: &CanonicalState, catalog: &Catalog) -> RuntimeProgress {
    let mut total = 0.0_f64;
    let mut watched = 0.0_f64;

    for entry in catalog.iter() {
        let estimate = entry.runtime_estimate.map(i64::from).unwrap_or(0);
        if entry.is_movie() {
            let runtime = state
                .movie_meta
                .get(&entry.id)
                .and_then(|m| m.valid_runtime())
                .unwrap_or(estimate) as f64;
            total += runtime;
            if state.is_movie_watched(&entry.id) && runtime > 0.0 {
                watched += runtime;
            }
            continue;
        }

        let meta = state.series_meta.get(&entry.id);
        let runtime = meta.and_then(|m| m.valid_runtime()).unwrap_or(estimate) as f64;
        total += runtime;
        if state.is_series_flagged(&entry.id) {
            watched += runtime;
        } else if let Some(m) = meta.filter(|m| m.total_episodes > 0 && runtime > 0.0) {
            watched += f64::from(m.checked_episodes) * runtime / f64::from(m.total_episodes);
        }
    }

    RuntimeProgress {
        total_minutes: total.round() as i64,
        watched_minutes: watched.round() as i64,
    }
}

/// An entry is complete when its movie key is watched, its series flag is
/// set, or every episode of its resolved series is checked.
pub fn is_complete(state: &CanonicalState, entry: &CatalogEntry) -> bool {
    if entry.is_movie() {
        return state.is_movie_watched(&entry.id);
    }
    state.is_series_flagged(&entry.id)
        || state
            .series_meta
            .get(&entry.id)
            .is_some_and(|m| m.is_fully_checked())
}

pub fn remaining_count(state: &CanonicalState, catalog: &Catalog) -> usize {
    catalog.iter().filter(|e| !is_complete(state, e)).count()
}

/// Entries matching `query` (case-insensitive title substring), optionally
/// restricted to the ones not yet complete. Catalog order is kept.
pub fn filter<'a>(
    state: &CanonicalState,
    catalog: &'a Catalog,
    query: &str,
    remaining_only: bool,
) -> Vec<&'a CatalogEntry> {
    catalog
        .iter()
        .filter(|e| e.matches(query))
        .filter(|e| !remaining_only || !is_complete(state, e))
        .collect()
}

/// First entry in watch order that is not complete.
pub fn next_up<'a>(state: &CanonicalState, catalog: &'a Catalog) -> Option<&'a CatalogEntry> {
    catalog.iter().find(|e| !is_complete(state, e))
}

/// Number of movie, series and episode keys in the watched set.
pub fn watched_count(state: &CanonicalState) -> usize {
    [MOVIE_PREFIX, SERIES_PREFIX, EPISODE_PREFIX]
        .iter()
        .map(|prefix| state.watched.count_prefix(prefix))
        .sum()
}

/// Whole-number percent of episodes checked for a resolved series.
pub fn series_percent(state: &CanonicalState, slug: &str) -> Option<u32> {
    let fraction = state.series_meta.get(slug)?.fraction()?;
    Some((fraction * 100.0).round() as u32)
}

/// `fetched_at` (ms since epoch) is older than `max_age` at `now`.
pub fn is_stale(fetched_at_ms: i64, now: DateTime<Utc>, max_age: Duration) -> bool {
    match DateTime::<Utc>::from_timestamp_millis(fetched_at_ms) {
        Some(fetched) => now - fetched > max_age,
        None => true,
    }
}

/// Slugs of resolved series whose cached meta is older than `max_age`.
pub fn stale_series<'a>(
    state: &'a CanonicalState,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Vec<&'a str> {
    state
        .series_meta
        .iter()
        .filter(|(_, m)| is_stale(m.fetched_at, now, max_age))
        .map(|(slug, _)| slug.as_str())
        .collect()
}

/// Everything a status view needs in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub title_percent: f64,
    pub runtime: RuntimeProgress,
    pub time_percent: u32,
    pub watched_count: usize,
    pub remaining: usize,
    pub total_items: usize,
    pub next_up: Option<String>,
}

pub fn summarize(state: &CanonicalState, catalog: &Catalog) -> Summary {
    let runtime = runtime_progress(state, catalog);
    Summary {
        title_percent: title_percent(state, catalog),
        runtime,
        time_percent: runtime.time_percent(),
        watched_count: watched_count(state),
        remaining: remaining_count(state, catalog),
        total_items: catalog.len(),
        next_up: next_up(state, catalog).map(|e| e.id.clone()),
    }
}
