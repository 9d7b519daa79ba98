//! Trait definitions for metadata lookups.
//!
//! The tracker talks to [`MetadataService`] only, so tests can swap the HTTP
//! proxy client for an in-memory fake.

use std::future::Future;

use holocron_core::catalog::{CatalogEntry, MediaKind};
use holocron_core::guide::EpisodeGuide;
use holocron_core::models::MovieMeta;
use serde::{Deserialize, Serialize};

use crate::error::MetadataError;

/// Earliest and latest release years accepted in a lookup.
pub const YEAR_RANGE: std::ops::RangeInclusive<u16> = 1900..=2100;

/// Resolves titles and fetches episode/runtime data.
pub trait MetadataService: Send + Sync {
    /// Map a title to its catalog id at the metadata provider.
    fn resolve(
        &self,
        query: &ResolveQuery,
    ) -> impl Future<Output = Result<Resolved, MetadataError>> + Send;

    /// Season and episode structure of a series.
    fn fetch_series(
        &self,
        external_id: u64,
    ) -> impl Future<Output = Result<EpisodeGuide, MetadataError>> + Send;

    /// Runtime, rating and poster of a movie.
    fn fetch_movie(
        &self,
        external_id: u64,
    ) -> impl Future<Output = Result<MovieDetails, MetadataError>> + Send;
}

/// A validated title lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveQuery {
    pub title: String,
    pub year: u16,
    pub kind: MediaKind,
}

impl ResolveQuery {
    /// Reject lookups that cannot succeed before any request is made.
    pub fn new(title: &str, year: u16, kind: MediaKind) -> Result<Self, MetadataError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(MetadataError::InvalidQuery("title is empty".into()));
        }
        if !YEAR_RANGE.contains(&year) {
            return Err(MetadataError::InvalidQuery(format!(
                "year {year} is out of range"
            )));
        }
        Ok(Self {
            title: title.to_string(),
            year,
            kind,
        })
    }

    pub fn for_entry(entry: &CatalogEntry) -> Result<Self, MetadataError> {
        Self::new(&entry.title, entry.year, entry.kind)
    }
}

/// Outcome of a title lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolved {
    pub external_id: u64,
    pub kind: MediaKind,
    pub name: String,
    pub year: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub external_id: u64,
    pub name: String,
    pub runtime_minutes: Option<u32>,
    pub rating: Option<f64>,
    pub poster_ref: Option<String>,
}

impl MovieDetails {
    /// Cacheable meta stamped with `now_ms`. Unknown runtime and rating
    /// become 0, which the progress math treats as unset.
    pub fn into_meta(self, now_ms: i64) -> MovieMeta {
        MovieMeta {
            external_id: self.external_id,
            runtime_minutes: self.runtime_minutes.map(i64::from).unwrap_or(0),
            rating: self.rating.unwrap_or(0.0),
            poster_ref: self.poster_ref,
            fetched_at: now_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_validation() {
        let q = ResolveQuery::new("  Andor ", 2022, MediaKind::Series).unwrap();
        assert_eq!(q.title, "Andor");

        for (title, year) in [("", 2022), ("   ", 2022), ("Andor", 1899), ("Andor", 2101)] {
            let err = ResolveQuery::new(title, year, MediaKind::Series).unwrap_err();
            assert!(matches!(err, MetadataError::InvalidQuery(_)), "{title:?} {year}");
        }
        assert!(ResolveQuery::new("Edge", 1900, MediaKind::Movie).is_ok());
        assert!(ResolveQuery::new("Edge", 2100, MediaKind::Movie).is_ok());
    }

    #[test]
    fn test_movie_details_into_meta() {
        let details = MovieDetails {
            external_id: 11,
            name: "Star Wars".into(),
            runtime_minutes: None,
            rating: Some(8.2),
            poster_ref: Some("/p.jpg".into()),
        };
        let meta = details.into_meta(1_000);
        assert_eq!(meta.runtime_minutes, 0);
        assert_eq!(meta.valid_runtime(), None);
        assert_eq!(meta.fetched_at, 1_000);
        assert_eq!(meta.poster_ref.as_deref(), Some("/p.jpg"));
    }
}
