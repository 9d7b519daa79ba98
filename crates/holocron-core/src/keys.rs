//! Watch-key grammar.
//!
//! Every unit of trackable progress is addressed by a string key:
//!
//! - `movie:<slug>`: a standalone film is complete.
//! - `series:<slug>`: a whole series is complete at the aggregate level.
//! - `tv:<externalId>:S<season>:E<episode>`: a single episode is watched.

use std::fmt;

pub const MOVIE_PREFIX: &str = "movie:";
pub const SERIES_PREFIX: &str = "series:";
pub const EPISODE_PREFIX: &str = "tv:";

/// A single episode of a resolved series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeRef {
    pub series_id: u64,
    pub season: u32,
    pub episode: u32,
}

impl EpisodeRef {
    pub fn new(series_id: u64, season: u32, episode: u32) -> Self {
        Self {
            series_id,
            season,
            episode,
        }
    }

    pub fn key(&self) -> String {
        WatchKey::Episode(*self).to_string()
    }
}

/// A parsed watch-key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchKey {
    Movie(String),
    Series(String),
    Episode(EpisodeRef),
}

impl WatchKey {
    pub fn movie(slug: &str) -> Self {
        Self::Movie(slug.to_string())
    }

    pub fn series(slug: &str) -> Self {
        Self::Series(slug.to_string())
    }

    pub fn episode(series_id: u64, season: u32, episode: u32) -> Self {
        Self::Episode(EpisodeRef::new(series_id, season, episode))
    }

    /// Parse a key string. Returns `None` for anything outside the three forms.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(slug) = raw.strip_prefix(MOVIE_PREFIX) {
            return (!slug.is_empty()).then(|| Self::Movie(slug.to_string()));
        }
        if let Some(slug) = raw.strip_prefix(SERIES_PREFIX) {
            return (!slug.is_empty()).then(|| Self::Series(slug.to_string()));
        }
        let rest = raw.strip_prefix(EPISODE_PREFIX)?;
        let mut parts = rest.split(':');
        let series_id = parts.next()?.parse().ok()?;
        let season = parts.next()?.strip_prefix('S')?.parse().ok()?;
        let episode = parts.next()?.strip_prefix('E')?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::Episode(EpisodeRef::new(series_id, season, episode)))
    }
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie(slug) => write!(f, "{MOVIE_PREFIX}{slug}"),
            Self::Series(slug) => write!(f, "{SERIES_PREFIX}{slug}"),
            Self::Episode(ep) => write!(
                f,
                "{EPISODE_PREFIX}{}:S{}:E{}",
                ep.series_id, ep.season, ep.episode
            ),
        }
    }
}

impl From<WatchKey> for String {
    fn from(key: WatchKey) -> Self {
        key.to_string()
    }
}

/// Prefix shared by every episode key of one series, e.g. `tv:42:`.
pub fn episode_prefix(series_id: u64) -> String {
    format!("{EPISODE_PREFIX}{series_id}:")
}
