//! Resolved season/episode structure of a series.
//!
//! Guides are fetched from the metadata service and held in memory only; the
//! persisted state keeps just the denormalized counts in [`SeriesMeta`].
//!
//! [`SeriesMeta`]: crate::models::SeriesMeta

use serde::{Deserialize, Serialize};

use crate::keys::EpisodeRef;
use crate::models::WatchedSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideEpisode {
    pub number: u32,
    pub name: String,
    pub air_date: Option<String>,
    pub runtime_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideSeason {
    pub number: u32,
    pub episodes: Vec<GuideEpisode>,
}

impl GuideSeason {
    /// Sum of known episode runtimes, `None` when no episode has one.
    pub fn runtime_minutes(&self) -> Option<u32> {
        let total: u32 = self.episodes.iter().filter_map(|e| e.runtime_minutes).sum();
        (total > 0).then_some(total)
    }
}

/// Episode listing for one series. Seasons and episodes are sorted ascending
/// and season 0 (specials) is never present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeGuide {
    pub external_id: u64,
    pub name: String,
    pub rating: Option<f64>,
    pub poster_ref: Option<String>,
    pub seasons: Vec<GuideSeason>,
}

impl EpisodeGuide {
    pub fn total_episodes(&self) -> u32 {
        let count: usize = self.seasons.iter().map(|s| s.episodes.len()).sum();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Sum of every known episode runtime in minutes.
    pub fn total_runtime_minutes(&self) -> u32 {
        self.seasons.iter().filter_map(GuideSeason::runtime_minutes).sum()
    }

    pub fn episodes(&self) -> impl Iterator<Item = EpisodeRef> + '_ {
        self.seasons.iter().flat_map(move |s| {
            s.episodes
                .iter()
                .map(move |e| EpisodeRef::new(self.external_id, s.number, e.number))
        })
    }

    pub fn episode_keys(&self) -> Vec<String> {
        self.episodes().map(|ep| ep.key()).collect()
    }

    pub fn contains(&self, season: u32, episode: u32) -> bool {
        self.seasons
            .iter()
            .any(|s| s.number == season && s.episodes.iter().any(|e| e.number == episode))
    }

    /// Exact runtime of the watched episodes, for display. The aggregate
    /// progress figure uses the average-episode estimate instead.
    pub fn watched_runtime_minutes(&self, watched: &WatchedSet) -> u32 {
        self.seasons
            .iter()
            .flat_map(|s| s.episodes.iter().map(move |e| (s.number, e)))
            .filter(|(season, e)| {
                watched.contains(&EpisodeRef::new(self.external_id, *season, e.number).key())
            })
            .filter_map(|(_, e)| e.runtime_minutes)
            .sum()
    }
}
