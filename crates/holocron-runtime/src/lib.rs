mod history;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use holocron_api::{MetadataError, MetadataService, ResolveQuery};
use holocron_core::cascade;
use holocron_core::catalog::{Catalog, CatalogEntry, MediaKind};
use holocron_core::config::TrackingConfig;
use holocron_core::error::StoreError;
use holocron_core::guide::EpisodeGuide;
use holocron_core::keys::{EpisodeRef, WatchKey};
use holocron_core::models::{CanonicalState, MovieMeta, SeriesMeta};
use holocron_core::progress::{self, Summary};
use holocron_core::reducer::{reduce, Action};
use holocron_core::store::{self, Store};

pub use history::{UndoEntry, UndoHistory};

/// Lookups issued at once by [`Tracker::prefetch`].
const PREFETCH_CONCURRENCY: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("unknown title: {0}")]
    UnknownTitle(String),
    #[error("{0} is not a series")]
    NotASeries(String),
    #[error("{0} is not a movie")]
    NotAMovie(String),
    #[error("{0} has not been resolved yet")]
    Unresolved(String),
    #[error("{slug} has no episode S{season}E{episode}")]
    UnknownEpisode {
        slug: String,
        season: u32,
        episode: u32,
    },
    #[error("a lookup for {0} is already in flight")]
    InFlight(String),
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// Series meta older than this is looked up again by `refresh_stale`.
    pub stale_after: chrono::Duration,
    pub undo_depth: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            stale_after: chrono::Duration::days(30),
            undo_depth: 50,
        }
    }
}

impl From<&TrackingConfig> for TrackerSettings {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            stale_after: config.stale_after(),
            undo_depth: config.undo_depth,
        }
    }
}

/// Metadata folded into the state by a successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Movie(MovieMeta),
    Series(SeriesMeta),
}

/// Outcome of a batch of lookups.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub resolved: Vec<String>,
    pub failed: Vec<(String, TrackerError)>,
}

struct Inner {
    state: CanonicalState,
    store: Store,
    history: UndoHistory,
}

/// Composition root: owns the canonical state, persists every change and
/// folds metadata lookups back in.
///
/// All mutations serialize on one write lock. Network lookups run without it
/// and merge against whatever state is current when they complete.
pub struct Tracker<S> {
    service: Arc<S>,
    catalog: Arc<Catalog>,
    inner: Arc<RwLock<Inner>>,
    guides: Arc<RwLock<HashMap<u64, EpisodeGuide>>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    settings: TrackerSettings,
}

impl<S> Clone for Tracker<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            catalog: Arc::clone(&self.catalog),
            inner: Arc::clone(&self.inner),
            guides: Arc::clone(&self.guides),
            in_flight: Arc::clone(&self.in_flight),
            settings: self.settings.clone(),
        }
    }
}

/// Holds a slug in the in-flight set until dropped.
struct LookupGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    slug: String,
}

impl Drop for LookupGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.slug);
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl<S: MetadataService> Tracker<S> {
    /// Hydrate from `store` (migrating a legacy record if needed).
    pub fn new(catalog: Catalog, store: Store, service: S, settings: TrackerSettings) -> Self {
        let state = store.load(&catalog);
        info!(
            titles = catalog.len(),
            watched = state.watched.len(),
            "Tracker ready"
        );
        Self {
            service: Arc::new(service),
            catalog: Arc::new(catalog),
            inner: Arc::new(RwLock::new(Inner {
                state,
                store,
                history: UndoHistory::new(settings.undo_depth),
            })),
            guides: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            settings,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub async fn state(&self) -> CanonicalState {
        self.inner.read().await.state.clone()
    }

    pub async fn summary(&self) -> Summary {
        progress::summarize(&self.inner.read().await.state, &self.catalog)
    }

    /// Number of actions that can currently be undone.
    pub async fn undo_depth(&self) -> usize {
        self.inner.read().await.history.len()
    }

    pub fn is_in_flight(&self, slug: &str) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(slug))
            .unwrap_or(false)
    }

    // ── Mutations ───────────────────────────────────────────────

    /// Flip a movie's watched flag. Returns the new flag.
    pub async fn toggle_movie(&self, slug: &str) -> Result<bool, TrackerError> {
        let entry = self.entry(slug)?;
        if !entry.is_movie() {
            return Err(TrackerError::NotAMovie(slug.into()));
        }
        let key = WatchKey::movie(slug).to_string();
        let next = self
            .commit("toggle_movie", |s| reduce(s, Action::ToggleWatched(key)))
            .await;
        let watched = next.is_movie_watched(slug);
        info!(slug, watched, "Movie toggled");
        Ok(watched)
    }

    /// Flip a series' aggregate flag. Once the series is resolved every
    /// episode follows the flag, so the guide must be loadable: a lookup
    /// already in flight or a failed fetch leaves the state untouched.
    pub async fn toggle_series(&self, slug: &str) -> Result<bool, TrackerError> {
        self.series_entry(slug)?;
        let resolved = self.known_id(slug, MediaKind::Series).await.is_some();
        let guide = if resolved {
            Some(self.episode_guide(slug).await?)
        } else {
            None
        };

        let now = now_ms();
        let next = self
            .commit("toggle_series", |s| {
                cascade::toggle_series(s, slug, guide.as_ref(), now)
            })
            .await;
        let flagged = next.is_series_flagged(slug);
        info!(slug, flagged, cascaded = guide.is_some(), "Series toggled");
        Ok(flagged)
    }

    /// Flip one episode of a resolved series. Returns whether it is now watched.
    pub async fn toggle_episode(
        &self,
        slug: &str,
        season: u32,
        episode: u32,
    ) -> Result<bool, TrackerError> {
        let guide = self.episode_guide(slug).await?;
        if !guide.contains(season, episode) {
            return Err(TrackerError::UnknownEpisode {
                slug: slug.into(),
                season,
                episode,
            });
        }
        let total = guide.total_episodes();

        let ep = EpisodeRef::new(guide.external_id, season, episode);
        let now = now_ms();
        let next = self
            .commit("toggle_episode", |s| {
                cascade::toggle_episode(s, slug, ep, total, now)
            })
            .await;
        let watched = next.watched.contains(&ep.key());
        debug!(slug, season, episode, watched, "Episode toggled");
        Ok(watched)
    }

    /// Set every episode of a resolved series, and its flag, to `watched`.
    pub async fn mark_all(&self, slug: &str, watched: bool) -> Result<u32, TrackerError> {
        let guide = self.episode_guide(slug).await?;
        let now = now_ms();
        self.commit("mark_all", |s| {
            cascade::mark_all_episodes(s, slug, &guide, watched, now)
        })
        .await;
        let count = guide.total_episodes();
        info!(slug, watched, episodes = count, "Marked all episodes");
        Ok(count)
    }

    /// Replace the state with a validated snapshot.
    pub async fn import(&self, text: &str) -> Result<CanonicalState, TrackerError> {
        let imported = store::parse_snapshot(text)?;
        let next = self
            .commit("import", |s| reduce(s, Action::Hydrate(imported)))
            .await;
        info!(keys = next.watched.len(), "Snapshot imported");
        Ok(next)
    }

    pub async fn export(&self) -> Result<String, TrackerError> {
        Ok(store::export_snapshot(&self.inner.read().await.state)?)
    }

    /// Clear all progress and delete the stored record. Undoable.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        let prev = std::mem::take(&mut inner.state);
        if !prev.is_empty() {
            inner.history.push("reset", prev);
        }
        inner.store.reset();
    }

    /// Restore the state before the most recent action. Returns that action.
    pub async fn undo(&self) -> Result<&'static str, TrackerError> {
        let mut inner = self.inner.write().await;
        let entry = inner.history.pop().ok_or(TrackerError::NothingToUndo)?;
        inner.store.save(&entry.state);
        inner.state = entry.state;
        info!(action = entry.action, "Undid action");
        Ok(entry.action)
    }

    // ── Metadata ────────────────────────────────────────────────

    /// Episode guide of a resolved series, from cache or the network.
    pub async fn episode_guide(&self, slug: &str) -> Result<EpisodeGuide, TrackerError> {
        self.series_entry(slug)?;
        let meta = self.resolved_meta(slug).await?;
        if let Some(guide) = self.guides.read().await.get(&meta.external_id) {
            return Ok(guide.clone());
        }
        let _guard = self.begin_lookup(slug)?;
        self.fetch_series(slug, meta.external_id).await
    }

    /// Look a title up and fold the result into the state.
    pub async fn resolve(&self, slug: &str) -> Result<Resolution, TrackerError> {
        let entry = self.entry(slug)?;
        match entry.kind {
            MediaKind::Movie => self.resolve_movie(slug).await.map(Resolution::Movie),
            MediaKind::Series => self.resolve_series(slug).await.map(Resolution::Series),
        }
    }

    pub async fn resolve_series(&self, slug: &str) -> Result<SeriesMeta, TrackerError> {
        let entry = self.series_entry(slug)?;
        let query = ResolveQuery::for_entry(entry)?;
        let _guard = self.begin_lookup(slug)?;

        let known = self.known_id(slug, MediaKind::Series).await;
        let external_id = match known {
            Some(id) => id,
            None => self.service.resolve(&query).await?.external_id,
        };
        self.fetch_series(slug, external_id).await?;
        self.resolved_meta(slug).await
    }

    pub async fn resolve_movie(&self, slug: &str) -> Result<MovieMeta, TrackerError> {
        let entry = self.entry(slug)?;
        if !entry.is_movie() {
            return Err(TrackerError::NotAMovie(slug.into()));
        }
        let query = ResolveQuery::for_entry(entry)?;
        let _guard = self.begin_lookup(slug)?;

        let external_id = match self.known_id(slug, MediaKind::Movie).await {
            Some(id) => id,
            None => self.service.resolve(&query).await?.external_id,
        };
        let meta = self
            .service
            .fetch_movie(external_id)
            .await?
            .into_meta(now_ms());
        self.commit("resolve_movie", |s| {
            cascade::apply_movie_details(s, slug, meta.clone())
        })
        .await;
        info!(slug, id = external_id, runtime = meta.runtime_minutes, "Movie resolved");
        Ok(meta)
    }

    /// Resolve every title that has no metadata yet.
    pub async fn prefetch(&self) -> BatchReport {
        let state = self.state().await;
        let pending: Vec<String> = self
            .catalog
            .iter()
            .filter(|e| match e.kind {
                MediaKind::Movie => !state.movie_meta.contains_key(&e.id),
                MediaKind::Series => !state.series_meta.contains_key(&e.id),
            })
            .map(|e| e.id.clone())
            .collect();
        debug!(titles = pending.len(), "Prefetching metadata");

        let results: Vec<(String, Result<Resolution, TrackerError>)> = stream::iter(pending)
            .map(|slug| async move {
                let result = self.resolve(&slug).await;
                (slug, result)
            })
            .buffer_unordered(PREFETCH_CONCURRENCY)
            .collect()
            .await;
        Self::report(results)
    }

    /// Look up again every series whose cached meta has gone stale.
    pub async fn refresh_stale(&self) -> BatchReport {
        let state = self.state().await;
        let stale: Vec<String> =
            progress::stale_series(&state, Utc::now(), self.settings.stale_after)
                .into_iter()
                .filter(|slug| self.catalog.is_series(slug))
                .map(str::to_string)
                .collect();
        info!(series = stale.len(), "Refreshing stale series");

        let results = futures::future::join_all(stale.into_iter().map(|slug| async move {
            let result = self.resolve_series(&slug).await.map(Resolution::Series);
            (slug, result)
        }))
        .await;
        Self::report(results)
    }

    // ── Internals ───────────────────────────────────────────────

    /// Compute and persist the next state under the write lock. Unchanged
    /// states are neither saved nor recorded for undo.
    async fn commit(
        &self,
        action: &'static str,
        f: impl FnOnce(&CanonicalState) -> CanonicalState,
    ) -> CanonicalState {
        let mut inner = self.inner.write().await;
        let next = f(&inner.state);
        if next != inner.state {
            let prev = std::mem::replace(&mut inner.state, next.clone());
            inner.history.push(action, prev);
            inner.store.save(&next);
            debug!(action, "State committed");
        }
        next
    }

    /// Fetch a guide, cache it and fold it into the state current at
    /// completion. The caller holds the lookup guard.
    async fn fetch_series(
        &self,
        slug: &str,
        external_id: u64,
    ) -> Result<EpisodeGuide, TrackerError> {
        let guide = self.service.fetch_series(external_id).await?;
        self.guides
            .write()
            .await
            .insert(external_id, guide.clone());

        let now = now_ms();
        self.commit("resolve_series", |s| {
            cascade::apply_resolution(s, slug, &guide, now)
        })
        .await;
        info!(
            slug,
            id = external_id,
            episodes = guide.total_episodes(),
            runtime = guide.total_runtime_minutes(),
            "Series resolved"
        );
        Ok(guide)
    }

    fn begin_lookup(&self, slug: &str) -> Result<LookupGuard<'_>, TrackerError> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| TrackerError::InFlight(slug.into()))?;
        if !set.insert(slug.to_string()) {
            debug!(slug, "Lookup already in flight");
            return Err(TrackerError::InFlight(slug.into()));
        }
        Ok(LookupGuard {
            set: &self.in_flight,
            slug: slug.to_string(),
        })
    }

    async fn known_id(&self, slug: &str, kind: MediaKind) -> Option<u64> {
        let inner = self.inner.read().await;
        let id = match kind {
            MediaKind::Movie => inner.state.movie_meta.get(slug).map(|m| m.external_id),
            MediaKind::Series => inner.state.series_meta.get(slug).map(|m| m.external_id),
        };
        id.filter(|id| *id > 0)
    }

    async fn resolved_meta(&self, slug: &str) -> Result<SeriesMeta, TrackerError> {
        self.inner
            .read()
            .await
            .state
            .series_meta
            .get(slug)
            .filter(|m| m.external_id > 0)
            .cloned()
            .ok_or_else(|| TrackerError::Unresolved(slug.into()))
    }

    fn entry(&self, slug: &str) -> Result<&CatalogEntry, TrackerError> {
        self.catalog
            .get(slug)
            .ok_or_else(|| TrackerError::UnknownTitle(slug.into()))
    }

    fn series_entry(&self, slug: &str) -> Result<&CatalogEntry, TrackerError> {
        let entry = self.entry(slug)?;
        if entry.is_series() {
            Ok(entry)
        } else {
            Err(TrackerError::NotASeries(slug.into()))
        }
    }

    fn report(results: Vec<(String, Result<Resolution, TrackerError>)>) -> BatchReport {
        let mut report = BatchReport::default();
        for (slug, result) in results {
            match result {
                Ok(_) => report.resolved.push(slug),
                Err(e) => {
                    warn!(slug = %slug, error = %e, "Lookup failed");
                    report.failed.push((slug, e));
                }
            }
        }
        report
    }
}
