//! Composite operations that keep series flags, episode keys and
//! [`SeriesMeta`] counts consistent.
//!
//! Each function reads the current counts and then issues reducer actions, so
//! callers only ever see the final state of the whole operation.

use tracing::debug;

use crate::guide::EpisodeGuide;
use crate::keys::{EpisodeRef, WatchKey};
use crate::models::{CanonicalState, MovieMeta, SeriesMeta};
use crate::reducer::{reduce, Action};

/// Flip the series aggregate flag. When the episode guide is known, every
/// episode follows the new flag and the checked count is refreshed.
pub fn toggle_series(
    state: &CanonicalState,
    slug: &str,
    guide: Option<&EpisodeGuide>,
    now_ms: i64,
) -> CanonicalState {
    let flagged = !state.is_series_flagged(slug);
    let next = reduce(state, Action::ToggleWatched(WatchKey::series(slug).into()));

    match guide {
        Some(guide) => {
            let next = reduce(
                &next,
                Action::BulkSetEpisodes {
                    keys: guide.episode_keys(),
                    checked: flagged,
                },
            );
            sync_series_meta(&next, slug, guide.external_id, guide.total_episodes(), now_ms)
        }
        None => next,
    }
}

/// Flip one episode, recount the series and set its aggregate flag iff every
/// known episode is now checked.
pub fn toggle_episode(
    state: &CanonicalState,
    slug: &str,
    episode: EpisodeRef,
    total_episodes: u32,
    now_ms: i64,
) -> CanonicalState {
    let next = reduce(state, Action::ToggleWatched(episode.key()));
    let checked = next.checked_episodes(episode.series_id);
    let complete = total_episodes > 0 && checked == total_episodes;
    debug!(slug, checked, total = total_episodes, complete, "Episode toggled");

    let next = reduce(
        &next,
        Action::SetWatched {
            key: WatchKey::series(slug).into(),
            checked: complete,
        },
    );
    sync_series_meta(&next, slug, episode.series_id, total_episodes, now_ms)
}

/// Set every episode and the aggregate flag to `watched`.
pub fn mark_all_episodes(
    state: &CanonicalState,
    slug: &str,
    guide: &EpisodeGuide,
    watched: bool,
    now_ms: i64,
) -> CanonicalState {
    let next = reduce(
        state,
        Action::BulkSetEpisodes {
            keys: guide.episode_keys(),
            checked: watched,
        },
    );
    let next = reduce(
        &next,
        Action::SetWatched {
            key: WatchKey::series(slug).into(),
            checked: watched,
        },
    );
    sync_series_meta(&next, slug, guide.external_id, guide.total_episodes(), now_ms)
}

/// Fold a freshly fetched episode guide into the state.
///
/// If the aggregate flag is already set but fewer than all episodes are
/// checked, every episode is marked watched: the aggregate decision wins over
/// partial episode data.
pub fn apply_resolution(
    state: &CanonicalState,
    slug: &str,
    guide: &EpisodeGuide,
    now_ms: i64,
) -> CanonicalState {
    let total = guide.total_episodes();
    let checked = state.checked_episodes(guide.external_id);

    let next = if state.is_series_flagged(slug) && checked < total {
        debug!(slug, checked, total, "Series flagged complete, marking all episodes");
        reduce(
            state,
            Action::BulkSetEpisodes {
                keys: guide.episode_keys(),
                checked: true,
            },
        )
    } else {
        state.clone()
    };

    let prior_poster = state
        .series_meta
        .get(slug)
        .and_then(|m| m.poster_ref.clone());
    let meta = SeriesMeta {
        external_id: guide.external_id,
        total_episodes: total,
        checked_episodes: next.checked_episodes(guide.external_id),
        total_runtime_minutes: i64::from(guide.total_runtime_minutes()),
        poster_ref: guide.poster_ref.clone().or(prior_poster),
        fetched_at: now_ms,
    };
    reduce(
        &next,
        Action::UpdateSeriesMeta {
            slug: slug.to_string(),
            meta,
        },
    )
}

/// Cache a resolved movie's metadata.
pub fn apply_movie_details(state: &CanonicalState, slug: &str, meta: MovieMeta) -> CanonicalState {
    reduce(
        state,
        Action::UpdateMovieMeta {
            slug: slug.to_string(),
            meta,
        },
    )
}

/// Rewrite `checked_episodes` from the watched set, keeping the rest of any
/// cached meta.
fn sync_series_meta(
    state: &CanonicalState,
    slug: &str,
    external_id: u64,
    total_episodes: u32,
    now_ms: i64,
) -> CanonicalState {
    let mut meta = state.series_meta.get(slug).cloned().unwrap_or(SeriesMeta {
        fetched_at: now_ms,
        ..Default::default()
    });
    meta.external_id = external_id;
    if total_episodes > 0 {
        meta.total_episodes = total_episodes;
    }
    meta.checked_episodes = state.checked_episodes(external_id);
    reduce(
        state,
        Action::UpdateSeriesMeta {
            slug: slug.to_string(),
            meta,
        },
    )
}
