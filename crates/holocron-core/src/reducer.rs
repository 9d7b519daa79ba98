//! Pure state transitions.
//!
//! [`reduce`] is the only way the canonical state changes. It borrows the
//! prior state and returns a new one; composite behaviour such as cascading a
//! series toggle to its episodes lives in [`crate::cascade`].

use crate::models::{CanonicalState, MovieMeta, SeriesMeta};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Flip presence of one key.
    ToggleWatched(String),
    /// Set presence of one key explicitly.
    SetWatched { key: String, checked: bool },
    /// Set presence of many keys in one transition.
    BulkSetEpisodes { keys: Vec<String>, checked: bool },
    UpdateMovieMeta { slug: String, meta: MovieMeta },
    UpdateSeriesMeta { slug: String, meta: SeriesMeta },
    /// Replace the whole state (after load or import).
    Hydrate(CanonicalState),
    Reset,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToggleWatched(_) => "toggle_watched",
            Self::SetWatched { .. } => "set_watched",
            Self::BulkSetEpisodes { .. } => "bulk_set_episodes",
            Self::UpdateMovieMeta { .. } => "update_movie_meta",
            Self::UpdateSeriesMeta { .. } => "update_series_meta",
            Self::Hydrate(_) => "hydrate",
            Self::Reset => "reset",
        }
    }
}

pub fn reduce(state: &CanonicalState, action: Action) -> CanonicalState {
    tracing::trace!(action = action.name(), "reduce");
    match action {
        Action::ToggleWatched(key) => modified(state, |next| {
            next.watched.toggle(&key);
        }),
        Action::SetWatched { key, checked } => modified(state, |next| {
            next.watched.set(&key, checked);
        }),
        Action::BulkSetEpisodes { keys, checked } => modified(state, |next| {
            for key in &keys {
                next.watched.set(key, checked);
            }
        }),
        Action::UpdateMovieMeta { slug, meta } => modified(state, |next| {
            next.movie_meta.insert(slug, meta);
        }),
        Action::UpdateSeriesMeta { slug, meta } => modified(state, |next| {
            next.series_meta.insert(slug, meta);
        }),
        Action::Hydrate(next) => next,
        Action::Reset => CanonicalState::empty(),
    }
}

fn modified(state: &CanonicalState, edit: impl FnOnce(&mut CanonicalState)) -> CanonicalState {
    let mut next = state.clone();
    edit(&mut next);
    next
}
