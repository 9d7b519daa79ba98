mod meta;
mod state;

pub use meta::{MovieMeta, SeriesMeta, MAX_PLAUSIBLE_RUNTIME};
pub use state::{CanonicalState, WatchedSet};
