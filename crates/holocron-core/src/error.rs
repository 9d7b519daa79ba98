use thiserror::Error;

#[derive(Debug, Error)]
pub enum HolocronError {
    #[error("config error: {0}")]
    Config(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors at the durable storage boundary.
///
/// `load`, `save` and `reset` on [`crate::store::Store`] swallow these; only
/// snapshot import surfaces them to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
