use thiserror::Error;

/// Errors from the metadata proxy client.
///
/// None of these should ever reach the persisted state: a failed lookup
/// leaves the tracker exactly as it was.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("no match found: {0}")]
    NotFound(String),

    #[error("metadata provider rejected our credentials: {0}")]
    Auth(String),

    #[error("rate limited by metadata provider")]
    RateLimited,

    #[error("metadata service unavailable (status {status}): {message}")]
    Unavailable { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl MetadataError {
    /// Whether the same request could succeed later without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited => true,
            Self::Unavailable { status, .. } => *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::InvalidQuery(_)
            | Self::NotFound(_)
            | Self::Auth(_)
            | Self::Parse(_)
            | Self::InvalidResponse(_) => false,
        }
    }

    /// Short text suitable for showing to the person using the tracker.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidQuery(reason) => format!("Can't look this title up: {reason}."),
            Self::NotFound(_) => "No match found for this title.".into(),
            Self::Auth(_) => {
                "The metadata service is misconfigured (authentication failed).".into()
            }
            Self::RateLimited => "Too many requests. Try again in a moment.".into(),
            Self::Unavailable { .. } | Self::Http(_) => {
                "The metadata service is unreachable right now.".into()
            }
            Self::Parse(_) | Self::InvalidResponse(_) => {
                "The metadata service sent data we couldn't read.".into()
            }
        }
    }
}
