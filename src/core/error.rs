use thiserror::Error;

/// Errors that cross component boundaries.
///
/// Transport-level conditions (timeouts, 304, rate limiting) are handled
/// inside the fetcher and never surface here; insufficient data for a metric
/// is a distinguished success value, not an error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("monitor {0} not found")]
    MonitorNotFound(uuid::Uuid),

    #[error("event store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("event store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
