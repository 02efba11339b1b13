use waypoint_common::{ErrorKind, HasErrorKind, SafeDisplay};

/// Every cache failure collapses to this single kind (§4.1): transport errors,
/// timeouts, and exhausted retries are all `CacheUnavailable` to callers. The
/// underlying `fred` error is kept for logs only.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(#[from] fred::error::Error),
    #[error("value for key {map}:{key} failed to (de)serialize: {source}")]
    Codec {
        map: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl HasErrorKind for CacheError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::CacheUnavailable
    }
}

impl SafeDisplay for CacheError {
    fn to_safe_string(&self) -> String {
        "the orchestrator's cache is currently unavailable".to_string()
    }
}
