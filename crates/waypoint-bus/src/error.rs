use waypoint_common::{ErrorKind, HasErrorKind, SafeDisplay};

#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("bus unavailable: {0}")]
    Unavailable(#[from] fred::error::Error),
    #[error("failed to encode message for publish: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode an inbound message, dropping it: {0}")]
    Decode(#[source] serde_json::Error),
}

impl HasErrorKind for BusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::BusUnavailable
    }
}

impl SafeDisplay for BusError {
    fn to_safe_string(&self) -> String {
        "the orchestrator's message bus is currently unavailable".to_string()
    }
}
