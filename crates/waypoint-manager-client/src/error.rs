use waypoint_common::{ErrorKind, HasErrorKind, SafeDisplay};

#[derive(thiserror::Error, Debug)]
pub enum ManagerClientError {
    #[error("entity not found")]
    NotFound,
    #[error("transport error calling {manager}: {source}")]
    Transport {
        manager: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{manager} returned a body that could not be decoded: {source}")]
    Decode {
        manager: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl HasErrorKind for ManagerClientError {
    fn kind(&self) -> ErrorKind {
        match self {
            ManagerClientError::NotFound => ErrorKind::NotFound,
            ManagerClientError::Transport { .. } | ManagerClientError::Decode { .. } => {
                ErrorKind::DownstreamUnavailable
            }
        }
    }
}

impl SafeDisplay for ManagerClientError {
    fn to_safe_string(&self) -> String {
        match self {
            ManagerClientError::NotFound => "the requested entity does not exist".to_string(),
            ManagerClientError::Transport { manager, .. }
            | ManagerClientError::Decode { manager, .. } => {
                format!("the {manager} manager is currently unavailable")
            }
        }
    }
}

impl ManagerClientError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, ManagerClientError::Transport { .. })
    }
}
