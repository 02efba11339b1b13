use poem_openapi::payload::Json;
use poem_openapi::ApiResponse;

use waypoint_bus::BusError;
use waypoint_cache::CacheError;
use waypoint_common::TraceErrorKind;
use waypoint_core::{HealthGateError, PlanBuilderError, SchedulerError};
use waypoint_manager_client::ManagerClientError;

use crate::dto::ErrorBody;

#[derive(ApiResponse, Debug, Clone)]
pub enum OrchestrationApiError {
    #[oai(status = 400)]
    BadRequest(Json<ErrorBody>),
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
    #[oai(status = 409)]
    AlreadyRunning(Json<ErrorBody>),
    #[oai(status = 500)]
    InternalError(Json<ErrorBody>),
}

impl TraceErrorKind for OrchestrationApiError {
    fn trace_error_kind(&self) -> &'static str {
        match self {
            OrchestrationApiError::BadRequest(_) => "InvalidArgument",
            OrchestrationApiError::NotFound(_) => "NotFound",
            OrchestrationApiError::AlreadyRunning(_) => "AlreadyRunning",
            OrchestrationApiError::InternalError(_) => "Internal",
        }
    }
}

impl OrchestrationApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        OrchestrationApiError::BadRequest(Json(ErrorBody { error: message.into() }))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        OrchestrationApiError::NotFound(Json(ErrorBody { error: message.into() }))
    }
}

impl From<PlanBuilderError> for OrchestrationApiError {
    fn from(error: PlanBuilderError) -> Self {
        match error {
            PlanBuilderError::FlowNotFound => Self::not_found("flow not found"),
            other => Self::InternalError(Json(ErrorBody {
                error: other.to_string(),
            })),
        }
    }
}

impl From<SchedulerError> for OrchestrationApiError {
    fn from(error: SchedulerError) -> Self {
        match error {
            SchedulerError::InvalidCron(ref expr) => Self::bad_request(format!("invalid cron expression: {expr}")),
            SchedulerError::AlreadyRunning => {
                Self::AlreadyRunning(Json(ErrorBody {
                    error: error.to_string(),
                }))
            }
            SchedulerError::NotFound => Self::not_found(error.to_string()),
        }
    }
}

impl From<HealthGateError> for OrchestrationApiError {
    fn from(error: HealthGateError) -> Self {
        Self::InternalError(Json(ErrorBody {
            error: error.to_string(),
        }))
    }
}

impl From<CacheError> for OrchestrationApiError {
    fn from(error: CacheError) -> Self {
        Self::InternalError(Json(ErrorBody {
            error: error.to_string(),
        }))
    }
}

impl From<BusError> for OrchestrationApiError {
    fn from(error: BusError) -> Self {
        Self::InternalError(Json(ErrorBody {
            error: error.to_string(),
        }))
    }
}

impl From<ManagerClientError> for OrchestrationApiError {
    fn from(error: ManagerClientError) -> Self {
        match error {
            ManagerClientError::NotFound => Self::not_found("entity not found"),
            other => Self::InternalError(Json(ErrorBody {
                error: other.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_not_found_maps_to_404() {
        let error: OrchestrationApiError = PlanBuilderError::FlowNotFound.into();
        assert!(matches!(error, OrchestrationApiError::NotFound(_)));
        assert_eq!(error.trace_error_kind(), "NotFound");
    }

    #[test]
    fn scheduler_already_running_maps_to_409() {
        let error: OrchestrationApiError = SchedulerError::AlreadyRunning.into();
        assert!(matches!(error, OrchestrationApiError::AlreadyRunning(_)));
        assert_eq!(error.trace_error_kind(), "AlreadyRunning");
    }

    #[test]
    fn invalid_cron_maps_to_400() {
        let error: OrchestrationApiError = SchedulerError::InvalidCron("* * *".to_string()).into();
        assert!(matches!(error, OrchestrationApiError::BadRequest(_)));
    }

    #[test]
    fn manager_client_not_found_maps_to_404() {
        let error: OrchestrationApiError = ManagerClientError::NotFound.into();
        assert!(matches!(error, OrchestrationApiError::NotFound(_)));
    }
}
