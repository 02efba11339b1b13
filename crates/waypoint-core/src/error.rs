use waypoint_bus::BusError;
use waypoint_cache::CacheError;
use waypoint_common::{ErrorKind, HasErrorKind, SafeDisplay};
use waypoint_manager_client::ManagerClientError;

#[derive(thiserror::Error, Debug)]
pub enum PlanBuilderError {
    #[error("flow not found")]
    FlowNotFound,
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("plan failed its own invariants: {0}")]
    Invalid(#[from] waypoint_model::plan::PlanValidationError),
    #[error("manager call failed while building the plan: {0}")]
    Downstream(#[from] ManagerClientError),
}

impl HasErrorKind for PlanBuilderError {
    fn kind(&self) -> ErrorKind {
        match self {
            PlanBuilderError::FlowNotFound => ErrorKind::NotFound,
            PlanBuilderError::Cache(_) => ErrorKind::CacheUnavailable,
            PlanBuilderError::Invalid(_) => ErrorKind::Internal,
            PlanBuilderError::Downstream(error) => error.kind(),
        }
    }
}

impl SafeDisplay for PlanBuilderError {
    fn to_safe_string(&self) -> String {
        match self {
            PlanBuilderError::FlowNotFound => "the requested flow does not exist".to_string(),
            PlanBuilderError::Cache(_) => "the orchestrator's cache is currently unavailable".to_string(),
            PlanBuilderError::Invalid(_) => "the assembled plan failed validation".to_string(),
            PlanBuilderError::Downstream(error) => error.to_safe_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HealthGateError {
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl HasErrorKind for HealthGateError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::CacheUnavailable
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SchedulerError {
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
    #[error("a schedule already exists for this flow")]
    AlreadyRunning,
    #[error("no schedule exists for this flow")]
    NotFound,
}

impl HasErrorKind for SchedulerError {
    fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::InvalidCron(_) => ErrorKind::InvalidArgument,
            SchedulerError::AlreadyRunning => ErrorKind::AlreadyRunning,
            SchedulerError::NotFound => ErrorKind::NotFound,
        }
    }
}

impl SafeDisplay for SchedulerError {
    fn to_safe_string(&self) -> String {
        match self {
            SchedulerError::InvalidCron(expr) => format!("'{expr}' is not a valid cron expression"),
            SchedulerError::AlreadyRunning => "a schedule is already running for this flow".to_string(),
            SchedulerError::NotFound => "no schedule exists for this flow".to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl HasErrorKind for DispatchError {
    fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Bus(_) => ErrorKind::BusUnavailable,
            DispatchError::Cache(_) => ErrorKind::CacheUnavailable,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TraversalError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl HasErrorKind for TraversalError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

pub use ManagerClientError as DownstreamError;
