use chrono::{DateTime, Utc};
use poem_openapi::Object;
use uuid::Uuid;

#[derive(Object, Debug, Clone)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Object, Debug, Clone)]
pub struct StartResponse {
    pub message: String,
    pub flow_id: Uuid,
    pub started_at: DateTime<Utc>,
}

#[derive(Object, Debug, Clone)]
pub struct StopResponse {
    pub message: String,
    pub flow_id: Uuid,
    pub stopped_at: DateTime<Utc>,
}

#[derive(Object, Debug, Clone)]
pub struct StatusResponse {
    pub is_active: bool,
    pub step_count: usize,
    pub assignment_count: usize,
    pub entry_point_count: usize,
    pub processor_count: usize,
}

#[derive(Object, Debug, Clone)]
pub struct ProcessorHealthResponse {
    pub processor_id: Uuid,
    pub status: String,
    pub last_report_at: DateTime<Utc>,
    pub details: String,
}

#[derive(Object, Debug, Clone)]
pub struct ProcessorHealthItemResponse {
    pub processor_id: Uuid,
    pub status: Option<String>,
    pub stale: bool,
}

#[derive(Object, Debug, Clone)]
pub struct ProcessorsHealthResponse {
    pub summary: String,
    pub items: Vec<ProcessorHealthItemResponse>,
}

#[derive(Object, Debug, Clone)]
pub struct SchedulerStartRequest {
    pub cron_expression: String,
}

#[derive(Object, Debug, Clone)]
pub struct SchedulerStartResponse {
    pub cron_expression: String,
    pub next_execution: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
}

#[derive(Object, Debug, Clone)]
pub struct SchedulerStopResponse {
    pub stopped_at: DateTime<Utc>,
}
