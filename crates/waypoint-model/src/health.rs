use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// What a processor last reported about itself. The gate reads these by
/// `processor_id`; a missing snapshot and a stale one are both treated as
/// `Unhealthy` by the caller (§4.4), not represented as a variant here.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorHealthSnapshot {
    pub status: HealthStatus,
    pub last_report_at: DateTime<Utc>,
    #[serde(default)]
    pub details: String,
}

impl ProcessorHealthSnapshot {
    pub fn is_usable(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy)
    }
}
