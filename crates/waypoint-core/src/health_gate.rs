use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use waypoint_cache::DomainCache;
use waypoint_common::context::HierarchicalContext;
use waypoint_model::health::{HealthStatus, ProcessorHealthSnapshot};

use crate::error::HealthGateError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthGateConfig {
    #[serde(with = "humantime_serde")]
    pub staleness_threshold: std::time::Duration,
}

impl Default for HealthGateConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: std::time::Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanHealthReport {
    pub summary: String,
    pub items: Vec<ProcessorHealthItem>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorHealthItem {
    pub processor_id: Uuid,
    pub status: Option<HealthStatus>,
    pub stale: bool,
}

/// Answers "may this flow dispatch right now" by checking every processor the
/// plan references against its last reported health snapshot (§4.4).
pub struct HealthGate {
    cache: Arc<DomainCache>,
    config: HealthGateConfig,
}

impl HealthGate {
    pub fn new(cache: Arc<DomainCache>, config: HealthGateConfig) -> Self {
        Self { cache, config }
    }

    pub async fn get_processor_health(
        &self,
        processor_id: Uuid,
        ctx: &HierarchicalContext,
    ) -> Result<Option<ProcessorHealthSnapshot>, HealthGateError> {
        let raw = self.cache.get_health(&processor_id.to_string(), ctx).await?;
        Ok(raw.and_then(|text| serde_json::from_str(&text).ok()))
    }

    /// Single cache lookup per processor, no retries (§4.4). Returns `true` only
    /// if every processor id has a `Healthy` snapshot that is not stale.
    pub async fn gate(&self, processor_ids: &BTreeSet<Uuid>, ctx: &HierarchicalContext) -> Result<bool, HealthGateError> {
        for &processor_id in processor_ids {
            let snapshot = self.get_processor_health(processor_id, ctx).await?;
            match snapshot {
                Some(snapshot) if snapshot.is_usable() && !self.is_stale(&snapshot) => continue,
                Some(snapshot) => {
                    warn!(
                        correlation_id = ?ctx.correlation_id,
                        %processor_id,
                        status = ?snapshot.status,
                        "Processor health validation failed"
                    );
                    return Ok(false);
                }
                None => {
                    warn!(correlation_id = ?ctx.correlation_id, %processor_id, "Processor health validation failed: no snapshot");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    pub async fn plan_health(
        &self,
        processor_ids: &BTreeSet<Uuid>,
        ctx: &HierarchicalContext,
    ) -> Result<PlanHealthReport, HealthGateError> {
        let mut items = Vec::with_capacity(processor_ids.len());
        let mut all_healthy = true;

        for &processor_id in processor_ids {
            let snapshot = self.get_processor_health(processor_id, ctx).await?;
            let stale = snapshot.as_ref().map(|s| self.is_stale(s)).unwrap_or(false);
            let status = snapshot.map(|s| s.status);
            if !matches!(status, Some(HealthStatus::Healthy)) || stale {
                all_healthy = false;
            }
            items.push(ProcessorHealthItem {
                processor_id,
                status,
                stale,
            });
        }

        Ok(PlanHealthReport {
            summary: if all_healthy { "healthy".to_string() } else { "degraded".to_string() },
            items,
        })
    }

    fn is_stale(&self, snapshot: &ProcessorHealthSnapshot) -> bool {
        let age = Utc::now().signed_duration_since(snapshot.last_report_at);
        match age.to_std() {
            Ok(age) => age > self.config.staleness_threshold,
            Err(_) => false,
        }
    }
}
