use std::sync::Arc;
use std::str::FromStr;

use poem_openapi::param::Path;
use poem_openapi::payload::Json;
use poem_openapi::OpenApi;
use tracing::Instrument;
use uuid::Uuid;

use waypoint_cache::DomainCache;
use waypoint_common::context::HierarchicalContext;
use waypoint_core::{HealthGate, PlanBuilder, Scheduler};
use waypoint_model::plan::ExecutionPlan;

use crate::dto::{
    ProcessorHealthItemResponse, ProcessorHealthResponse, ProcessorsHealthResponse,
    SchedulerStartRequest, SchedulerStartResponse, SchedulerStopResponse, StartResponse,
    StatusResponse, StopResponse,
};
use crate::error::OrchestrationApiError;
use crate::metrics::ApiMetrics;
use crate::recorded_http_api_request;

type Result<T> = std::result::Result<T, OrchestrationApiError>;

pub struct OrchestrationApi {
    plan_builder: Arc<PlanBuilder>,
    cache: Arc<DomainCache>,
    health_gate: Arc<HealthGate>,
    scheduler: Arc<Scheduler>,
    metrics: Arc<ApiMetrics>,
}

impl OrchestrationApi {
    pub fn new(
        plan_builder: Arc<PlanBuilder>,
        cache: Arc<DomainCache>,
        health_gate: Arc<HealthGate>,
        scheduler: Arc<Scheduler>,
        metrics: Arc<ApiMetrics>,
    ) -> Self {
        Self {
            plan_builder,
            cache,
            health_gate,
            scheduler,
            metrics,
        }
    }

    async fn load_plan(&self, flow_id: Uuid, ctx: &HierarchicalContext) -> Result<Option<ExecutionPlan>> {
        let raw = self.cache.get_plan(&flow_id.to_string(), ctx).await?;
        Ok(raw.and_then(|text| serde_json::from_str(&text).ok()))
    }
}

#[OpenApi]
impl OrchestrationApi {
    /// Assembles and stores an execution plan for a flow. Idempotent with
    /// respect to storage: a repeated `Start` overwrites the previous plan.
    #[oai(path = "/orchestration/start/:flow_id", method = "post", operation_id = "start_orchestration")]
    async fn start(&self, flow_id: Path<Uuid>) -> Result<Json<StartResponse>> {
        let ctx = HierarchicalContext::root(flow_id.0).with_correlation(Uuid::new_v4());
        let record = recorded_http_api_request!(&self.metrics, "start", flow_id = flow_id.0.to_string());
        let response = async {
            self.plan_builder.build_and_store(flow_id.0, &ctx).await?;
            Ok(Json(StartResponse {
                message: "flow started".to_string(),
                flow_id: flow_id.0,
                started_at: chrono::Utc::now(),
            }))
        }
        .instrument(record.span.clone())
        .await;
        record.result(response)
    }

    /// Removes the cached plan and stops any active schedule. Best-effort on
    /// both: a `Stop` on a flow with no plan and no schedule still succeeds.
    #[oai(path = "/orchestration/stop/:flow_id", method = "post", operation_id = "stop_orchestration")]
    async fn stop(&self, flow_id: Path<Uuid>) -> Result<Json<StopResponse>> {
        let ctx = HierarchicalContext::root(flow_id.0).with_correlation(Uuid::new_v4());
        let record = recorded_http_api_request!(&self.metrics, "stop", flow_id = flow_id.0.to_string());
        let response = async {
            let _ = self.scheduler.stop_scheduler(flow_id.0, &ctx).await;
            self.cache.remove_plan(&flow_id.0.to_string(), &ctx).await?;
            Ok(Json(StopResponse {
                message: "flow stopped".to_string(),
                flow_id: flow_id.0,
                stopped_at: chrono::Utc::now(),
            }))
        }
        .instrument(record.span.clone())
        .await;
        record.result(response.map_err(OrchestrationApiError::from))
    }

    /// Reports whether a plan is currently cached for the flow and, if so, its
    /// shape. A missing plan is reported as inactive rather than a 404 (the
    /// flow may simply never have been started).
    #[oai(path = "/orchestration/status/:flow_id", method = "get", operation_id = "get_orchestration_status")]
    async fn status(&self, flow_id: Path<Uuid>) -> Result<Json<StatusResponse>> {
        let ctx = HierarchicalContext::root(flow_id.0);
        let record = recorded_http_api_request!(&self.metrics, "status", flow_id = flow_id.0.to_string());
        let response = async {
            let plan = self.load_plan(flow_id.0, &ctx).await?;
            Ok(Json(match plan {
                Some(plan) => StatusResponse {
                    is_active: true,
                    step_count: plan.step_graph.len(),
                    assignment_count: plan.assignments.values().map(|v| v.len()).sum(),
                    entry_point_count: plan.entry_points.len(),
                    processor_count: plan.processor_ids.len(),
                },
                None => StatusResponse {
                    is_active: false,
                    step_count: 0,
                    assignment_count: 0,
                    entry_point_count: 0,
                    processor_count: 0,
                },
            }))
        }
        .instrument(record.span.clone())
        .await;
        record.result(response)
    }

    #[oai(
        path = "/orchestration/processor-health/:processor_id",
        method = "get",
        operation_id = "get_processor_health"
    )]
    async fn processor_health(&self, processor_id: Path<Uuid>) -> Result<Json<ProcessorHealthResponse>> {
        let ctx = HierarchicalContext::root(processor_id.0).with_processor(processor_id.0);
        let record = recorded_http_api_request!(&self.metrics, "processor_health", processor_id = processor_id.0.to_string());
        let response = async {
            let snapshot = self
                .health_gate
                .get_processor_health(processor_id.0, &ctx)
                .await?
                .ok_or_else(|| OrchestrationApiError::not_found("no health snapshot for this processor"))?;

            Ok(Json(ProcessorHealthResponse {
                processor_id: processor_id.0,
                status: format!("{:?}", snapshot.status),
                last_report_at: snapshot.last_report_at,
                details: snapshot.details,
            }))
        }
        .instrument(record.span.clone())
        .await;
        record.result(response)
    }

    #[oai(
        path = "/orchestration/processors-health/:flow_id",
        method = "get",
        operation_id = "get_processors_health"
    )]
    async fn processors_health(&self, flow_id: Path<Uuid>) -> Result<Json<ProcessorsHealthResponse>> {
        let ctx = HierarchicalContext::root(flow_id.0);
        let record = recorded_http_api_request!(&self.metrics, "processors_health", flow_id = flow_id.0.to_string());
        let response = async {
            let plan = self
                .load_plan(flow_id.0, &ctx)
                .await?
                .ok_or_else(|| OrchestrationApiError::not_found("flow not in cache"))?;

            let report = self.health_gate.plan_health(&plan.processor_ids, &ctx).await?;
            Ok(Json(ProcessorsHealthResponse {
                summary: report.summary,
                items: report
                    .items
                    .into_iter()
                    .map(|item| ProcessorHealthItemResponse {
                        processor_id: item.processor_id,
                        status: item.status.map(|s| format!("{s:?}")),
                        stale: item.stale,
                    })
                    .collect(),
            }))
        }
        .instrument(record.span.clone())
        .await;
        record.result(response)
    }

    #[oai(
        path = "/orchestration/scheduler/start/:flow_id",
        method = "post",
        operation_id = "start_scheduler"
    )]
    async fn scheduler_start(
        &self,
        flow_id: Path<Uuid>,
        body: Json<SchedulerStartRequest>,
    ) -> Result<Json<SchedulerStartResponse>> {
        let ctx = HierarchicalContext::root(flow_id.0).with_correlation(Uuid::new_v4());
        let record = recorded_http_api_request!(&self.metrics, "scheduler_start", flow_id = flow_id.0.to_string());
        let response = async {
            if cron::Schedule::from_str(&body.0.cron_expression).is_err() {
                return Err(OrchestrationApiError::bad_request(format!(
                    "'{}' is not a valid cron expression",
                    body.0.cron_expression
                )));
            }

            let next_execution = self
                .scheduler
                .start_scheduler(flow_id.0, body.0.cron_expression.clone(), &ctx)
                .await?;

            Ok(Json(SchedulerStartResponse {
                cron_expression: body.0.cron_expression,
                next_execution,
                started_at: chrono::Utc::now(),
            }))
        }
        .instrument(record.span.clone())
        .await;
        record.result(response)
    }

    #[oai(
        path = "/orchestration/scheduler/stop/:flow_id",
        method = "post",
        operation_id = "stop_scheduler"
    )]
    async fn scheduler_stop(&self, flow_id: Path<Uuid>) -> Result<Json<SchedulerStopResponse>> {
        let ctx = HierarchicalContext::root(flow_id.0).with_correlation(Uuid::new_v4());
        let record = recorded_http_api_request!(&self.metrics, "scheduler_stop", flow_id = flow_id.0.to_string());
        let response = async {
            self.scheduler.stop_scheduler(flow_id.0, &ctx).await?;
            Ok(Json(SchedulerStopResponse {
                stopped_at: chrono::Utc::now(),
            }))
        }
        .instrument(record.span.clone())
        .await;
        record.result(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::test_support::{FakeManagerClient, InMemoryCacheGateway};
    use waypoint_core::{Dispatcher, DispatcherMetrics, HealthGateConfig, SchedulerConfig};
    use waypoint_manager_client::dto::{AssignmentDto, FlowDto, StepDto, WorkflowDto};

    fn build_api() -> (OrchestrationApi, Uuid) {
        let registry = prometheus::Registry::new();
        let cache = Arc::new(DomainCache::new(Arc::new(InMemoryCacheGateway::default())));

        let flow_id = Uuid::new_v4();
        let workflow_id = Uuid::new_v4();
        let step_id = Uuid::new_v4();
        let assignment_id = Uuid::new_v4();

        let mut manager_client = FakeManagerClient::default();
        manager_client.flows.insert(
            flow_id,
            FlowDto {
                id: flow_id,
                version: "v1".to_string(),
                name: "test-flow".to_string(),
                workflow_id,
                is_one_time_execution: false,
                assignment_ids: vec![assignment_id],
            },
        );
        manager_client.workflows.insert(
            workflow_id,
            WorkflowDto {
                id: workflow_id,
                step_ids: vec![step_id],
            },
        );
        manager_client.steps.insert(
            step_id,
            StepDto {
                id: step_id,
                processor_id: Uuid::new_v4(),
                next_step_ids: vec![],
                entry_condition_type: "Always".to_string(),
                assignment_ids: vec![assignment_id],
            },
        );
        manager_client.assignments.insert(
            assignment_id,
            AssignmentDto {
                id: assignment_id,
                entity_ids: vec![],
            },
        );

        let plan_builder = Arc::new(PlanBuilder::new(Arc::new(manager_client), cache.clone()));
        let health_gate = Arc::new(HealthGate::new(cache.clone(), HealthGateConfig::default()));

        let dispatcher_metrics = Arc::new(DispatcherMetrics::register(&registry));
        let (bus, _completion_tx) = waypoint_core::test_support::InMemoryBus::new();
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(bus), dispatcher_metrics));

        let scheduler_metrics = Arc::new(waypoint_core::SchedulerMetrics::register(&registry));
        let scheduler = Scheduler::new(
            cache.clone(),
            health_gate.clone(),
            dispatcher,
            scheduler_metrics,
            SchedulerConfig::default(),
        );

        let api_metrics = Arc::new(ApiMetrics::register(&registry));
        let api = OrchestrationApi::new(plan_builder, cache, health_gate, scheduler, api_metrics);
        (api, flow_id)
    }

    #[tokio::test]
    async fn status_reports_inactive_before_start() {
        let (api, flow_id) = build_api();

        let status = api.status(Path(flow_id)).await.expect("status should not fail");
        assert!(!status.0.is_active);
        assert_eq!(status.0.step_count, 0);
    }

    #[tokio::test]
    async fn start_then_status_reports_the_stored_plan() {
        let (api, flow_id) = build_api();

        api.start(Path(flow_id)).await.expect("start should succeed");

        let status = api.status(Path(flow_id)).await.expect("status should not fail");
        assert!(status.0.is_active);
        assert_eq!(status.0.step_count, 1);
        assert_eq!(status.0.entry_point_count, 1);
    }

    #[tokio::test]
    async fn stop_clears_the_stored_plan() {
        let (api, flow_id) = build_api();
        api.start(Path(flow_id)).await.expect("start should succeed");

        api.stop(Path(flow_id)).await.expect("stop should succeed");

        let status = api.status(Path(flow_id)).await.expect("status should not fail");
        assert!(!status.0.is_active);
    }
}
