use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use prometheus::{IntCounterVec, Opts};
use tracing::warn;

use waypoint_bus::MessageBus;
use waypoint_cache::DomainCache;
use waypoint_common::context::HierarchicalContext;
use waypoint_model::plan::ExecutionPlan;
use waypoint_model::ActivityExecuted;

use crate::dispatcher::Dispatcher;

/// Counter pair named in §2/§10.4: events consumed off the bus vs. successor
/// commands dispatched in response. A process-wide running difference is kept
/// alongside the counters so sustained drift (a stuck consumer, a broker
/// redelivering without the corresponding dispatch ever landing) can be
/// flagged without standing up a separate alerting pipeline.
pub struct TraversalMetrics {
    pub events_consumed: IntCounterVec,
    pub successors_dispatched: IntCounterVec,
    drift: AtomicI64,
}

impl TraversalMetrics {
    pub fn register(registry: &prometheus::Registry) -> Self {
        let events_consumed = IntCounterVec::new(
            Opts::new("waypoint_traversal_events_consumed_total", "Activity completion events consumed, by flow"),
            &["flow_id"],
        )
        .expect("metric options are valid");
        registry.register(Box::new(events_consumed.clone())).expect("metric registers once");

        let successors_dispatched = IntCounterVec::new(
            Opts::new("waypoint_traversal_successors_dispatched_total", "Successor commands dispatched per completion event, by flow"),
            &["flow_id"],
        )
        .expect("metric options are valid");
        registry.register(Box::new(successors_dispatched.clone())).expect("metric registers once");

        Self {
            events_consumed,
            successors_dispatched,
            drift: AtomicI64::new(0),
        }
    }

    /// Every consumed event nudges the running drift down by one, every
    /// dispatched successor nudges it up by one; a flow whose steps are
    /// mostly fan-out keeps this comfortably positive, one that is mostly
    /// terminal keeps it comfortably negative. What matters is that it stays
    /// bounded — unbounded growth in either direction means dispatch and
    /// consumption have come permanently unglued.
    fn record(&self, flow_id: uuid::Uuid, dispatched: usize) {
        let flow_label = flow_id.to_string();
        self.events_consumed.with_label_values(&[&flow_label]).inc();
        self.successors_dispatched
            .with_label_values(&[&flow_label])
            .inc_by(dispatched as u64);

        let updated = self.drift.fetch_add(dispatched as i64 - 1, Ordering::Relaxed) + dispatched as i64 - 1;
        if updated.unsigned_abs() > ANOMALY_THRESHOLD {
            warn!(
                %flow_id,
                drift = updated,
                threshold = ANOMALY_THRESHOLD,
                "consume/publish drift exceeded anomaly threshold"
            );
        }
    }
}

const ANOMALY_THRESHOLD: u64 = 10_000;

/// Consumes completion events and re-enters the [`Dispatcher`] for whichever
/// successors pass their entry condition (§4.7). Stateless beyond the plan
/// read: no workflow-instance object is kept anywhere.
pub struct TraversalEngine {
    bus: Arc<dyn MessageBus>,
    cache: Arc<DomainCache>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<TraversalMetrics>,
}

impl TraversalEngine {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        cache: Arc<DomainCache>,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<TraversalMetrics>,
    ) -> Self {
        Self {
            bus,
            cache,
            dispatcher,
            metrics,
        }
    }

    /// Runs until the underlying bus stream ends (process shutdown). Events
    /// with no corresponding cached plan are dropped with a warning, never
    /// retried — the plan builder, not this loop, is responsible for staging.
    pub async fn run(&self) -> Result<(), waypoint_bus::BusError> {
        let mut events = self.bus.consume_completions().await?;
        while let Some(event) = events.next().await {
            self.handle_event(event).await;
        }
        Ok(())
    }

    /// Processes a single completion event. `run` is the long-lived consumer
    /// loop; this is exposed directly so tests can drive the traversal logic
    /// without standing up a bus.
    pub async fn handle_event(&self, event: ActivityExecuted) {
        let ctx = HierarchicalContext::root(event.flow_id)
            .with_workflow(event.workflow_id)
            .with_correlation(event.correlation_id)
            .with_step(event.step_id);

        let plan = match self.load_plan(event.flow_id, &ctx).await {
            Some(plan) => plan,
            None => {
                warn!(correlation_id = ?ctx.correlation_id, flow_id = %event.flow_id, "plan not found for traversal event, dropping");
                self.metrics.record(event.flow_id, 0);
                return;
            }
        };

        let dispatched = self
            .dispatcher
            .dispatch_successors(&plan, event.step_id, event.outcome, &ctx)
            .await;
        self.metrics.record(event.flow_id, dispatched);
    }

    async fn load_plan(&self, flow_id: uuid::Uuid, ctx: &HierarchicalContext) -> Option<ExecutionPlan> {
        let raw = self.cache.get_plan(&flow_id.to_string(), ctx).await.ok()??;
        serde_json::from_str(&raw).ok()
    }
}
