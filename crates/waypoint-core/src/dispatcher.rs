use std::sync::Arc;

use futures::future::join_all;
use prometheus::{IntCounterVec, Opts};
use tracing::{error, info};
use uuid::Uuid;

use waypoint_bus::MessageBus;
use waypoint_common::context::HierarchicalContext;
use waypoint_model::commands::ActivityOutcome;
use waypoint_model::plan::{EntryCondition, ExecutionPlan};
use waypoint_model::ExecuteActivityCommand;

use crate::error::DispatchError;

pub struct DispatcherMetrics {
    pub publishes: IntCounterVec,
}

impl DispatcherMetrics {
    pub fn register(registry: &prometheus::Registry) -> Self {
        let publishes = IntCounterVec::new(
            Opts::new("waypoint_dispatcher_publishes_total", "Activity commands published, by outcome"),
            &["flow_id", "outcome"],
        )
        .expect("metric options are valid");
        registry.register(Box::new(publishes.clone())).expect("metric registers once");
        Self { publishes }
    }
}

/// Turns plan steps into published [`ExecuteActivityCommand`]s (§4.6).
pub struct Dispatcher {
    bus: Arc<dyn MessageBus>,
    metrics: Arc<DispatcherMetrics>,
}

impl Dispatcher {
    pub fn new(bus: Arc<dyn MessageBus>, metrics: Arc<DispatcherMetrics>) -> Self {
        Self { bus, metrics }
    }

    /// Fires every entry point concurrently. A single publish failure fails the
    /// whole batch and is re-thrown — the scheduler decides whether to retry
    /// the fire.
    pub async fn dispatch_entry_points(
        &self,
        plan: &ExecutionPlan,
        ctx: &HierarchicalContext,
    ) -> Result<(), DispatchError> {
        let commands = plan.entry_points.iter().map(|&step_id| {
            self.build_command(plan, step_id, Uuid::nil(), ctx)
        });

        let results = join_all(commands.map(|command| self.publish(plan.flow_id, command, ctx))).await;
        for result in results {
            result?;
        }
        Ok(())
    }

    /// Fires the successors of one predecessor step that pass their entry
    /// condition. Per-successor failures are logged and swallowed so that
    /// independent branches are not penalized by one bad publish. Returns the
    /// number of successors actually published, so callers can feed the
    /// consume/publish anomaly counters named in §2.
    pub async fn dispatch_successors(
        &self,
        plan: &ExecutionPlan,
        predecessor_step_id: Uuid,
        outcome: ActivityOutcome,
        ctx: &HierarchicalContext,
    ) -> usize {
        let Some(predecessor) = plan.step_graph.get(&predecessor_step_id) else {
            return 0;
        };

        let mut dispatched = 0;
        for &successor_id in &predecessor.next_step_ids {
            let Some(successor) = plan.step_graph.get(&successor_id) else {
                continue;
            };

            let fires = match successor.entry_condition {
                EntryCondition::PreviousCompleted | EntryCondition::Always => true,
                EntryCondition::PreviousSuccess => matches!(outcome, ActivityOutcome::Success),
                EntryCondition::Unknown => {
                    error!(
                        correlation_id = ?ctx.correlation_id,
                        step_id = %successor_id,
                        "unknown entry condition, refusing to fire"
                    );
                    false
                }
            };

            if !fires {
                continue;
            }

            let execution_ctx = ctx.clone().with_fresh_execution();
            let execution_id = execution_ctx.execution_id.expect("just minted above");
            let command = self.build_command(plan, successor_id, execution_id, &execution_ctx);
            match self.publish(plan.flow_id, command, &execution_ctx).await {
                Ok(()) => dispatched += 1,
                Err(error) => error!(
                    correlation_id = ?ctx.correlation_id,
                    step_id = %successor_id,
                    error = ?error,
                    "traversal dispatch failed for successor, continuing with siblings"
                ),
            }
        }
        dispatched
    }

    fn build_command(
        &self,
        plan: &ExecutionPlan,
        step_id: Uuid,
        execution_id: Uuid,
        ctx: &HierarchicalContext,
    ) -> ExecuteActivityCommand {
        let processor_id = plan
            .step_graph
            .get(&step_id)
            .map(|node| node.processor_id)
            .unwrap_or_default();

        ExecuteActivityCommand {
            flow_id: plan.flow_id,
            workflow_id: plan.workflow_id,
            correlation_id: ctx.correlation_id_or_mint(),
            step_id,
            processor_id,
            publish_id: Uuid::new_v4(),
            execution_id,
            assignments: plan.assignments.get(&step_id).cloned().unwrap_or_default(),
        }
    }

    async fn publish(
        &self,
        flow_id: Uuid,
        command: ExecuteActivityCommand,
        ctx: &HierarchicalContext,
    ) -> Result<(), DispatchError> {
        match self.bus.publish_command(&command, ctx).await {
            Ok(()) => {
                self.metrics.publishes.with_label_values(&[&flow_id.to_string(), "success"]).inc();
                info!(correlation_id = ?ctx.correlation_id, step_id = %command.step_id, "dispatched activity command");
                Ok(())
            }
            Err(error) => {
                self.metrics.publishes.with_label_values(&[&flow_id.to_string(), "failure"]).inc();
                Err(DispatchError::from(error))
            }
        }
    }
}
