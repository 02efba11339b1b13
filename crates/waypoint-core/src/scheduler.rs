use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cron::Schedule;
use prometheus::{IntCounterVec, Opts};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use waypoint_cache::DomainCache;
use waypoint_common::context::HierarchicalContext;
use waypoint_model::plan::ExecutionPlan;

use crate::dispatcher::Dispatcher;
use crate::error::SchedulerError;
use crate::health_gate::HealthGate;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Floor on how often the scheduler re-checks a job's fire time; cron
    /// resolution itself is still whatever the expression specifies.
    #[serde(with = "humantime_serde")]
    pub tick_granularity: std::time::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_granularity: std::time::Duration::from_secs(1),
        }
    }
}

pub struct SchedulerMetrics {
    pub fires: IntCounterVec,
}

impl SchedulerMetrics {
    pub fn register(registry: &prometheus::Registry) -> Self {
        let fires = IntCounterVec::new(
            Opts::new("waypoint_scheduler_fires_total", "Scheduler fire outcomes, by result"),
            &["flow_id", "result"],
        )
        .expect("metric options are valid");
        registry.register(Box::new(fires.clone())).expect("metric registers once");
        Self { fires }
    }
}

struct SchedulerBinding {
    cron_expression: String,
    original_correlation_id: Uuid,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Owns at most one active cron job per flow id (§4.5, §9's "per-flow singleton
/// scheduler" pattern), implemented as a process-local mutex-guarded map of
/// spawned tasks rather than annotations on a shared scheduling framework.
pub struct Scheduler {
    bindings: Mutex<HashMap<Uuid, SchedulerBinding>>,
    cache: Arc<DomainCache>,
    health_gate: Arc<HealthGate>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<SchedulerMetrics>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        cache: Arc<DomainCache>,
        health_gate: Arc<HealthGate>,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<SchedulerMetrics>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            bindings: Mutex::new(HashMap::new()),
            cache,
            health_gate,
            dispatcher,
            metrics,
            config,
        })
    }

    pub async fn start_scheduler(
        self: &Arc<Self>,
        flow_id: Uuid,
        cron_expression: String,
        ctx: &HierarchicalContext,
    ) -> Result<DateTime<Utc>, SchedulerError> {
        let schedule = Schedule::from_str(&cron_expression)
            .map_err(|_| SchedulerError::InvalidCron(cron_expression.clone()))?;

        let mut bindings = self.bindings.lock().await;
        if bindings.contains_key(&flow_id) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let next_fire = schedule
            .upcoming(Utc)
            .next()
            .ok_or_else(|| SchedulerError::InvalidCron(cron_expression.clone()))?;

        let original_correlation_id = ctx.correlation_id_or_mint();
        let running = Arc::new(AtomicBool::new(false));

        let handle = self.clone().spawn_job(
            flow_id,
            schedule,
            original_correlation_id,
            running.clone(),
        );

        bindings.insert(
            flow_id,
            SchedulerBinding {
                cron_expression,
                original_correlation_id,
                running,
                handle,
            },
        );

        info!(correlation_id = ?ctx.correlation_id, %flow_id, %next_fire, "scheduler started");
        Ok(next_fire)
    }

    pub async fn stop_scheduler(&self, flow_id: Uuid, ctx: &HierarchicalContext) -> Result<(), SchedulerError> {
        let mut bindings = self.bindings.lock().await;
        match bindings.remove(&flow_id) {
            Some(binding) => {
                binding.handle.abort();
                info!(correlation_id = ?ctx.correlation_id, %flow_id, "scheduler stopped");
                Ok(())
            }
            None => Err(SchedulerError::NotFound),
        }
    }

    pub async fn next_fire_time(&self, flow_id: Uuid) -> Option<DateTime<Utc>> {
        let bindings = self.bindings.lock().await;
        let binding = bindings.get(&flow_id)?;
        let schedule = Schedule::from_str(&binding.cron_expression).ok()?;
        schedule.upcoming(Utc).next()
    }

    fn spawn_job(
        self: Arc<Self>,
        flow_id: Uuid,
        schedule: Schedule,
        original_correlation_id: Uuid,
        running: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut upcoming = schedule.upcoming(Utc);
            loop {
                let Some(next_fire) = upcoming.next() else {
                    break;
                };
                let now = Utc::now();
                if next_fire > now {
                    let delay = (next_fire - now).to_std().unwrap_or_default();
                    tokio::time::sleep(delay).await;
                }

                if running.swap(true, Ordering::AcqRel) {
                    warn!(%flow_id, "previous fire still running, skipping this tick");
                    continue;
                }

                let fire_ctx = HierarchicalContext::root(flow_id).with_correlation(original_correlation_id);
                let one_shot_completed = self.fire(flow_id, &fire_ctx).await;
                running.store(false, Ordering::Release);

                if one_shot_completed {
                    let mut bindings = self.bindings.lock().await;
                    if bindings.remove(&flow_id).is_some() {
                        info!(%flow_id, "one-shot flow completed, scheduler self-stopped");
                    }
                    break;
                }
            }
        })
    }

    /// Runs a single fire. Returns `true` when the flow is one-shot and this
    /// fire succeeded, signalling the caller to self-stop the schedule.
    async fn fire(&self, flow_id: Uuid, ctx: &HierarchicalContext) -> bool {
        let plan = match self.load_plan(flow_id, ctx).await {
            Some(plan) => plan,
            None => {
                warn!(correlation_id = ?ctx.correlation_id, %flow_id, "Orchestration data not found");
                self.metrics.fires.with_label_values(&[&flow_id.to_string(), "missing_plan"]).inc();
                return false;
            }
        };

        match self.health_gate.gate(&plan.processor_ids, ctx).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(correlation_id = ?ctx.correlation_id, %flow_id, "Processor health validation failed");
                self.metrics.fires.with_label_values(&[&flow_id.to_string(), "gate_failed"]).inc();
                return false;
            }
            Err(error) => {
                error!(correlation_id = ?ctx.correlation_id, %flow_id, error = ?error, "health gate lookup failed");
                self.metrics.fires.with_label_values(&[&flow_id.to_string(), "gate_error"]).inc();
                return false;
            }
        }

        match self.dispatcher.dispatch_entry_points(&plan, ctx).await {
            Ok(()) => {
                self.metrics.fires.with_label_values(&[&flow_id.to_string(), "success"]).inc();
                plan.is_one_time_execution
            }
            Err(error) => {
                error!(correlation_id = ?ctx.correlation_id, %flow_id, error = ?error, "dispatch failed for scheduled fire");
                self.metrics.fires.with_label_values(&[&flow_id.to_string(), "dispatch_failed"]).inc();
                false
            }
        }
    }

    async fn load_plan(&self, flow_id: Uuid, ctx: &HierarchicalContext) -> Option<ExecutionPlan> {
        let raw = self.cache.get_plan(&flow_id.to_string(), ctx).await.ok()??;
        serde_json::from_str(&raw).ok()
    }
}
