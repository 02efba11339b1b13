use prometheus::Registry;

use waypoint_api::ApiMetrics;
use waypoint_cache::CacheMetrics;
use waypoint_core::{DispatcherMetrics, SchedulerMetrics, TraversalMetrics};
use waypoint_manager_client::ManagerClientMetrics;

/// Every component registers its own counters/histograms onto one shared
/// registry (§10.4), exported over HTTP under `/metrics` by the caller.
pub struct OrchestratorMetrics {
    pub registry: Registry,
    pub api: ApiMetrics,
    pub dispatcher: DispatcherMetrics,
    pub scheduler: SchedulerMetrics,
    pub traversal: TraversalMetrics,
    pub cache: CacheMetrics,
    pub manager_client: ManagerClientMetrics,
}

pub fn register_all() -> OrchestratorMetrics {
    let registry = Registry::new();
    let api = ApiMetrics::register(&registry);
    let dispatcher = DispatcherMetrics::register(&registry);
    let scheduler = SchedulerMetrics::register(&registry);
    let traversal = TraversalMetrics::register(&registry);
    let cache = CacheMetrics::register(&registry);
    let manager_client = ManagerClientMetrics::register(&registry);

    OrchestratorMetrics {
        registry,
        api,
        dispatcher,
        scheduler,
        traversal,
        cache,
        manager_client,
    }
}
