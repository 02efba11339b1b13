use prometheus::{IntCounter, IntCounterVec, Opts};

/// Cache hit/miss/put-retry counts named in §10.4. One instance is shared by
/// every [`crate::gateway::FredCacheGateway`] in the process; `map_name` is
/// deliberately not a label (only two maps exist and neither cardinality risk
/// nor a real operational need justifies splitting the counters further).
pub struct CacheMetrics {
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub put_retries: IntCounter,
    pub put_outcomes: IntCounterVec,
}

impl CacheMetrics {
    pub fn register(registry: &prometheus::Registry) -> Self {
        let hits = IntCounter::new("waypoint_cache_hits_total", "Cache gets that found a value")
            .expect("metric options are valid");
        registry.register(Box::new(hits.clone())).expect("metric registers once");

        let misses = IntCounter::new("waypoint_cache_misses_total", "Cache gets that found nothing")
            .expect("metric options are valid");
        registry.register(Box::new(misses.clone())).expect("metric registers once");

        let put_retries = IntCounter::new("waypoint_cache_put_retries_total", "Retry attempts spent on cache puts")
            .expect("metric options are valid");
        registry.register(Box::new(put_retries.clone())).expect("metric registers once");

        let put_outcomes = IntCounterVec::new(
            Opts::new("waypoint_cache_put_outcomes_total", "Cache puts, by final outcome"),
            &["outcome"],
        )
        .expect("metric options are valid");
        registry.register(Box::new(put_outcomes.clone())).expect("metric registers once");

        Self {
            hits,
            misses,
            put_retries,
            put_outcomes,
        }
    }
}
