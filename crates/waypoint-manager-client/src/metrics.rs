use std::time::Instant;

use prometheus::{HistogramVec, IntCounterVec, Opts};

use crate::error::ManagerClientError;

/// Manager-client call latency and error counts by manager name, named in §10.4.
/// One instance is shared by every [`crate::client::ReqwestManagerClient`] call
/// site, mirroring `waypoint-api`'s `ApiMetrics`/`ApiRequestRecord` pair.
pub struct ManagerClientMetrics {
    pub requests: IntCounterVec,
    pub latency: HistogramVec,
}

impl ManagerClientMetrics {
    pub fn register(registry: &prometheus::Registry) -> Self {
        let requests = IntCounterVec::new(
            Opts::new("waypoint_manager_client_requests_total", "Manager client calls, by manager and outcome"),
            &["manager", "outcome"],
        )
        .expect("metric options are valid");
        registry.register(Box::new(requests.clone())).expect("metric registers once");

        let latency = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "waypoint_manager_client_request_duration_seconds",
                "Manager client call latency, by manager",
            ),
            &["manager"],
        )
        .expect("metric options are valid");
        registry.register(Box::new(latency.clone())).expect("metric registers once");

        Self { requests, latency }
    }
}

/// Opened around one call to a manager, closed via `result` once the call
/// (including its own retries) has settled.
pub struct ManagerCallRecord<'a> {
    manager: &'static str,
    started_at: Instant,
    metrics: &'a ManagerClientMetrics,
}

impl<'a> ManagerCallRecord<'a> {
    pub fn start(manager: &'static str, metrics: &'a ManagerClientMetrics) -> Self {
        Self {
            manager,
            started_at: Instant::now(),
            metrics,
        }
    }

    pub fn result<T>(self, result: Result<T, ManagerClientError>) -> Result<T, ManagerClientError> {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        self.metrics.latency.with_label_values(&[self.manager]).observe(elapsed);

        let outcome = match &result {
            Ok(_) => "success",
            Err(ManagerClientError::NotFound) => "not_found",
            Err(ManagerClientError::Transport { .. }) => "transport",
            Err(ManagerClientError::Decode { .. }) => "decode",
        };
        self.metrics.requests.with_label_values(&[self.manager, outcome]).inc();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_not_found_land_in_distinct_buckets() {
        let registry = prometheus::Registry::new();
        let metrics = ManagerClientMetrics::register(&registry);

        ManagerCallRecord::start("flow", &metrics).result(Ok(()));
        ManagerCallRecord::start("flow", &metrics).result(Err::<(), _>(ManagerClientError::NotFound));

        assert_eq!(metrics.requests.with_label_values(&["flow", "success"]).get(), 1);
        assert_eq!(metrics.requests.with_label_values(&["flow", "not_found"]).get(), 1);
        assert_eq!(metrics.latency.with_label_values(&["flow"]).get_sample_count(), 2);
    }
}
