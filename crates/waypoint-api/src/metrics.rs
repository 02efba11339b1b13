use std::time::Instant;

use prometheus::{HistogramVec, IntCounterVec, Opts};
use tracing::Span;
use waypoint_common::TraceErrorKind;

pub struct ApiMetrics {
    pub requests: IntCounterVec,
    pub latency: HistogramVec,
}

impl ApiMetrics {
    pub fn register(registry: &prometheus::Registry) -> Self {
        let requests = IntCounterVec::new(
            Opts::new("waypoint_api_requests_total", "Control API requests, by operation and outcome"),
            &["operation", "outcome"],
        )
        .expect("metric options are valid");
        registry.register(Box::new(requests.clone())).expect("metric registers once");

        let latency = HistogramVec::new(
            prometheus::HistogramOpts::new("waypoint_api_request_duration_seconds", "Control API request latency"),
            &["operation"],
        )
        .expect("metric options are valid");
        registry.register(Box::new(latency.clone())).expect("metric registers once");

        Self { requests, latency }
    }
}

/// One of these is opened per control-API call, mirroring the teacher's
/// `recorded_http_api_request!` + `RecordedHttpApiRequest::result` convention:
/// a span carrying the operation name plus whatever fields the call site
/// passes in, and a single place where success/failure is recorded.
pub struct ApiRequestRecord<'a> {
    pub span: Span,
    operation: &'static str,
    started_at: Instant,
    metrics: &'a ApiMetrics,
}

impl<'a> ApiRequestRecord<'a> {
    pub fn start(operation: &'static str, span: Span, metrics: &'a ApiMetrics) -> Self {
        Self {
            span,
            operation,
            started_at: Instant::now(),
            metrics,
        }
    }

    pub fn result<T, E: TraceErrorKind>(self, result: Result<T, E>) -> Result<T, E> {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        self.metrics.latency.with_label_values(&[self.operation]).observe(elapsed);

        let outcome = match &result {
            Ok(_) => "success",
            Err(error) => error.trace_error_kind(),
        };
        self.metrics.requests.with_label_values(&[self.operation, outcome]).inc();
        result
    }
}

/// Opens a span named after the operation, with whatever extra fields the
/// call site supplies, and wraps it in an [`ApiRequestRecord`].
#[macro_export]
macro_rules! recorded_http_api_request {
    ($metrics:expr, $name:expr $(, $field:ident = $value:expr)* $(,)?) => {
        $crate::metrics::ApiRequestRecord::start(
            $name,
            tracing::info_span!($name, $($field = $value),*),
            $metrics,
        )
    };
}
