/// Client-facing rendering of an error, distinct from `Display`/`Debug`. Internal
/// transport details (downstream response bodies, connection errors) are scrubbed
/// here; the full detail still goes to the logs via `Display`/`tracing`.
pub trait SafeDisplay {
    fn to_safe_string(&self) -> String;
}

/// The error kinds the orchestrator core distinguishes, shared across crates so the
/// API layer can map any component error to an HTTP status without knowing which
/// component produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyRunning,
    CacheUnavailable,
    BusUnavailable,
    DownstreamUnavailable,
    HealthGateFailed,
    Internal,
}

pub trait HasErrorKind {
    fn kind(&self) -> ErrorKind;
}

/// Labels an API error response for the request-recording metric/span without
/// leaking the error's `Display` text into a low-cardinality label value.
pub trait TraceErrorKind {
    fn trace_error_kind(&self) -> &'static str;
}

impl<T: HasErrorKind> TraceErrorKind for T {
    fn trace_error_kind(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyRunning => "AlreadyRunning",
            ErrorKind::CacheUnavailable => "CacheUnavailable",
            ErrorKind::BusUnavailable => "BusUnavailable",
            ErrorKind::DownstreamUnavailable => "DownstreamUnavailable",
            ErrorKind::HealthGateFailed => "HealthGateFailed",
            ErrorKind::Internal => "Internal",
        }
    }
}
