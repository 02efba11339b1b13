use crate::config::{TracingConfig, TracingFormat};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber once at process start. The env
/// filter defaults to the config's `default_level` but `RUST_LOG` always wins,
/// mirroring the teacher's `init_tracing_with_default_env_filter`.
pub fn init_tracing_with_default_env_filter(config: &TracingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        TracingFormat::Json => {
            registry.with(fmt::layer().json().with_target(true)).init();
        }
        TracingFormat::Pretty => {
            registry.with(fmt::layer().pretty().with_target(true)).init();
        }
    }
}
