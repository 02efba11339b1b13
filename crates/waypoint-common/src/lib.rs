pub mod config;
pub mod context;
pub mod error;
pub mod retries;
pub mod tracing_init;

pub use context::HierarchicalContext;
pub use error::{ErrorKind, HasErrorKind, SafeDisplay};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
