pub mod dispatcher;
pub mod error;
pub mod health_gate;
pub mod plan_builder;
pub mod scheduler;
pub mod traversal;

pub use dispatcher::{Dispatcher, DispatcherMetrics};
pub use error::{DispatchError, HealthGateError, PlanBuilderError, SchedulerError, TraversalError};
pub use health_gate::{HealthGate, HealthGateConfig, PlanHealthReport};
pub use plan_builder::PlanBuilder;
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerMetrics};
pub use traversal::{TraversalEngine, TraversalMetrics};

/// In-memory fakes for the Cache Gateway, Manager Client, and Bus, shared by
/// this crate's own tests and exposed for integration tests under `tests/`.
pub mod test_support;
