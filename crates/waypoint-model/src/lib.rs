pub mod commands;
pub mod health;
pub mod plan;

pub use commands::{ActivityExecuted, ActivityOutcome, ExecuteActivityCommand};
pub use health::{HealthStatus, ProcessorHealthSnapshot};
pub use plan::{AssignmentBinding, AssignmentCommon, EntryCondition, ExecutionPlan, ExpiresAt, StepNode};
