use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::AssignmentBinding;

/// Published by the dispatcher, consumed by a processor. `execution_id` is
/// freshly minted per firing so a step that re-enters the graph (rare, but the
/// traversal engine does not itself forbid cycles) is never confused with its
/// own prior run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteActivityCommand {
    pub flow_id: Uuid,
    pub workflow_id: Uuid,
    pub correlation_id: Uuid,
    pub step_id: Uuid,
    pub processor_id: Uuid,
    pub publish_id: Uuid,
    pub execution_id: Uuid,
    pub assignments: Vec<AssignmentBinding>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ActivityOutcome {
    Success,
    Failure,
}

/// Published by a processor once a step finishes; consumed by the traversal
/// engine to decide which successors fire next.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityExecuted {
    pub flow_id: Uuid,
    pub workflow_id: Uuid,
    pub correlation_id: Uuid,
    pub step_id: Uuid,
    pub execution_id: Uuid,
    pub outcome: ActivityOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_executed_round_trips_through_json() {
        let event = ActivityExecuted {
            flow_id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            correlation_id: Uuid::new_v4(),
            step_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            outcome: ActivityOutcome::Success,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"outcome\":\"success\""));

        let parsed: ActivityExecuted = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
