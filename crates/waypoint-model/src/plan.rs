use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// The fully resolved, serialized view of a flow, cached under the flow id.
/// Immutable once stored: a re-`Start` overwrites the whole value rather than
/// patching it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub flow_id: Uuid,
    pub flow_version: String,
    pub flow_name: String,
    pub workflow_id: Uuid,
    pub is_one_time_execution: bool,
    pub step_graph: BTreeMap<Uuid, StepNode>,
    pub entry_points: Vec<Uuid>,
    pub processor_ids: BTreeSet<Uuid>,
    pub assignments: BTreeMap<Uuid, Vec<AssignmentBinding>>,
    pub expires_at: ExpiresAt,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepNode {
    pub processor_id: Uuid,
    pub next_step_ids: Vec<Uuid>,
    pub entry_condition: EntryCondition,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EntryCondition {
    /// Fires as soon as any predecessor reports, regardless of outcome.
    PreviousCompleted,
    /// Fires only once the reporting predecessor's outcome is `Success`.
    PreviousSuccess,
    /// Fires on any predecessor event, identical to `PreviousCompleted` in this
    /// core (kept distinct because the domain's authoring surface exposes both).
    Always,
    /// Any tag the CRUD managers may introduce that this core does not know about.
    /// Deserializes cleanly so plan storage never fails on a forward-compatible
    /// value, but the traversal engine treats it as a hard error at evaluation time.
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "bindingType", rename_all = "camelCase")]
pub enum AssignmentBinding {
    Address {
        #[serde(flatten)]
        common: AssignmentCommon,
        connection_string: String,
    },
    Delivery {
        #[serde(flatten)]
        common: AssignmentCommon,
    },
    Plugin {
        #[serde(flatten)]
        common: AssignmentCommon,
        assembly_path: String,
        assembly_name: String,
        assembly_version: String,
        type_name: String,
        input_schema_id: Option<Uuid>,
        output_schema_id: Option<Uuid>,
        #[serde(default)]
        input_schema_definition: String,
        #[serde(default)]
        output_schema_definition: String,
        stateless: bool,
        execution_timeout_ms: u64,
        validate_input: bool,
        validate_output: bool,
    },
}

impl AssignmentBinding {
    pub fn entity_id(&self) -> Uuid {
        self.common().entity_id
    }

    pub fn common(&self) -> &AssignmentCommon {
        match self {
            AssignmentBinding::Address { common, .. } => common,
            AssignmentBinding::Delivery { common, .. } => common,
            AssignmentBinding::Plugin { common, .. } => common,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentCommon {
    pub entity_id: Uuid,
    pub name: String,
    pub version: String,
    pub payload: String,
}

/// "never" or an explicit instant. The plan's own value is advisory — the cache
/// map is always written with a far-future TTL and `Stop` is the real authority.
#[derive(Clone, Debug, PartialEq)]
pub enum ExpiresAt {
    Never,
    At(DateTime<Utc>),
}

impl Serialize for ExpiresAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExpiresAt::Never => serializer.serialize_str("never"),
            ExpiresAt::At(ts) => ts.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ExpiresAt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(ref s) if s == "never" => Ok(ExpiresAt::Never),
            other => serde_json::from_value(other)
                .map(ExpiresAt::At)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanValidationError {
    #[error("step {successor} referenced as a successor of {step} is not a key of stepGraph")]
    DanglingSuccessor { step: Uuid, successor: Uuid },
    #[error("entryPoints is empty but stepGraph is not")]
    EmptyEntryPoints,
    #[error("processorIds does not match the distinct set of processor ids in stepGraph")]
    ProcessorIdMismatch,
}

impl ExecutionPlan {
    /// Computes `entryPoints` as the step ids that never appear as another step's
    /// successor, tie-broken by the supplied insertion order (the workflow's own
    /// step-id sequence).
    pub fn compute_entry_points(
        step_graph: &BTreeMap<Uuid, StepNode>,
        insertion_order: &[Uuid],
    ) -> Vec<Uuid> {
        let referenced: BTreeSet<Uuid> = step_graph
            .values()
            .flat_map(|node| node.next_step_ids.iter().copied())
            .collect();

        insertion_order
            .iter()
            .copied()
            .filter(|id| step_graph.contains_key(id) && !referenced.contains(id))
            .collect()
    }

    pub fn compute_processor_ids(step_graph: &BTreeMap<Uuid, StepNode>) -> BTreeSet<Uuid> {
        step_graph.values().map(|node| node.processor_id).collect()
    }

    /// Checks the invariants §8 quantifies over every stored plan. Called before
    /// `Put`, never after (the plan is immutable once stored).
    pub fn validate(&self) -> Result<(), PlanValidationError> {
        for (step, node) in &self.step_graph {
            for successor in &node.next_step_ids {
                if !self.step_graph.contains_key(successor) {
                    return Err(PlanValidationError::DanglingSuccessor {
                        step: *step,
                        successor: *successor,
                    });
                }
            }
        }

        if self.step_graph.is_empty() {
            // An empty workflow short-circuits to an empty plan (§4.3 step 2); an
            // empty entryPoints list is then legitimate.
        } else if self.entry_points.is_empty() {
            return Err(PlanValidationError::EmptyEntryPoints);
        }

        if self.processor_ids != Self::compute_processor_ids(&self.step_graph) {
            return Err(PlanValidationError::ProcessorIdMismatch);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(processor: Uuid, next: Vec<Uuid>) -> StepNode {
        StepNode {
            processor_id: processor,
            next_step_ids: next,
            entry_condition: EntryCondition::PreviousCompleted,
        }
    }

    #[test]
    fn entry_points_excludes_every_referenced_successor() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();

        let mut graph = BTreeMap::new();
        graph.insert(a, node(p1, vec![b, c]));
        graph.insert(b, node(p2, vec![]));
        graph.insert(c, node(p2, vec![]));

        let entry_points = ExecutionPlan::compute_entry_points(&graph, &[a, b, c]);
        assert_eq!(entry_points, vec![a]);
    }

    #[test]
    fn processor_ids_is_the_distinct_projection() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let p1 = Uuid::new_v4();

        let mut graph = BTreeMap::new();
        graph.insert(a, node(p1, vec![b]));
        graph.insert(b, node(p1, vec![]));

        let processor_ids = ExecutionPlan::compute_processor_ids(&graph);
        assert_eq!(processor_ids, BTreeSet::from([p1]));
    }

    #[test]
    fn validate_rejects_dangling_successor() {
        let a = Uuid::new_v4();
        let missing = Uuid::new_v4();
        let p1 = Uuid::new_v4();

        let mut graph = BTreeMap::new();
        graph.insert(a, node(p1, vec![missing]));

        let plan = ExecutionPlan {
            flow_id: Uuid::new_v4(),
            flow_version: "1".into(),
            flow_name: "f".into(),
            workflow_id: Uuid::new_v4(),
            is_one_time_execution: false,
            step_graph: graph,
            entry_points: vec![a],
            processor_ids: BTreeSet::from([p1]),
            assignments: BTreeMap::new(),
            expires_at: ExpiresAt::Never,
        };

        assert_eq!(
            plan.validate(),
            Err(PlanValidationError::DanglingSuccessor {
                step: a,
                successor: missing
            })
        );
    }

    #[test]
    fn expires_at_never_round_trips_as_string() {
        let value = serde_json::to_value(ExpiresAt::Never).unwrap();
        assert_eq!(value, serde_json::json!("never"));
        let parsed: ExpiresAt = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, ExpiresAt::Never);
    }

    #[test]
    fn unknown_entry_condition_deserializes_instead_of_failing() {
        let value = serde_json::json!({"type": "AllPredecessorsWithinWindow"});
        let condition: EntryCondition = serde_json::from_value(value).unwrap();
        assert_eq!(condition, EntryCondition::Unknown);
    }
}
