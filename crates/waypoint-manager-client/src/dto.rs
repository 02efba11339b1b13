use serde::Deserialize;
use uuid::Uuid;

/// What the Flow manager returns for a single orchestrated flow. `entity_ids`
/// lists every assignment entity referenced anywhere in the flow; the plan
/// builder resolves each through [`crate::client::ManagerClient`].
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDto {
    pub id: Uuid,
    pub version: String,
    pub name: String,
    pub workflow_id: Uuid,
    pub is_one_time_execution: bool,
    pub assignment_ids: Vec<Uuid>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDto {
    pub id: Uuid,
    pub step_ids: Vec<Uuid>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDto {
    pub id: Uuid,
    pub processor_id: Uuid,
    pub next_step_ids: Vec<Uuid>,
    pub entry_condition_type: String,
    /// The assignment ids this step binds to, in declared order.
    pub assignment_ids: Vec<Uuid>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDto {
    pub id: Uuid,
    /// Entity ids probed via Address, Delivery, then Plugin (§4.2's order).
    pub entity_ids: Vec<Uuid>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDto {
    pub id: Uuid,
    pub name: String,
    pub version: String,
    pub payload: String,
    pub connection_string: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDto {
    pub id: Uuid,
    pub name: String,
    pub version: String,
    pub payload: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDto {
    pub id: Uuid,
    pub name: String,
    pub version: String,
    pub payload: String,
    pub assembly_path: String,
    pub assembly_name: String,
    pub assembly_version: String,
    pub type_name: String,
    pub input_schema_id: Option<Uuid>,
    pub output_schema_id: Option<Uuid>,
    pub stateless: bool,
    pub execution_timeout_ms: u64,
    pub validate_input: bool,
    pub validate_output: bool,
}
