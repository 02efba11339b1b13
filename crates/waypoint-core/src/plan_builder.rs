use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use waypoint_cache::DomainCache;
use waypoint_common::context::HierarchicalContext;
use waypoint_manager_client::client::ManagerClient;
use waypoint_manager_client::dto::AssignmentDto;
use waypoint_manager_client::ManagerClientError;
use waypoint_model::plan::{AssignmentBinding, AssignmentCommon, EntryCondition, ExecutionPlan, ExpiresAt, StepNode};

use crate::error::PlanBuilderError;

/// Assembles and caches an [`ExecutionPlan`] for a flow id, per §4.3's algorithm.
pub struct PlanBuilder {
    manager_client: Arc<dyn ManagerClient>,
    cache: Arc<DomainCache>,
}

impl PlanBuilder {
    pub fn new(manager_client: Arc<dyn ManagerClient>, cache: Arc<DomainCache>) -> Self {
        Self { manager_client, cache }
    }

    pub async fn build_and_store(
        &self,
        flow_id: Uuid,
        ctx: &HierarchicalContext,
    ) -> Result<ExecutionPlan, PlanBuilderError> {
        let flow = match self.manager_client.get_flow(flow_id, ctx).await {
            Ok(flow) => flow,
            Err(ManagerClientError::NotFound) => return Err(PlanBuilderError::FlowNotFound),
            Err(error) => {
                warn!(correlation_id = ?ctx.correlation_id, %flow_id, error = ?error, "failed to fetch flow");
                return Err(PlanBuilderError::Downstream(error));
            }
        };

        let workflow = match self.manager_client.get_workflow(flow.workflow_id, ctx).await {
            Ok(workflow) => workflow,
            Err(ManagerClientError::NotFound) => return Err(PlanBuilderError::FlowNotFound),
            Err(error) => {
                warn!(correlation_id = ?ctx.correlation_id, workflow_id = %flow.workflow_id, error = ?error, "failed to fetch workflow");
                return Err(PlanBuilderError::Downstream(error));
            }
        };

        if workflow.step_ids.is_empty() {
            let plan = ExecutionPlan {
                flow_id: flow.id,
                flow_version: flow.version.clone(),
                flow_name: flow.name.clone(),
                workflow_id: workflow.id,
                is_one_time_execution: flow.is_one_time_execution,
                step_graph: BTreeMap::new(),
                entry_points: Vec::new(),
                processor_ids: Default::default(),
                assignments: BTreeMap::new(),
                expires_at: ExpiresAt::Never,
            };
            self.store(&plan, ctx).await?;
            return Ok(plan);
        }

        let step_results = join_all(
            workflow
                .step_ids
                .iter()
                .map(|&step_id| self.manager_client.get_step(step_id, ctx)),
        )
        .await;

        let mut step_graph = BTreeMap::new();
        let mut step_assignment_ids: BTreeMap<Uuid, Vec<Uuid>> = BTreeMap::new();
        for (step_id, result) in workflow.step_ids.iter().zip(step_results) {
            match result {
                Ok(step) => {
                    let entry_condition = match step.entry_condition_type.as_str() {
                        "PreviousCompleted" => EntryCondition::PreviousCompleted,
                        "PreviousSuccess" => EntryCondition::PreviousSuccess,
                        "Always" => EntryCondition::Always,
                        _ => EntryCondition::Unknown,
                    };
                    step_graph.insert(
                        step.id,
                        StepNode {
                            processor_id: step.processor_id,
                            next_step_ids: step.next_step_ids.clone(),
                            entry_condition,
                        },
                    );
                    step_assignment_ids.insert(step.id, step.assignment_ids.clone());
                }
                Err(error) => {
                    warn!(correlation_id = ?ctx.correlation_id, %step_id, error = ?error, "failed to fetch step, omitting from graph");
                }
            }
        }

        let flattened: Vec<(Uuid, Uuid)> = step_assignment_ids
            .iter()
            .flat_map(|(&step_id, ids)| ids.iter().map(move |&assignment_id| (step_id, assignment_id)))
            .collect();

        let resolved = join_all(
            flattened
                .into_iter()
                .map(|(step_id, assignment_id)| async move { (step_id, self.fetch_assignment(assignment_id, ctx).await) }),
        )
        .await;

        let mut assignments: BTreeMap<Uuid, Vec<AssignmentBinding>> = BTreeMap::new();
        for (step_id, bindings) in resolved {
            assignments.entry(step_id).or_default().extend(bindings);
        }

        // A step that failed to fetch is omitted above; any surviving step's
        // successor pointing at it is pruned here so it degrades the graph
        // instead of failing ExecutionPlan::validate's dangling-successor check.
        let present_step_ids: std::collections::BTreeSet<Uuid> = step_graph.keys().copied().collect();
        for node in step_graph.values_mut() {
            node.next_step_ids.retain(|successor| present_step_ids.contains(successor));
        }

        let entry_points = ExecutionPlan::compute_entry_points(&step_graph, &workflow.step_ids);
        let processor_ids = ExecutionPlan::compute_processor_ids(&step_graph);

        let plan = ExecutionPlan {
            flow_id: flow.id,
            flow_version: flow.version,
            flow_name: flow.name,
            workflow_id: workflow.id,
            is_one_time_execution: flow.is_one_time_execution,
            step_graph,
            entry_points,
            processor_ids,
            assignments,
            expires_at: ExpiresAt::Never,
        };

        self.store(&plan, ctx).await?;
        Ok(plan)
    }

    async fn store(&self, plan: &ExecutionPlan, ctx: &HierarchicalContext) -> Result<(), PlanBuilderError> {
        plan.validate()?;
        let serialized = serde_json::to_string(plan).expect("ExecutionPlan always serializes");
        self.cache.put_plan(&plan.flow_id.to_string(), serialized, ctx).await?;
        info!(correlation_id = ?ctx.correlation_id, flow_id = %plan.flow_id, step_count = plan.step_graph.len(), "plan stored");
        Ok(())
    }

    /// Resolves every entity id on an assignment to a binding by probing
    /// Address, then Delivery, then Plugin, in that order (§4.2). Per-entity
    /// resolution failures are swallowed with a warning — only the flow-level
    /// fetch failures (handled above) abort the whole build.
    async fn fetch_assignment(&self, assignment_id: Uuid, ctx: &HierarchicalContext) -> Vec<AssignmentBinding> {
        let assignment: AssignmentDto = match self.manager_client.get_assignment(assignment_id, ctx).await {
            Ok(assignment) => assignment,
            Err(error) => {
                warn!(correlation_id = ?ctx.correlation_id, %assignment_id, error = ?error, "failed to fetch assignment");
                return Vec::new();
            }
        };

        let mut bindings = Vec::with_capacity(assignment.entity_ids.len());
        for entity_id in assignment.entity_ids {
            if let Some(binding) = self.resolve_entity(entity_id, ctx).await {
                bindings.push(binding);
            } else {
                warn!(correlation_id = ?ctx.correlation_id, %entity_id, "entity resolved to no known binding type");
            }
        }
        bindings
    }

    async fn resolve_entity(&self, entity_id: Uuid, ctx: &HierarchicalContext) -> Option<AssignmentBinding> {
        if let Ok(Some(address)) = self.manager_client.try_get_address(entity_id, ctx).await {
            return Some(AssignmentBinding::Address {
                common: AssignmentCommon {
                    entity_id: address.id,
                    name: address.name,
                    version: address.version,
                    payload: address.payload,
                },
                connection_string: address.connection_string,
            });
        }

        if let Ok(Some(delivery)) = self.manager_client.try_get_delivery(entity_id, ctx).await {
            return Some(AssignmentBinding::Delivery {
                common: AssignmentCommon {
                    entity_id: delivery.id,
                    name: delivery.name,
                    version: delivery.version,
                    payload: delivery.payload,
                },
            });
        }

        if let Ok(Some(plugin)) = self.manager_client.try_get_plugin(entity_id, ctx).await {
            let (input_schema_definition, output_schema_definition) =
                self.fetch_plugin_schemas(plugin.input_schema_id, plugin.output_schema_id, ctx).await;

            return Some(AssignmentBinding::Plugin {
                common: AssignmentCommon {
                    entity_id: plugin.id,
                    name: plugin.name,
                    version: plugin.version,
                    payload: plugin.payload,
                },
                assembly_path: plugin.assembly_path,
                assembly_name: plugin.assembly_name,
                assembly_version: plugin.assembly_version,
                type_name: plugin.type_name,
                input_schema_id: plugin.input_schema_id,
                output_schema_id: plugin.output_schema_id,
                input_schema_definition,
                output_schema_definition,
                stateless: plugin.stateless,
                execution_timeout_ms: plugin.execution_timeout_ms,
                validate_input: plugin.validate_input,
                validate_output: plugin.validate_output,
            });
        }

        None
    }

    /// Schema retrieval is best-effort (§4.2): a failure here never fails plan
    /// construction, it just leaves the binding with empty schema strings.
    async fn fetch_plugin_schemas(
        &self,
        input_schema_id: Option<Uuid>,
        output_schema_id: Option<Uuid>,
        ctx: &HierarchicalContext,
    ) -> (String, String) {
        let input = match input_schema_id {
            Some(id) => self.manager_client.get_schema_definition(id, ctx).await.unwrap_or_else(|error| {
                warn!(correlation_id = ?ctx.correlation_id, %id, error = ?error, "input schema retrieval failed");
                String::new()
            }),
            None => String::new(),
        };

        let output = match output_schema_id {
            Some(id) => self.manager_client.get_schema_definition(id, ctx).await.unwrap_or_else(|error| {
                warn!(correlation_id = ?ctx.correlation_id, %id, error = ?error, "output schema retrieval failed");
                String::new()
            }),
            None => String::new(),
        };

        (input, output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;
    use waypoint_common::{ErrorKind, HasErrorKind, SafeDisplay};
    use waypoint_manager_client::dto::{FlowDto, StepDto, WorkflowDto};

    use crate::test_support::{FakeManagerClient, InMemoryCacheGateway};

    use super::*;

    fn cache() -> Arc<DomainCache> {
        Arc::new(DomainCache::new(Arc::new(InMemoryCacheGateway::default())))
    }

    #[tokio::test]
    async fn a_failed_step_fetch_is_omitted_and_its_predecessors_are_pruned_not_aborted() {
        let flow_id = Uuid::new_v4();
        let workflow_id = Uuid::new_v4();
        let surviving_step = Uuid::new_v4();
        let missing_step = Uuid::new_v4();

        let mut manager_client = FakeManagerClient::default();
        manager_client.flows.insert(
            flow_id,
            FlowDto {
                id: flow_id,
                version: "v1".to_string(),
                name: "f".to_string(),
                workflow_id,
                is_one_time_execution: false,
                assignment_ids: vec![],
            },
        );
        manager_client.workflows.insert(
            workflow_id,
            WorkflowDto {
                id: workflow_id,
                step_ids: vec![surviving_step, missing_step],
            },
        );
        // `missing_step` is never inserted into `manager_client.steps`, so its
        // fetch fails with NotFound; `surviving_step` still points at it.
        manager_client.steps.insert(
            surviving_step,
            StepDto {
                id: surviving_step,
                processor_id: Uuid::new_v4(),
                next_step_ids: vec![missing_step],
                entry_condition_type: "Always".to_string(),
                assignment_ids: vec![],
            },
        );

        let builder = PlanBuilder::new(Arc::new(manager_client), cache());
        let ctx = HierarchicalContext::default();

        let plan = builder
            .build_and_store(flow_id, &ctx)
            .await
            .expect("a missing step must not abort the build");

        assert_eq!(plan.step_graph.len(), 1);
        assert!(plan.step_graph.contains_key(&surviving_step));
        assert!(plan.step_graph[&surviving_step].next_step_ids.is_empty());
        assert_eq!(plan.entry_points, vec![surviving_step]);
        plan.validate().expect("pruned plan must still satisfy its own invariants");
    }

    #[tokio::test]
    async fn unknown_flow_is_reported_as_flow_not_found() {
        let builder = PlanBuilder::new(Arc::new(FakeManagerClient::default()), cache());
        let ctx = HierarchicalContext::default();

        let error = builder
            .build_and_store(Uuid::new_v4(), &ctx)
            .await
            .expect_err("an unregistered flow id must fail");

        assert!(matches!(error, PlanBuilderError::FlowNotFound));
    }

    #[test]
    fn downstream_error_kind_and_message_delegate_to_the_manager_client_error() {
        let error = PlanBuilderError::Downstream(ManagerClientError::NotFound);
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.to_safe_string(), ManagerClientError::NotFound.to_safe_string());
    }
}
