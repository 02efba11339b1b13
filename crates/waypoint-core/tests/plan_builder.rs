use std::sync::Arc;

use uuid::Uuid;

use waypoint_cache::DomainCache;
use waypoint_common::context::HierarchicalContext;
use waypoint_core::PlanBuilder;
use waypoint_core::test_support::{FakeManagerClient, InMemoryCacheGateway};
use waypoint_manager_client::dto::{AssignmentDto, FlowDto, StepDto, WorkflowDto};

/// Scenario 1 from the testable-properties list: `A -> B, A -> C` with
/// processors `{P1, P2, P2}` stores a plan whose entry point is `A` and whose
/// processor set is `{P1, P2}`.
#[tokio::test]
async fn builds_and_stores_a_plan_with_a_single_entry_point() {
    let flow_id = Uuid::new_v4();
    let workflow_id = Uuid::new_v4();
    let (step_a, step_b, step_c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
    let assignment_id = Uuid::new_v4();

    let mut manager = FakeManagerClient::default();
    manager.flows.insert(
        flow_id,
        FlowDto {
            id: flow_id,
            version: "1".into(),
            name: "test-flow".into(),
            workflow_id,
            is_one_time_execution: false,
            assignment_ids: vec![],
        },
    );
    manager.workflows.insert(
        workflow_id,
        WorkflowDto {
            id: workflow_id,
            step_ids: vec![step_a, step_b, step_c],
        },
    );
    manager.steps.insert(
        step_a,
        StepDto {
            id: step_a,
            processor_id: p1,
            next_step_ids: vec![step_b, step_c],
            entry_condition_type: "PreviousCompleted".into(),
            assignment_ids: vec![assignment_id],
        },
    );
    manager.steps.insert(
        step_b,
        StepDto {
            id: step_b,
            processor_id: p2,
            next_step_ids: vec![],
            entry_condition_type: "PreviousCompleted".into(),
            assignment_ids: vec![],
        },
    );
    manager.steps.insert(
        step_c,
        StepDto {
            id: step_c,
            processor_id: p2,
            next_step_ids: vec![],
            entry_condition_type: "PreviousSuccess".into(),
            assignment_ids: vec![],
        },
    );
    manager.assignments.insert(
        assignment_id,
        AssignmentDto {
            id: assignment_id,
            entity_ids: vec![],
        },
    );

    let cache = Arc::new(DomainCache::new(Arc::new(InMemoryCacheGateway::default())));
    let builder = PlanBuilder::new(Arc::new(manager), cache.clone());

    let ctx = HierarchicalContext::root(flow_id);
    let plan = builder.build_and_store(flow_id, &ctx).await.unwrap();

    assert_eq!(plan.entry_points, vec![step_a]);
    assert_eq!(plan.processor_ids, std::collections::BTreeSet::from([p1, p2]));
    assert_eq!(plan.step_graph.len(), 3);

    let cached = cache.get_plan(&flow_id.to_string(), &ctx).await.unwrap();
    assert!(cached.is_some());
}

#[tokio::test]
async fn unknown_flow_fails_with_not_found() {
    let manager = FakeManagerClient::default();
    let cache = Arc::new(DomainCache::new(Arc::new(InMemoryCacheGateway::default())));
    let builder = PlanBuilder::new(Arc::new(manager), cache);

    let flow_id = Uuid::new_v4();
    let ctx = HierarchicalContext::root(flow_id);
    let result = builder.build_and_store(flow_id, &ctx).await;
    assert!(matches!(result, Err(waypoint_core::PlanBuilderError::FlowNotFound)));
}
