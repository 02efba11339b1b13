use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use waypoint_cache::DomainCache;
use waypoint_common::context::HierarchicalContext;
use waypoint_core::test_support::InMemoryCacheGateway;
use waypoint_core::{Dispatcher, DispatcherMetrics};
use waypoint_model::plan::{EntryCondition, ExecutionPlan, ExpiresAt, StepNode};
use waypoint_model::{ActivityOutcome};

/// Scenario 6 from the testable-properties list: predecessor `A` fails; `B`
/// (PreviousSuccess) must not fire, `C` (PreviousCompleted) must fire exactly
/// once.
#[tokio::test]
async fn failure_outcome_only_fires_previous_completed_successors() {
    let flow_id = Uuid::new_v4();
    let workflow_id = Uuid::new_v4();
    let (step_a, step_b, step_c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let processor_id = Uuid::new_v4();

    let mut step_graph = BTreeMap::new();
    step_graph.insert(
        step_a,
        StepNode {
            processor_id,
            next_step_ids: vec![step_b, step_c],
            entry_condition: EntryCondition::PreviousCompleted,
        },
    );
    step_graph.insert(
        step_b,
        StepNode {
            processor_id,
            next_step_ids: vec![],
            entry_condition: EntryCondition::PreviousSuccess,
        },
    );
    step_graph.insert(
        step_c,
        StepNode {
            processor_id,
            next_step_ids: vec![],
            entry_condition: EntryCondition::PreviousCompleted,
        },
    );

    let plan = ExecutionPlan {
        flow_id,
        flow_version: "1".into(),
        flow_name: "f".into(),
        workflow_id,
        is_one_time_execution: false,
        step_graph,
        entry_points: vec![step_a],
        processor_ids: std::collections::BTreeSet::from([processor_id]),
        assignments: BTreeMap::new(),
        expires_at: ExpiresAt::Never,
    };

    let (bus, _completion_tx) = waypoint_core::test_support::InMemoryBus::new();
    let bus = Arc::new(bus);
    let registry = prometheus::Registry::new();
    let metrics = Arc::new(DispatcherMetrics::register(&registry));
    let dispatcher = Dispatcher::new(bus.clone(), metrics);

    let correlation_id = Uuid::new_v4();
    let ctx = HierarchicalContext::root(flow_id).with_correlation(correlation_id);

    dispatcher
        .dispatch_successors(&plan, step_a, ActivityOutcome::Failure, &ctx)
        .await;

    let published = bus.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].step_id, step_c);
    assert_eq!(published[0].correlation_id, correlation_id);
}

#[tokio::test]
async fn plan_absent_drops_event_without_publishing() {
    let cache = Arc::new(DomainCache::new(Arc::new(InMemoryCacheGateway::default())));
    let (bus, _tx) = waypoint_core::test_support::InMemoryBus::new();
    let bus = Arc::new(bus);
    let registry = prometheus::Registry::new();
    let metrics = Arc::new(DispatcherMetrics::register(&registry));
    let dispatcher = Arc::new(Dispatcher::new(bus.clone(), metrics));

    let traversal_metrics = Arc::new(waypoint_core::TraversalMetrics::register(&registry));
    let engine = waypoint_core::TraversalEngine::new(bus.clone(), cache, dispatcher, traversal_metrics);
    let flow_id = Uuid::new_v4();
    let event = waypoint_model::ActivityExecuted {
        flow_id,
        workflow_id: Uuid::new_v4(),
        correlation_id: Uuid::new_v4(),
        step_id: Uuid::new_v4(),
        execution_id: Uuid::new_v4(),
        outcome: ActivityOutcome::Success,
    };

    engine.handle_event(event).await;
    assert!(bus.published().is_empty());
}
