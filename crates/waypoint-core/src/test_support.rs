//! In-memory fakes for the Cache Gateway, Manager Client, and Bus, used by
//! component tests in place of mocking frameworks (§10.5).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use waypoint_bus::{BusError, CompletionStream, MessageBus};
use waypoint_cache::{CacheError, CacheGateway, CacheTtl};
use waypoint_common::context::HierarchicalContext;
use waypoint_manager_client::client::ManagerClient;
use waypoint_manager_client::dto::{AddressDto, AssignmentDto, DeliveryDto, FlowDto, PluginDto, StepDto, WorkflowDto};
use waypoint_manager_client::ManagerClientError;
use waypoint_model::ExecuteActivityCommand;

#[derive(Default)]
pub struct InMemoryCacheGateway {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CacheGateway for InMemoryCacheGateway {
    async fn put(
        &self,
        map_name: &str,
        key: &str,
        value: String,
        _ttl: CacheTtl,
        _ctx: &HierarchicalContext,
    ) -> Result<(), CacheError> {
        self.entries.lock().unwrap().insert(format!("{map_name}:{key}"), value);
        Ok(())
    }

    async fn get(&self, map_name: &str, key: &str, _ctx: &HierarchicalContext) -> Result<Option<String>, CacheError> {
        Ok(self.entries.lock().unwrap().get(&format!("{map_name}:{key}")).cloned())
    }

    async fn remove(&self, map_name: &str, key: &str, _ctx: &HierarchicalContext) -> Result<(), CacheError> {
        self.entries.lock().unwrap().remove(&format!("{map_name}:{key}"));
        Ok(())
    }
}

/// A canned Manager Client: every `get_*`/`try_get_*` call is served from a
/// fixed table populated by the test, rather than hitting the network.
#[derive(Default)]
pub struct FakeManagerClient {
    pub flows: HashMap<Uuid, FlowDto>,
    pub workflows: HashMap<Uuid, WorkflowDto>,
    pub steps: HashMap<Uuid, StepDto>,
    pub assignments: HashMap<Uuid, AssignmentDto>,
    pub addresses: HashMap<Uuid, AddressDto>,
    pub deliveries: HashMap<Uuid, DeliveryDto>,
    pub plugins: HashMap<Uuid, PluginDto>,
    pub schemas: HashMap<Uuid, String>,
}

#[async_trait]
impl ManagerClient for FakeManagerClient {
    async fn get_flow(&self, id: Uuid, _ctx: &HierarchicalContext) -> Result<FlowDto, ManagerClientError> {
        self.flows.get(&id).cloned().ok_or(ManagerClientError::NotFound)
    }

    async fn get_workflow(&self, id: Uuid, _ctx: &HierarchicalContext) -> Result<WorkflowDto, ManagerClientError> {
        self.workflows.get(&id).cloned().ok_or(ManagerClientError::NotFound)
    }

    async fn get_step(&self, id: Uuid, _ctx: &HierarchicalContext) -> Result<StepDto, ManagerClientError> {
        self.steps.get(&id).cloned().ok_or(ManagerClientError::NotFound)
    }

    async fn get_assignment(&self, id: Uuid, _ctx: &HierarchicalContext) -> Result<AssignmentDto, ManagerClientError> {
        self.assignments.get(&id).cloned().ok_or(ManagerClientError::NotFound)
    }

    async fn try_get_address(&self, id: Uuid, _ctx: &HierarchicalContext) -> Result<Option<AddressDto>, ManagerClientError> {
        Ok(self.addresses.get(&id).cloned())
    }

    async fn try_get_delivery(&self, id: Uuid, _ctx: &HierarchicalContext) -> Result<Option<DeliveryDto>, ManagerClientError> {
        Ok(self.deliveries.get(&id).cloned())
    }

    async fn try_get_plugin(&self, id: Uuid, _ctx: &HierarchicalContext) -> Result<Option<PluginDto>, ManagerClientError> {
        Ok(self.plugins.get(&id).cloned())
    }

    async fn get_schema_definition(&self, id: Uuid, _ctx: &HierarchicalContext) -> Result<String, ManagerClientError> {
        self.schemas.get(&id).cloned().ok_or(ManagerClientError::NotFound)
    }
}

/// Records every published command instead of touching a broker; tests assert
/// on `published()` rather than spinning up Redis.
pub struct InMemoryBus {
    published: Mutex<Vec<ExecuteActivityCommand>>,
    completions: Mutex<Option<mpsc::UnboundedReceiver<waypoint_model::ActivityExecuted>>>,
}

impl InMemoryBus {
    pub fn new() -> (Self, mpsc::UnboundedSender<waypoint_model::ActivityExecuted>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                published: Mutex::new(Vec::new()),
                completions: Mutex::new(Some(rx)),
            },
            tx,
        )
    }

    pub fn published(&self) -> Vec<ExecuteActivityCommand> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish_command(&self, command: &ExecuteActivityCommand, _ctx: &HierarchicalContext) -> Result<(), BusError> {
        self.published.lock().unwrap().push(command.clone());
        Ok(())
    }

    async fn consume_completions(&self) -> Result<CompletionStream, BusError> {
        let rx = self.completions.lock().unwrap().take().expect("consume_completions called once");
        let stream = tokio_stream::wrappers::UnboundedReceiverStream::new(rx);
        Ok(Box::pin(stream))
    }
}
