use async_trait::async_trait;
use fred::prelude::*;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use waypoint_common::context::HierarchicalContext;
use waypoint_common::retries::with_retries;
use waypoint_model::{ActivityExecuted, ExecuteActivityCommand};

use crate::config::BusConfig;
use crate::error::BusError;

pub type CompletionStream = Pin<Box<dyn Stream<Item = ActivityExecuted> + Send>>;

/// Outbound commands and inbound completion events both flow through this
/// trait; the Dispatcher only ever calls `publish_command`, the Traversal
/// Engine only ever calls `consume_completions`.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish_command(
        &self,
        command: &ExecuteActivityCommand,
        ctx: &HierarchicalContext,
    ) -> Result<(), BusError>;

    async fn consume_completions(&self) -> Result<CompletionStream, BusError>;
}

/// `fred`-backed pub/sub bus. Publishing and subscribing use separate clients
/// because a `fred` client committed to pub/sub mode cannot also issue regular
/// commands.
pub struct FredMessageBus {
    publisher: Client,
    subscriber: SubscriberClient,
    config: BusConfig,
}

impl FredMessageBus {
    pub async fn connect(config: BusConfig) -> Result<Self, BusError> {
        let mut redis_config = Config::from_url(&format!("redis://{}:{}", config.host, config.port))?;
        if let Some(username) = &config.username {
            redis_config.username = Some(username.clone());
        }
        if let Some(password) = &config.password {
            redis_config.password = Some(password.clone());
        }

        let publisher = Builder::from_config(redis_config.clone()).build()?;
        publisher.init().await?;

        let subscriber = Builder::from_config(redis_config).build_subscriber_client()?;
        subscriber.init().await?;
        subscriber.subscribe(&config.completion_channel).await?;

        Ok(Self {
            publisher,
            subscriber,
            config,
        })
    }
}

#[async_trait]
impl MessageBus for FredMessageBus {
    async fn publish_command(
        &self,
        command: &ExecuteActivityCommand,
        ctx: &HierarchicalContext,
    ) -> Result<(), BusError> {
        let payload = serde_json::to_string(command).map_err(BusError::Encode)?;

        with_retries(
            "bus",
            "publish",
            payload.clone(),
            &self.config.publish_retries,
            move |payload| {
                let publisher = self.publisher.clone();
                let channel = self.config.command_channel.clone();
                Box::pin(async move {
                    publisher
                        .publish::<(), _, _>(channel, payload)
                        .await
                        .map_err(BusError::from)
                })
            },
            |_| true,
        )
        .await?;

        info!(
            correlation_id = ?ctx.correlation_id,
            step_id = ?ctx.step_id,
            execution_id = ?ctx.execution_id,
            channel = %self.config.command_channel,
            "published activity command"
        );
        Ok(())
    }

    async fn consume_completions(&self) -> Result<CompletionStream, BusError> {
        let receiver = self.subscriber.message_rx();
        let stream = BroadcastStream::new(receiver).filter_map(|item| async move {
            let message = match item {
                Ok(message) => message,
                Err(_) => return None,
            };
            let text: String = message.value.as_string()?;
            match serde_json::from_str::<ActivityExecuted>(&text) {
                Ok(event) => Some(event),
                Err(error) => {
                    warn!(error = ?error, "dropping undecodable completion event");
                    None
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
