use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use tracing::{info, warn};
use uuid::Uuid;

use waypoint_common::config::RetryConfig;
use waypoint_common::context::HierarchicalContext;
use waypoint_common::retries::with_retries;

use crate::config::ManagerUrlsConfig;
use crate::dto::{AddressDto, AssignmentDto, DeliveryDto, FlowDto, PluginDto, StepDto, WorkflowDto};
use crate::error::ManagerClientError;
use crate::metrics::{ManagerCallRecord, ManagerClientMetrics};

#[async_trait]
pub trait ManagerClient: Send + Sync {
    async fn get_flow(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<FlowDto, ManagerClientError>;
    async fn get_workflow(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<WorkflowDto, ManagerClientError>;
    async fn get_step(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<StepDto, ManagerClientError>;
    async fn get_assignment(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<AssignmentDto, ManagerClientError>;
    async fn try_get_address(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<Option<AddressDto>, ManagerClientError>;
    async fn try_get_delivery(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<Option<DeliveryDto>, ManagerClientError>;
    async fn try_get_plugin(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<Option<PluginDto>, ManagerClientError>;
    async fn get_schema_definition(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<String, ManagerClientError>;
}

/// `reqwest`-backed implementation, one base URL per manager. Every manager
/// speaks the same minimal convention: `GET /{kind}/{id}` returning the entity
/// as JSON, or 404 when absent.
pub struct ReqwestManagerClient {
    http: HttpClient,
    config: ManagerUrlsConfig,
    metrics: Arc<ManagerClientMetrics>,
}

impl ReqwestManagerClient {
    pub fn new(config: ManagerUrlsConfig, metrics: Arc<ManagerClientMetrics>) -> Self {
        Self {
            http: HttpClient::new(),
            config,
            metrics,
        }
    }

    /// A transport-level failure (not a 404, not a decode error) is retried
    /// against the manager's own `RetryConfig`, the same backoff shape the
    /// Cache Gateway's `Put` uses (§10.3).
    async fn get_required<T: serde::de::DeserializeOwned>(
        &self,
        manager: &'static str,
        base_url: &str,
        path: &str,
        retries: &RetryConfig,
        id: Uuid,
        ctx: &HierarchicalContext,
    ) -> Result<T, ManagerClientError> {
        let url = format!("{base_url}/{path}/{id}");
        info!(correlation_id = ?ctx.correlation_id, manager, %url, "manager client request");

        let record = ManagerCallRecord::start(manager, &self.metrics);
        let http = self.http.clone();
        let result = with_retries(
            "manager-client",
            manager,
            url,
            retries,
            move |url| {
                let http = http.clone();
                Box::pin(async move { fetch::<T>(&http, manager, &url).await })
            },
            ManagerClientError::is_retriable,
        )
        .await;

        record.result(result)
    }

    async fn try_get<T: serde::de::DeserializeOwned>(
        &self,
        manager: &'static str,
        base_url: &str,
        path: &str,
        retries: &RetryConfig,
        id: Uuid,
        ctx: &HierarchicalContext,
    ) -> Result<Option<T>, ManagerClientError> {
        match self.get_required(manager, base_url, path, retries, id, ctx).await {
            Ok(value) => Ok(Some(value)),
            Err(ManagerClientError::NotFound) => Ok(None),
            Err(other) => Err(other),
        }
    }
}

async fn fetch<T: serde::de::DeserializeOwned>(
    http: &HttpClient,
    manager: &'static str,
    url: &str,
) -> Result<T, ManagerClientError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|source| ManagerClientError::Transport { manager, source })?;

    if response.status() == StatusCode::NOT_FOUND {
        return Err(ManagerClientError::NotFound);
    }

    let response = response
        .error_for_status()
        .map_err(|source| ManagerClientError::Transport { manager, source })?;

    response
        .json::<T>()
        .await
        .map_err(|source| ManagerClientError::Decode { manager, source })
}

#[async_trait]
impl ManagerClient for ReqwestManagerClient {
    async fn get_flow(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<FlowDto, ManagerClientError> {
        self.get_required("flow", &self.config.flow.base_url(), "flows", &self.config.flow.retries, id, ctx)
            .await
    }

    async fn get_workflow(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<WorkflowDto, ManagerClientError> {
        self.get_required(
            "workflow",
            &self.config.workflow.base_url(),
            "workflows",
            &self.config.workflow.retries,
            id,
            ctx,
        )
        .await
    }

    async fn get_step(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<StepDto, ManagerClientError> {
        self.get_required("step", &self.config.step.base_url(), "steps", &self.config.step.retries, id, ctx)
            .await
    }

    async fn get_assignment(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<AssignmentDto, ManagerClientError> {
        self.get_required(
            "assignment",
            &self.config.assignment.base_url(),
            "assignments",
            &self.config.assignment.retries,
            id,
            ctx,
        )
        .await
    }

    async fn try_get_address(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<Option<AddressDto>, ManagerClientError> {
        self.try_get(
            "address",
            &self.config.address.base_url(),
            "addresses",
            &self.config.address.retries,
            id,
            ctx,
        )
        .await
    }

    async fn try_get_delivery(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<Option<DeliveryDto>, ManagerClientError> {
        self.try_get(
            "delivery",
            &self.config.delivery.base_url(),
            "deliveries",
            &self.config.delivery.retries,
            id,
            ctx,
        )
        .await
    }

    async fn try_get_plugin(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<Option<PluginDto>, ManagerClientError> {
        self.try_get(
            "plugin",
            &self.config.plugin.base_url(),
            "plugins",
            &self.config.plugin.retries,
            id,
            ctx,
        )
        .await
    }

    async fn get_schema_definition(&self, id: Uuid, ctx: &HierarchicalContext) -> Result<String, ManagerClientError> {
        let url = format!("{}/schemas/{id}", self.config.schema.base_url());
        let http = self.http.clone();
        let record = ManagerCallRecord::start("schema", &self.metrics);

        let body = with_retries(
            "manager-client",
            "schema",
            url,
            &self.config.schema.retries,
            move |url| {
                let http = http.clone();
                Box::pin(async move {
                    let response = http
                        .get(&url)
                        .send()
                        .await
                        .map_err(|source| ManagerClientError::Transport {
                            manager: "schema",
                            source,
                        })?;

                    if response.status() == StatusCode::NOT_FOUND {
                        return Err(ManagerClientError::NotFound);
                    }

                    response
                        .error_for_status()
                        .map_err(|source| ManagerClientError::Transport {
                            manager: "schema",
                            source,
                        })?
                        .text()
                        .await
                        .map_err(|source| ManagerClientError::Decode {
                            manager: "schema",
                            source,
                        })
                })
            },
            ManagerClientError::is_retriable,
        )
        .await;
        let body = record.result(body);

        let body = match body {
            Ok(body) => body,
            Err(ManagerClientError::NotFound) => {
                warn!(correlation_id = ?ctx.correlation_id, %id, "schema definition missing");
                return Err(ManagerClientError::NotFound);
            }
            Err(other) => return Err(other),
        };

        Ok(unescape_schema_definition(&body))
    }
}

/// Some schema managers round-trip the definition through an extra layer of
/// JSON string encoding. Detect a leading quote with at least one escaped
/// inner quote and unescape; otherwise the body is returned untouched.
pub fn unescape_schema_definition(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.starts_with('"') && trimmed.contains("\\\"") {
        if let Ok(unescaped) = serde_json::from_str::<String>(trimmed) {
            return unescaped;
        }
    }
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_plain_schema_untouched() {
        let body = r#"{"type":"object"}"#;
        assert_eq!(unescape_schema_definition(body), body);
    }

    #[test]
    fn unescapes_double_encoded_schema() {
        let body = r#""{\"type\":\"object\"}""#;
        assert_eq!(unescape_schema_definition(body), r#"{"type":"object"}"#);
    }
}
