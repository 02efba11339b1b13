use async_trait::async_trait;
use fred::prelude::*;
use fred::types::{Expiration, Value as FredValue};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use waypoint_common::context::HierarchicalContext;
use waypoint_common::retries::with_retries;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::metrics::CacheMetrics;

/// `Never` is used for execution plans; `After(duration)` for everything else
/// (health snapshots, process-local leases).
#[derive(Clone, Copy, Debug)]
pub enum CacheTtl {
    Never,
    After(std::time::Duration),
}

/// Byte/string blobs in, byte/string blobs out — the gateway does not interpret
/// `value` (§4.1). Callers serialize their own types before calling `put`.
#[async_trait]
pub trait CacheGateway: Send + Sync {
    async fn put(
        &self,
        map_name: &str,
        key: &str,
        value: String,
        ttl: CacheTtl,
        ctx: &HierarchicalContext,
    ) -> Result<(), CacheError>;

    async fn get(
        &self,
        map_name: &str,
        key: &str,
        ctx: &HierarchicalContext,
    ) -> Result<Option<String>, CacheError>;

    async fn remove(
        &self,
        map_name: &str,
        key: &str,
        ctx: &HierarchicalContext,
    ) -> Result<(), CacheError>;
}

/// `fred`-backed implementation. One client is shared across the whole process;
/// `fred` pools connections internally so this is safe to clone cheaply.
pub struct FredCacheGateway {
    client: Client,
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
}

impl FredCacheGateway {
    pub async fn connect(config: CacheConfig, metrics: Arc<CacheMetrics>) -> Result<Self, CacheError> {
        let mut redis_config = Config::from_url(&format!(
            "redis://{}:{}",
            config.host, config.port
        ))?;
        if let Some(username) = &config.username {
            redis_config.username = Some(username.clone());
        }
        if let Some(password) = &config.password {
            redis_config.password = Some(password.clone());
        }

        let client = Builder::from_config(redis_config).build()?;
        client.init().await?;

        Ok(Self { client, config, metrics })
    }

    fn namespaced_key(map_name: &str, key: &str) -> String {
        format!("{map_name}:{key}")
    }
}

#[async_trait]
impl CacheGateway for FredCacheGateway {
    async fn put(
        &self,
        map_name: &str,
        key: &str,
        value: String,
        ttl: CacheTtl,
        ctx: &HierarchicalContext,
    ) -> Result<(), CacheError> {
        let namespaced = Self::namespaced_key(map_name, key);
        let expire = match ttl {
            CacheTtl::Never => None,
            CacheTtl::After(duration) => Some(Expiration::EX(duration.as_secs() as i64)),
        };

        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_in_closure = attempts.clone();
        let result = with_retries(
            "cache",
            "put",
            (namespaced.clone(), value.clone()),
            &self.config.put_retries,
            move |(namespaced, value)| {
                attempts_in_closure.fetch_add(1, Ordering::Relaxed);
                let client = self.client.clone();
                let expire = expire.clone();
                Box::pin(async move {
                    client
                        .set::<(), _, _>(namespaced, value, expire, None, false)
                        .await
                        .map_err(CacheError::from)
                })
            },
            |_| true,
        )
        .await;

        let retries = attempts.load(Ordering::Relaxed).saturating_sub(1);
        if retries > 0 {
            self.metrics.put_retries.inc_by(retries as u64);
        }
        match &result {
            Ok(()) => self.metrics.put_outcomes.with_label_values(&["success"]).inc(),
            Err(_) => self.metrics.put_outcomes.with_label_values(&["failure"]).inc(),
        }
        result?;

        info!(
            correlation_id = ?ctx.correlation_id,
            map_name,
            key,
            "cache put"
        );
        Ok(())
    }

    async fn get(
        &self,
        map_name: &str,
        key: &str,
        ctx: &HierarchicalContext,
    ) -> Result<Option<String>, CacheError> {
        let namespaced = Self::namespaced_key(map_name, key);
        let value: Option<FredValue> = self.client.get(&namespaced).await?;

        match value {
            Some(v) => {
                self.metrics.hits.inc();
                Ok(v.as_string())
            }
            None => {
                self.metrics.misses.inc();
                warn!(
                    correlation_id = ?ctx.correlation_id,
                    map_name,
                    key,
                    "cache miss"
                );
                Ok(None)
            }
        }
    }

    async fn remove(
        &self,
        map_name: &str,
        key: &str,
        ctx: &HierarchicalContext,
    ) -> Result<(), CacheError> {
        let namespaced = Self::namespaced_key(map_name, key);
        let _: i64 = self.client.del(&namespaced).await?;
        info!(
            correlation_id = ?ctx.correlation_id,
            map_name,
            key,
            "cache remove"
        );
        Ok(())
    }
}

/// Default plan map name, used whenever no `CacheConfig` is supplied (tests,
/// the in-memory fakes). The real entrypoint always threads `CacheConfig.map_name`
/// (`OrchestrationCache.MapName`, §6) through [`DomainCache::new`] instead.
pub const DEFAULT_PLAN_MAP: &str = "orchestration-data";
pub const HEALTH_MAP: &str = "processor-health";

/// Convenience wrapper built on top of [`CacheGateway`] for the two domain maps
/// this orchestrator actually uses, so call sites don't repeat the map name.
pub struct DomainCache {
    gateway: Arc<dyn CacheGateway>,
    plan_map: String,
}

impl DomainCache {
    pub fn new(gateway: Arc<dyn CacheGateway>) -> Self {
        Self {
            gateway,
            plan_map: DEFAULT_PLAN_MAP.to_string(),
        }
    }

    /// Builds a `DomainCache` whose plan map name comes from `CacheConfig`
    /// (`OrchestrationCache.MapName`, §6) rather than the built-in default.
    pub fn with_config(gateway: Arc<dyn CacheGateway>, config: &crate::config::CacheConfig) -> Self {
        Self {
            gateway,
            plan_map: config.map_name.clone(),
        }
    }

    pub async fn put_plan(
        &self,
        flow_id: &str,
        serialized_plan: String,
        ctx: &HierarchicalContext,
    ) -> Result<(), CacheError> {
        self.gateway
            .put(&self.plan_map, flow_id, serialized_plan, CacheTtl::Never, ctx)
            .await
    }

    pub async fn get_plan(
        &self,
        flow_id: &str,
        ctx: &HierarchicalContext,
    ) -> Result<Option<String>, CacheError> {
        self.gateway.get(&self.plan_map, flow_id, ctx).await
    }

    pub async fn remove_plan(
        &self,
        flow_id: &str,
        ctx: &HierarchicalContext,
    ) -> Result<(), CacheError> {
        self.gateway.remove(&self.plan_map, flow_id, ctx).await
    }

    pub async fn put_health(
        &self,
        processor_id: &str,
        serialized_snapshot: String,
        ttl: std::time::Duration,
        ctx: &HierarchicalContext,
    ) -> Result<(), CacheError> {
        self.gateway
            .put(
                HEALTH_MAP,
                processor_id,
                serialized_snapshot,
                CacheTtl::After(ttl),
                ctx,
            )
            .await
    }

    pub async fn get_health(
        &self,
        processor_id: &str,
        ctx: &HierarchicalContext,
    ) -> Result<Option<String>, CacheError> {
        self.gateway.get(HEALTH_MAP, processor_id, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records the map name every call was made against, so tests can assert on
    /// `DomainCache`'s map routing without a real Redis connection.
    #[derive(Default)]
    struct RecordingCacheGateway {
        entries: Mutex<HashMap<(String, String), String>>,
    }

    #[async_trait]
    impl CacheGateway for RecordingCacheGateway {
        async fn put(
            &self,
            map_name: &str,
            key: &str,
            value: String,
            _ttl: CacheTtl,
            _ctx: &HierarchicalContext,
        ) -> Result<(), CacheError> {
            self.entries
                .lock()
                .unwrap()
                .insert((map_name.to_string(), key.to_string()), value);
            Ok(())
        }

        async fn get(&self, map_name: &str, key: &str, _ctx: &HierarchicalContext) -> Result<Option<String>, CacheError> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .get(&(map_name.to_string(), key.to_string()))
                .cloned())
        }

        async fn remove(&self, map_name: &str, key: &str, _ctx: &HierarchicalContext) -> Result<(), CacheError> {
            self.entries.lock().unwrap().remove(&(map_name.to_string(), key.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn new_uses_the_default_plan_map() {
        let gateway = Arc::new(RecordingCacheGateway::default());
        let cache = DomainCache::new(gateway.clone());
        let ctx = HierarchicalContext::default();

        cache.put_plan("flow-1", "plan-body".to_string(), &ctx).await.unwrap();

        assert_eq!(
            gateway.get(DEFAULT_PLAN_MAP, "flow-1", &ctx).await.unwrap(),
            Some("plan-body".to_string())
        );
    }

    #[tokio::test]
    async fn with_config_uses_the_configured_plan_map() {
        let gateway = Arc::new(RecordingCacheGateway::default());
        let mut config = CacheConfig::default();
        config.map_name = "custom-plan-map".to_string();
        let cache = DomainCache::with_config(gateway.clone(), &config);
        let ctx = HierarchicalContext::default();

        cache.put_plan("flow-1", "plan-body".to_string(), &ctx).await.unwrap();

        assert_eq!(
            gateway.get("custom-plan-map", "flow-1", &ctx).await.unwrap(),
            Some("plan-body".to_string())
        );
        assert_eq!(gateway.get(DEFAULT_PLAN_MAP, "flow-1", &ctx).await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_plan_and_remove_plan_round_trip() {
        let gateway = Arc::new(RecordingCacheGateway::default());
        let cache = DomainCache::new(gateway);
        let ctx = HierarchicalContext::default();

        assert_eq!(cache.get_plan("flow-1", &ctx).await.unwrap(), None);

        cache.put_plan("flow-1", "plan-body".to_string(), &ctx).await.unwrap();
        assert_eq!(cache.get_plan("flow-1", &ctx).await.unwrap(), Some("plan-body".to_string()));

        cache.remove_plan("flow-1", &ctx).await.unwrap();
        assert_eq!(cache.get_plan("flow-1", &ctx).await.unwrap(), None);
    }
}
