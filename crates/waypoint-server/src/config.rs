use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use waypoint_bus::BusConfig;
use waypoint_cache::CacheConfig;
use waypoint_common::config::{ConfigExample, ConfigLoader, HasConfigExamples};
use waypoint_common::config::TracingConfig;
use waypoint_core::{HealthGateConfig, SchedulerConfig};
use waypoint_manager_client::ManagerUrlsConfig;

/// The process-level config aggregating every sub-config named in §10.3:
/// manager URLs, the cache, the scheduler, the health gate, the bus, and
/// tracing, plus the `environment` tag that labels every metric.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub http_port: u16,
    pub environment: String,
    pub tracing: TracingConfig,
    pub manager_urls: ManagerUrlsConfig,
    pub cache: CacheConfig,
    pub bus: BusConfig,
    pub scheduler: SchedulerConfig,
    pub health_gate: HealthGateConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            http_port: 9000,
            environment: "dev".to_string(),
            tracing: TracingConfig::local_dev("waypoint-orchestrator"),
            manager_urls: ManagerUrlsConfig::default(),
            cache: CacheConfig::default(),
            bus: BusConfig::default(),
            scheduler: SchedulerConfig::default(),
            health_gate: HealthGateConfig::default(),
        }
    }
}

impl HasConfigExamples<OrchestratorConfig> for OrchestratorConfig {
    fn examples() -> Vec<ConfigExample<OrchestratorConfig>> {
        vec![]
    }
}

pub fn make_config_loader() -> ConfigLoader<OrchestratorConfig> {
    ConfigLoader::new_with_examples(&PathBuf::from("config/waypoint-orchestrator.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_is_loadable() {
        make_config_loader().load().expect("failed to load config");
    }
}
