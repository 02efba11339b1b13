use serde::{Deserialize, Serialize};
use waypoint_common::config::RemoteServiceConfig;

/// One remote endpoint per manager named in the control surface. Each carries
/// its own retry policy since the managers are independently deployed
/// services in the domain this client was grounded on.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagerUrlsConfig {
    pub flow: RemoteServiceConfig,
    pub workflow: RemoteServiceConfig,
    pub step: RemoteServiceConfig,
    pub assignment: RemoteServiceConfig,
    pub address: RemoteServiceConfig,
    pub delivery: RemoteServiceConfig,
    pub plugin: RemoteServiceConfig,
    pub schema: RemoteServiceConfig,
}

impl Default for ManagerUrlsConfig {
    fn default() -> Self {
        Self {
            flow: RemoteServiceConfig::new("127.0.0.1", 9001),
            workflow: RemoteServiceConfig::new("127.0.0.1", 9002),
            step: RemoteServiceConfig::new("127.0.0.1", 9003),
            assignment: RemoteServiceConfig::new("127.0.0.1", 9004),
            address: RemoteServiceConfig::new("127.0.0.1", 9005),
            delivery: RemoteServiceConfig::new("127.0.0.1", 9006),
            plugin: RemoteServiceConfig::new("127.0.0.1", 9007),
            schema: RemoteServiceConfig::new("127.0.0.1", 9008),
        }
    }
}
