use serde::{Deserialize, Serialize};
use waypoint_common::config::RetryConfig;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub publish_retries: RetryConfig,
    pub command_channel: String,
    pub completion_channel: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            username: None,
            password: None,
            publish_retries: RetryConfig::default(),
            command_channel: "waypoint.activity.execute".to_string(),
            completion_channel: "waypoint.activity.completed".to_string(),
        }
    }
}
