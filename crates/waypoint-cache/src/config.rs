use serde::{Deserialize, Serialize};
use waypoint_common::config::RetryConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Map name plans are stored under (`OrchestrationCache.MapName`, §6).
    pub map_name: String,
    pub put_retries: RetryConfig,
    /// TTL applied to non-plan entries (health snapshots). Plans are always
    /// written without an expiry; `Stop` is what removes them.
    #[serde(with = "humantime_serde")]
    pub default_ttl: std::time::Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            username: None,
            password: None,
            map_name: "orchestration-data".to_string(),
            put_retries: RetryConfig::default(),
            default_ttl: std::time::Duration::from_secs(3600),
        }
    }
}
