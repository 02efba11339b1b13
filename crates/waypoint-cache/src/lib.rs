pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;

pub use config::CacheConfig;
pub use error::CacheError;
pub use gateway::{CacheGateway, CacheTtl, DomainCache, FredCacheGateway, DEFAULT_PLAN_MAP, HEALTH_MAP};
pub use metrics::CacheMetrics;
