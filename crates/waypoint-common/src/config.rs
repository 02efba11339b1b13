use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Marker bound satisfied by every config struct loadable through [`ConfigLoader`].
pub trait ConfigLoaderConfig: DeserializeOwned + Serialize + Default {}
impl<T: DeserializeOwned + Serialize + Default> ConfigLoaderConfig for T {}

pub struct ConfigExample<T> {
    pub name: &'static str,
    pub config: T,
}

/// Implemented by every top-level config so `--dump-config` can print a few
/// annotated starting points alongside the defaults actually loaded.
pub trait HasConfigExamples<T> {
    fn examples() -> Vec<ConfigExample<T>>;
}

/// Loads a config struct by layering a TOML file over compiled-in defaults, then
/// letting environment variables (`WAYPOINT__section__key`) override both.
pub struct ConfigLoader<T> {
    pub config_file_name: PathBuf,
    _marker: std::marker::PhantomData<T>,
}

impl<T: ConfigLoaderConfig> ConfigLoader<T> {
    pub fn new_with_examples(config_file_name: &Path) -> ConfigLoader<T> {
        ConfigLoader {
            config_file_name: config_file_name.to_path_buf(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn load(&self) -> figment::Result<T> {
        Figment::from(Serialized::defaults(T::default()))
            .merge(Toml::file(&self.config_file_name))
            .merge(Env::prefixed("WAYPOINT__").split("__"))
            .extract()
    }

    /// Mirrors the teacher's binary-entrypoint convention: if invoked with
    /// `--dump-config`, print the loaded config as TOML and return `None` so the
    /// caller exits without starting the server; otherwise load normally.
    pub fn load_or_dump_config(&self) -> Option<T> {
        if std::env::args().any(|arg| arg == "--dump-config") {
            let config = self.load().expect("Failed to load config for dumping");
            println!(
                "{}",
                toml::to_string_pretty(&config).expect("Failed to serialize config")
            );
            None
        } else {
            Some(self.load().expect("Failed to load config"))
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TracingConfig {
    pub service_name: String,
    pub format: TracingFormat,
    pub default_level: String,
}

impl TracingConfig {
    /// Pretty, stdout, info-level tracing for local development — mirrors the
    /// teacher's `TracingConfig::local_dev` constructor.
    pub fn local_dev(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            format: TracingFormat::Pretty,
            default_level: "info".to_string(),
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::local_dev("waypoint")
    }
}

/// A remote HTTP collaborator's address plus the retry policy used to call it.
/// Shared shape for every manager URL and for the cache/bus endpoints.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RemoteServiceConfig {
    pub host: String,
    pub port: u16,
    pub retries: RetryConfig,
}

impl RemoteServiceConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            retries: RetryConfig::default(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
