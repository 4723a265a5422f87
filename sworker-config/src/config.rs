use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::{fs, path, time::Duration};
use sworker_cache::InMemoryPartitionStore;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
    #[error("Missing config field: {0}")]
    Missing(String),
    #[error("Invalid URL in config: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

pub trait Configurable {
    fn config(&self) -> &serde_yaml::Value;

    // read configuration from yaml config
    fn load_config(
        config_file_path: impl AsRef<path::Path>,
    ) -> Result<serde_yaml::Value, ConfigError> {
        let content: String = fs::read_to_string(config_file_path)?;
        let config: serde_yaml::Value = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Extract Value from config using dot notation i.e. "worker.cache.version"
    fn get_config_value(&self, key: &str) -> Option<&serde_yaml::Value> {
        let keys: Vec<&str> = key.split('.').collect();
        Self::get_value_recursive(self.config(), &keys)
    }

    fn get_value_recursive<'a>(
        config: &'a serde_yaml::Value,
        keys: &[&str],
    ) -> Option<&'a serde_yaml::Value> {
        let (key, remaining_keys) = keys.split_first()?;
        if key.is_empty() {
            return None;
        }

        match config {
            serde_yaml::Value::Mapping(map) => {
                let value = map.get(serde_yaml::Value::String(key.to_string()))?;
                if remaining_keys.is_empty() {
                    Some(value)
                } else {
                    Self::get_value_recursive(value, remaining_keys)
                }
            }
            _ => None,
        }
    }
}

/// A loaded YAML config file with a `worker:` section and an optional
/// `http:` section.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: serde_yaml::Value,
}

impl Configurable for ConfigFile {
    fn config(&self) -> &serde_yaml::Value {
        &self.config
    }
}

impl ConfigFile {
    pub fn open(path: impl AsRef<path::Path>) -> Result<Self, ConfigError> {
        Ok(Self {
            config: Self::load_config(path)?,
        })
    }

    pub fn from_value(config: serde_yaml::Value) -> Self {
        Self { config }
    }

    /// Typed worker settings; a missing section yields the defaults.
    pub fn worker(&self) -> Result<WorkerConfig, ConfigError> {
        match self.get_config_value("worker") {
            Some(section) => WorkerConfig::from_value(section),
            None => Ok(WorkerConfig::default()),
        }
    }
}

/// Settings of the interception layer, every field defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Origin the application is served from
    pub origin: Url,
    pub cache: CacheSettings,
    pub assets: AssetSettings,
    pub routes: RouteSettings,
    pub retry: RetrySettings,
    pub control: ControlSettings,
    pub reset: ResetSettings,
    pub metrics: MetricsSettings,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: Url::parse("http://localhost:3000/")
                .expect("Failed to parse default origin"),
            cache: CacheSettings::default(),
            assets: AssetSettings::default(),
            routes: RouteSettings::default(),
            retry: RetrySettings::default(),
            control: ControlSettings::default(),
            reset: ResetSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl WorkerConfig {
    pub fn from_value(value: &serde_yaml::Value) -> Result<Self, ConfigError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_value(value.clone())?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(&value)
    }

    /// Absolute URL of a root-relative asset path.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        Ok(self.origin.join(path)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub prefix: String,
    pub version: u32,
    /// Per-partition entry limit for the in-memory store
    pub max_entries: Option<usize>,
}

impl CacheSettings {
    /// In-memory store enforcing `max_entries` when set.
    pub fn in_memory_store(&self) -> InMemoryPartitionStore {
        match self.max_entries {
            Some(limit) => InMemoryPartitionStore::with_quota(limit),
            None => InMemoryPartitionStore::new(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            prefix: "carfix".to_string(),
            version: 3,
            max_entries: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Root-relative paths seeded into the static partition on install
    pub essential: Vec<String>,
    pub offline_page: String,
    pub placeholder_image: String,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            essential: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/offline.html".to_string(),
                "/manifest.json".to_string(),
            ],
            offline_page: "/offline.html".to_string(),
            placeholder_image: "/images/placeholder.svg".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    pub api_segment: String,
    pub booking_listing: String,
    pub font_css_host: String,
    pub font_cdn_hosts: Vec<String>,
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            api_segment: "/api/".to_string(),
            booking_listing: "/api/repairing-service/bookings".to_string(),
            font_css_host: "fonts.googleapis.com".to_string(),
            font_cdn_hosts: vec!["fonts.gstatic.com".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    pub reply_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub channel_buffer: usize,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 5000,
            probe_timeout_ms: 5000,
            channel_buffer: 16,
        }
    }
}

impl ControlSettings {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetSettings {
    pub control_timeout_ms: u64,
    /// Page storage keys that survive a reset
    pub preserved_keys: Vec<String>,
}

impl Default for ResetSettings {
    fn default() -> Self {
        Self {
            control_timeout_ms: 3000,
            preserved_keys: vec![
                "token".to_string(),
                "refreshToken".to_string(),
                "user".to_string(),
            ],
        }
    }
}

impl ResetSettings {
    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }
}

/// OTLP export of interceptor metrics (only read with the
/// `observability` feature of `sworker`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub service_name: String,
    /// Base OTLP HTTP endpoint
    pub endpoint: String,
    pub export_interval_ms: u64,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            service_name: "sworker".to_string(),
            endpoint: "http://127.0.0.1:4318".to_string(),
            export_interval_ms: 5000,
        }
    }
}

impl MetricsSettings {
    pub fn export_interval(&self) -> Duration {
        Duration::from_millis(self.export_interval_ms)
    }
}
