pub mod config;
#[cfg(feature = "http")]
pub mod http;
pub mod network;
pub mod retry;

pub use config::{ConfigError, ConfigFile, Configurable, MetricsSettings, WorkerConfig};
pub use network::{NetworkClient, NetworkError};
pub use retry::{BoundedBackoff, RetryExecutor, RetryPolicy};

pub use backoff;
