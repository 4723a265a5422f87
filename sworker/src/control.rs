//! Operator commands sent from the page: clear caches, measure them, probe
//! the network, ping. Every request gets exactly one reply within the
//! configured reply timeout.
use crate::healthcheck;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::{sync::Arc, time::Duration};
use sworker_cache::{CacheError, PartitionRegistry, PartitionStore};
use sworker_config::{NetworkClient, config::ControlSettings};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum ControlError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Malformed control message: {0}")]
    Malformed(String),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Control channel closed")]
    ChannelClosed,
    #[error("Control reply dropped")]
    ReplyDropped,
    #[error("No reply within {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    ClearCache,
    NetworkTest,
    CacheSize,
    Ping,
}

impl ControlAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "clearCache" => Some(ControlAction::ClearCache),
            "networkTest" => Some(ControlAction::NetworkTest),
            "cacheSize" => Some(ControlAction::CacheSize),
            "ping" => Some(ControlAction::Ping),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::ClearCache => "clearCache",
            ControlAction::NetworkTest => "networkTest",
            ControlAction::CacheSize => "cacheSize",
            ControlAction::Ping => "ping",
        }
    }
}

/// `{action, cacheName?, url?}` as posted by the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlMessage {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ControlMessage {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            cache_name: None,
            url: None,
        }
    }

    /// Clear one partition, or all of them when `cache_name` is `None`.
    pub fn clear_cache(cache_name: Option<&str>) -> Self {
        Self {
            cache_name: cache_name.map(str::to_string),
            ..Self::new(ControlAction::ClearCache.as_str())
        }
    }

    pub fn network_test(url: Option<&str>) -> Self {
        Self {
            url: url.map(str::to_string),
            ..Self::new(ControlAction::NetworkTest.as_str())
        }
    }

    pub fn cache_size() -> Self {
        Self::new(ControlAction::CacheSize.as_str())
    }

    pub fn ping() -> Self {
        Self::new(ControlAction::Ping.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlReply {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

pub struct ControlServer {
    registry: PartitionRegistry,
    store: Arc<dyn PartitionStore>,
    network: Arc<dyn NetworkClient>,
    origin: Url,
    reply_timeout: Duration,
    probe_timeout: Duration,
}

impl ControlServer {
    pub fn new(
        registry: PartitionRegistry,
        store: Arc<dyn PartitionStore>,
        network: Arc<dyn NetworkClient>,
        origin: Url,
        settings: &ControlSettings,
    ) -> Self {
        Self {
            registry,
            store,
            network,
            origin,
            reply_timeout: settings.reply_timeout(),
            probe_timeout: settings.probe_timeout(),
        }
    }

    /// Run one action. Failures and timeouts become failure replies.
    #[instrument(skip(self), fields(action = %message.action))]
    pub async fn handle(&self, message: ControlMessage) -> ControlReply {
        match tokio::time::timeout(self.reply_timeout, self.dispatch(&message)).await {
            Ok(Ok(result)) => ControlReply::ok(result),
            Ok(Err(e)) => {
                warn!(error = %e, "control action failed");
                ControlReply::failure(e.to_string())
            }
            Err(_) => {
                warn!("control action timed out");
                ControlReply::failure(ControlError::TimedOut(self.reply_timeout).to_string())
            }
        }
    }

    /// Like [`ControlServer::handle`] for a raw JSON message.
    pub async fn handle_json(&self, message: Value) -> ControlReply {
        match serde_json::from_value::<ControlMessage>(message) {
            Ok(message) => self.handle(message).await,
            Err(e) => ControlReply::failure(ControlError::Malformed(e.to_string()).to_string()),
        }
    }

    async fn dispatch(&self, message: &ControlMessage) -> Result<Value, ControlError> {
        let action = ControlAction::parse(&message.action)
            .ok_or_else(|| ControlError::UnknownAction(message.action.clone()))?;
        match action {
            ControlAction::ClearCache => self.clear_cache(message.cache_name.as_deref()).await,
            ControlAction::NetworkTest => self.network_test(message.url.as_deref()).await,
            ControlAction::CacheSize => self.cache_size().await,
            ControlAction::Ping => Ok(json!({"pong": true, "version": self.registry.version()})),
        }
    }

    async fn clear_cache(&self, cache_name: Option<&str>) -> Result<Value, ControlError> {
        match cache_name {
            Some(name) => {
                let deleted = self.store.delete(name).await?;
                info!(partition = name, deleted, "cleared cache partition");
                Ok(json!({"cacheName": name, "deleted": deleted}))
            }
            None => {
                let cleared = self.store.clear_all().await?;
                info!(cleared, "cleared all cache partitions");
                Ok(json!({"cleared": cleared}))
            }
        }
    }

    async fn network_test(&self, url: Option<&str>) -> Result<Value, ControlError> {
        let target = match url {
            Some(url) => self.origin.join(url)?,
            None => self.origin.clone(),
        };
        let report = healthcheck::probe(self.network.as_ref(), &target, self.probe_timeout).await;
        Ok(serde_json::to_value(report)?)
    }

    async fn cache_size(&self) -> Result<Value, ControlError> {
        let mut caches = Map::new();
        let mut total = 0;
        for name in self.store.partitions().await? {
            let count = self.store.entry_count(&name).await?;
            total += count;
            caches.insert(name, Value::from(count));
        }
        Ok(json!({"caches": caches, "total": total}))
    }
}

/// A message plus the channel its single reply goes to.
#[derive(Debug)]
pub struct ControlRequest {
    pub message: ControlMessage,
    pub reply: oneshot::Sender<ControlReply>,
}

/// Page-side end of the control channel.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlRequest>,
}

impl ControlHandle {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ControlRequest>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    /// Send a message and wait for its reply.
    pub async fn request(&self, message: ControlMessage) -> Result<ControlReply, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControlRequest { message, reply })
            .await
            .map_err(|_| ControlError::ChannelClosed)?;
        rx.await.map_err(|_| ControlError::ReplyDropped)
    }
}

/// Serve control requests until every handle is dropped. Requests run
/// concurrently so a slow probe does not hold up a ping.
pub fn spawn_control_server(
    server: Arc<ControlServer>,
    buffer: usize,
) -> (ControlHandle, JoinHandle<()>) {
    let (handle, mut rx) = ControlHandle::channel(buffer);
    let task = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let server = server.clone();
            tokio::spawn(async move {
                let reply = server.handle(request.message).await;
                if request.reply.send(reply).is_err() {
                    debug!("control requester went away before the reply");
                }
            });
        }
        debug!("control channel closed");
    });
    (handle, task)
}
