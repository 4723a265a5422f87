//! Page-side full reset: caches, page storage, registration, reload.
//!
//! Used when cached data looks corrupted. The steps run in strict order
//! behind a blocking overlay; the first failure replaces the overlay with
//! an error and a manual reload control.
use crate::control::{ControlHandle, ControlMessage};
use async_trait::async_trait;
use serde::Serialize;
use std::{fmt, sync::Arc, time::Duration};
use sworker_cache::{CacheError, PartitionStore};
use sworker_config::config::ResetSettings;
use tracing::{info, instrument, warn};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Registration error: {0}")]
    Registration(String),
    #[error("Reload failed: {0}")]
    Reload(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ResetError {
    #[error("Failed to clear caches: {0}")]
    Caches(#[from] CacheError),
    #[error("Failed to clear {area} storage: {source}")]
    Storage {
        area: &'static str,
        #[source]
        source: PageError,
    },
    #[error("Failed to unregister: {0}")]
    Unregister(#[source] PageError),
    #[error("Failed to reload: {0}")]
    Reload(#[source] PageError),
}

/// Key/value storage of the page (persistent or per-session).
pub trait PageStorage: Send + Sync {
    fn keys(&self) -> Result<Vec<String>, PageError>;
    fn remove_item(&self, key: &str) -> Result<(), PageError>;
}

/// Registrations of the interception layer for this page's origin.
#[async_trait]
pub trait Registrations: Send + Sync {
    /// Unregister every registration. Returns how many were removed.
    async fn unregister_all(&self) -> Result<usize, PageError>;
}

/// The visible page: overlay, error panel and reload.
pub trait PageHost: Send + Sync {
    fn show_overlay(&self, message: &str);
    fn update_overlay(&self, step: ResetStep);
    /// Replace the overlay with `message` and a manual reload control.
    fn show_error(&self, message: &str);
    fn reload(&self) -> Result<(), PageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResetStep {
    ClearingCaches,
    ClearingStorage,
    Unregistering,
    Reloading,
}

impl fmt::Display for ResetStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResetStep::ClearingCaches => "Clearing caches...",
            ResetStep::ClearingStorage => "Clearing stored data...",
            ResetStep::Unregistering => "Removing offline support...",
            ResetStep::Reloading => "Reloading...",
        })
    }
}

/// How the caches were cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheClearPath {
    ControlChannel,
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub caches: CacheClearPath,
    pub storage_keys_removed: usize,
    pub unregistered: usize,
}

pub struct ResetUtility {
    control: Option<ControlHandle>,
    store: Arc<dyn PartitionStore>,
    local: Arc<dyn PageStorage>,
    session: Arc<dyn PageStorage>,
    registrations: Arc<dyn Registrations>,
    host: Arc<dyn PageHost>,
    preserved_keys: Vec<String>,
    control_timeout: Duration,
}

impl ResetUtility {
    pub fn new(
        store: Arc<dyn PartitionStore>,
        local: Arc<dyn PageStorage>,
        session: Arc<dyn PageStorage>,
        registrations: Arc<dyn Registrations>,
        host: Arc<dyn PageHost>,
        settings: &ResetSettings,
    ) -> Self {
        Self {
            control: None,
            store,
            local,
            session,
            registrations,
            host,
            preserved_keys: settings.preserved_keys.clone(),
            control_timeout: settings.control_timeout(),
        }
    }

    /// Route cache clearing through a running control server first.
    pub fn with_control(mut self, control: ControlHandle) -> Self {
        self.control = Some(control);
        self
    }

    #[instrument(skip_all)]
    pub async fn run(&self) -> Result<ResetReport, ResetError> {
        self.host.show_overlay("Resetting application data...");
        match self.steps().await {
            Ok(report) => {
                info!(?report, "reset finished");
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "reset failed");
                self.host.show_error(&e.to_string());
                Err(e)
            }
        }
    }

    async fn steps(&self) -> Result<ResetReport, ResetError> {
        self.host.update_overlay(ResetStep::ClearingCaches);
        let caches = self.clear_caches().await?;

        self.host.update_overlay(ResetStep::ClearingStorage);
        let mut storage_keys_removed = self.clear_storage("local", self.local.as_ref())?;
        storage_keys_removed += self.clear_storage("session", self.session.as_ref())?;

        self.host.update_overlay(ResetStep::Unregistering);
        let unregistered = self
            .registrations
            .unregister_all()
            .await
            .map_err(ResetError::Unregister)?;

        self.host.update_overlay(ResetStep::Reloading);
        self.host.reload().map_err(ResetError::Reload)?;

        Ok(ResetReport {
            caches,
            storage_keys_removed,
            unregistered,
        })
    }

    async fn clear_caches(&self) -> Result<CacheClearPath, ResetError> {
        if let Some(control) = &self.control {
            let request = control.request(ControlMessage::clear_cache(None));
            match tokio::time::timeout(self.control_timeout, request).await {
                Ok(Ok(reply)) if reply.success => return Ok(CacheClearPath::ControlChannel),
                Ok(Ok(reply)) => {
                    warn!(error = ?reply.error, "control server failed to clear caches");
                }
                Ok(Err(e)) => warn!(error = %e, "control channel unavailable"),
                Err(_) => warn!(
                    timeout_ms = self.control_timeout.as_millis() as u64,
                    "control server did not answer"
                ),
            }
        }

        let removed = self.store.clear_all().await?;
        info!(removed, "deleted cache partitions directly");
        Ok(CacheClearPath::Direct)
    }

    fn clear_storage(
        &self,
        area: &'static str,
        storage: &dyn PageStorage,
    ) -> Result<usize, ResetError> {
        let keys = storage
            .keys()
            .map_err(|source| ResetError::Storage { area, source })?;
        let mut removed = 0;
        for key in keys {
            if self.preserved_keys.contains(&key) {
                continue;
            }
            storage
                .remove_item(&key)
                .map_err(|source| ResetError::Storage { area, source })?;
            removed += 1;
        }
        Ok(removed)
    }
}
