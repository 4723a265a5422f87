//! Install and activation handling.
//!
//! The hosting runtime drives a [`LifecycleController`] through
//! `on_install` and `on_activate`. Install warms the static partition and
//! takes over immediately; activation sweeps partitions left by older
//! deploys and claims every open page.
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use sworker_cache::{
    CacheError, CacheMode, HttpRequest, PartitionRegistry, PartitionRole,
    PartitionStore,
};
use sworker_config::{NetworkClient, NetworkError};
use tracing::{info, instrument, warn};
use url::Url;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Scope operation rejected: {0}")]
    Rejected(String),
}

/// Host-side controls of the running instance.
#[async_trait]
pub trait WorkerScope: Send + Sync {
    /// Activate without waiting for pages served by the old instance.
    async fn skip_waiting(&self) -> Result<(), ScopeError>;

    /// Take control of every open page. Returns the number claimed.
    async fn claim_clients(&self) -> Result<usize, ScopeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Scope error: {0}")]
    Scope(#[from] ScopeError),
    #[error("Cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: LifecycleState,
    },
}

/// Per-asset outcome of the install-time warm-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub seeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    pub claimed: usize,
}

pub struct LifecycleController {
    registry: PartitionRegistry,
    store: Arc<dyn PartitionStore>,
    network: Arc<dyn NetworkClient>,
    scope: Arc<dyn WorkerScope>,
    assets: Vec<Url>,
    state: Mutex<LifecycleState>,
}

impl LifecycleController {
    pub fn new(
        registry: PartitionRegistry,
        store: Arc<dyn PartitionStore>,
        network: Arc<dyn NetworkClient>,
        scope: Arc<dyn WorkerScope>,
        assets: Vec<Url>,
    ) -> Self {
        Self {
            registry,
            store,
            network,
            scope,
            assets,
            state: Mutex::new(LifecycleState::Parsed),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(LifecycleState::Redundant)
    }

    fn transition(
        &self,
        action: &'static str,
        from: &[LifecycleState],
        to: LifecycleState,
    ) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().map_err(|_| LifecycleError::InvalidState {
            action,
            state: LifecycleState::Redundant,
        })?;
        if !from.contains(&*state) {
            return Err(LifecycleError::InvalidState {
                action,
                state: *state,
            });
        }
        *state = to;
        Ok(())
    }

    /// Seed every essential asset, then skip waiting. Assets are fetched
    /// independently; a failed one is reported and does not stop the rest.
    #[instrument(skip_all, fields(version = self.registry.version()))]
    pub async fn on_install(&self) -> Result<InstallReport, LifecycleError> {
        self.transition("install", &[LifecycleState::Parsed], LifecycleState::Installing)?;

        let partition = self.registry.name(PartitionRole::Static);
        if let Err(e) = self.store.open(&partition).await {
            self.transition("install", &[LifecycleState::Installing], LifecycleState::Redundant)?;
            return Err(e.into());
        }

        let mut report = InstallReport::default();
        for url in &self.assets {
            match self.seed(&partition, url).await {
                Ok(()) => {
                    info!(url = %url, "seeded asset");
                    report.seeded.push(url.to_string());
                }
                Err(reason) => {
                    warn!(url = %url, reason = %reason, "failed to seed asset");
                    report.failed.push((url.to_string(), reason));
                }
            }
        }

        self.transition("install", &[LifecycleState::Installing], LifecycleState::Installed)?;
        self.scope.skip_waiting().await?;
        info!(
            seeded = report.seeded.len(),
            failed = report.failed.len(),
            "install finished"
        );
        Ok(report)
    }

    async fn seed(&self, partition: &str, url: &Url) -> Result<(), String> {
        let request = HttpRequest::get(url.clone()).with_cache(CacheMode::Reload);
        let response = self
            .network
            .fetch(&request)
            .await
            .map_err(|e: NetworkError| e.to_string())?;
        if !response.is_success() {
            return Err(format!("HTTP status {}", response.status));
        }
        self.store
            .put(partition, &request, response)
            .await
            .map_err(|e| e.to_string())
    }

    /// Delete partitions of other versions, then claim open pages.
    #[instrument(skip_all, fields(version = self.registry.version()))]
    pub async fn on_activate(&self) -> Result<ActivationReport, LifecycleError> {
        self.transition("activate", &[LifecycleState::Installed], LifecycleState::Activating)?;

        let deleted = self.registry.sweep_stale(self.store.as_ref()).await?;
        let claimed = self.scope.claim_clients().await?;

        self.transition("activate", &[LifecycleState::Activating], LifecycleState::Activated)?;
        info!(deleted = deleted.len(), claimed, "activation finished");
        Ok(ActivationReport { deleted, claimed })
    }

    /// A newer instance took over.
    pub fn supersede(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = LifecycleState::Redundant;
        }
    }
}
