//! The fetch interceptor: classify, dispatch to a strategy, answer.
use crate::control::{self, ControlHandle, ControlServer};
use crate::lifecycle::{LifecycleController, WorkerScope};
#[cfg(feature = "observability")]
use crate::observability::InterceptMetrics;
use crate::strategy::{
    ApiStrategy, FontStrategy, ImageStrategy, NetworkFirstStrategy, OfflinePage, Partition,
    StaticShellStrategy, Strategy,
};
use std::sync::Arc;
use sworker_cache::{HttpRequest, HttpResponse, PartitionRegistry, PartitionRole, PartitionStore};
use sworker_config::{ConfigError, NetworkClient, RetryExecutor, WorkerConfig};
use sworker_router::{RequestClassifier, Route, StrategyKind};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid classifier rule: {0}")]
    Classifier(#[from] regex::Error),
}

/// What the host should do with an intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Respond(HttpResponse),
    /// Not handled here; the host performs a plain network fetch
    Passthrough,
}

pub struct ServiceWorker {
    config: WorkerConfig,
    registry: PartitionRegistry,
    classifier: RequestClassifier,
    store: Arc<dyn PartitionStore>,
    network: Arc<dyn NetworkClient>,
    static_shell: StaticShellStrategy,
    api: ApiStrategy,
    image: ImageStrategy,
    font: FontStrategy,
    page: NetworkFirstStrategy,
    fallback: NetworkFirstStrategy,
    #[cfg(feature = "observability")]
    metrics: InterceptMetrics,
}

impl ServiceWorker {
    pub fn from_config(
        config: &WorkerConfig,
        store: Arc<dyn PartitionStore>,
        network: Arc<dyn NetworkClient>,
    ) -> Result<Self, WorkerError> {
        let registry = PartitionRegistry::new(&config.cache.prefix, config.cache.version);
        let partition = |role| Partition::new(store.clone(), registry.name(role));

        let classifier = RequestClassifier::builder(config.origin.clone())
            .font_css_host(&config.routes.font_css_host)
            .font_cdn_hosts(config.routes.font_cdn_hosts.clone())
            .api_segment(&config.routes.api_segment)
            .static_paths(config.assets.essential.clone())
            .build()?;

        let statics = partition(PartitionRole::Static);
        let offline = OfflinePage::new(statics.clone(), config.resolve(&config.assets.offline_page)?);

        let static_shell =
            StaticShellStrategy::new(statics.clone(), network.clone(), offline.clone());
        let api = ApiStrategy::new(
            partition(PartitionRole::Api),
            network.clone(),
            RetryExecutor::new(config.retry.policy()),
            &config.routes.booking_listing,
        );
        let image = ImageStrategy::new(
            partition(PartitionRole::Images),
            network.clone(),
            statics.clone(),
            config.resolve(&config.assets.placeholder_image)?,
        );
        let font = FontStrategy::new(partition(PartitionRole::Fonts), network.clone());
        let page = NetworkFirstStrategy::page(statics.clone(), network.clone(), offline);
        let fallback = NetworkFirstStrategy::fallback(statics, network.clone());

        Ok(Self {
            config: config.clone(),
            registry,
            classifier,
            store,
            network,
            static_shell,
            api,
            image,
            font,
            page,
            fallback,
            #[cfg(feature = "observability")]
            metrics: InterceptMetrics::new(),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn registry(&self) -> &PartitionRegistry {
        &self.registry
    }

    pub fn classifier(&self) -> &RequestClassifier {
        &self.classifier
    }

    pub fn store(&self) -> Arc<dyn PartitionStore> {
        self.store.clone()
    }

    /// Lifecycle handlers seeding this worker's essential assets.
    pub fn lifecycle(
        &self,
        scope: Arc<dyn WorkerScope>,
    ) -> Result<LifecycleController, WorkerError> {
        let assets = self
            .config
            .assets
            .essential
            .iter()
            .map(|path| self.config.resolve(path))
            .collect::<Result<Vec<Url>, _>>()?;
        Ok(LifecycleController::new(
            self.registry.clone(),
            self.store.clone(),
            self.network.clone(),
            scope,
            assets,
        ))
    }

    pub fn control_server(&self) -> ControlServer {
        ControlServer::new(
            self.registry.clone(),
            self.store.clone(),
            self.network.clone(),
            self.config.origin.clone(),
            &self.config.control,
        )
    }

    /// Run this worker's control server on its own task, with a channel
    /// sized by `control.channel_buffer`.
    pub fn spawn_control_server(&self) -> (ControlHandle, JoinHandle<()>) {
        control::spawn_control_server(
            Arc::new(self.control_server()),
            self.config.control.channel_buffer,
        )
    }

    fn strategy(&self, kind: StrategyKind) -> &dyn Strategy {
        match kind {
            StrategyKind::StaticShell => &self.static_shell,
            StrategyKind::Api => &self.api,
            StrategyKind::Image => &self.image,
            StrategyKind::Font => &self.font,
            StrategyKind::Page => &self.page,
            StrategyKind::Default => &self.fallback,
        }
    }

    /// Answer an intercepted request. Never fails: a strategy error hands
    /// the request back to the host.
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn handle_fetch(&self, request: &HttpRequest) -> FetchOutcome {
        let kind = match self.classifier.classify(request) {
            Route::Passthrough => {
                debug!("not intercepted");
                #[cfg(feature = "observability")]
                self.metrics.record_passthrough(None);
                return FetchOutcome::Passthrough;
            }
            Route::Intercept(kind) => kind,
        };

        #[cfg(feature = "observability")]
        let started = std::time::Instant::now();

        match self.strategy(kind).handle(request).await {
            Ok(response) => {
                debug!(strategy = %kind, status = response.status, "responding");
                #[cfg(feature = "observability")]
                self.metrics.record(kind, response.status, started.elapsed());
                FetchOutcome::Respond(response)
            }
            Err(e) => {
                warn!(strategy = %kind, error = %e, "strategy failed, passing through");
                #[cfg(feature = "observability")]
                self.metrics.record_passthrough(Some(kind));
                FetchOutcome::Passthrough
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlMessage;
    use crate::test_utils::ScriptedNetwork;
    use sworker_cache::InMemoryPartitionStore;

    fn worker(network: Arc<ScriptedNetwork>) -> ServiceWorker {
        let config = WorkerConfig {
            origin: Url::parse("https://garage.test/").unwrap(),
            ..WorkerConfig::default()
        };
        ServiceWorker::from_config(&config, Arc::new(InMemoryPartitionStore::new()), network)
            .unwrap()
    }

    #[tokio::test]
    async fn test_non_get_passes_through() {
        let network = Arc::new(ScriptedNetwork::new());
        let worker = worker(network.clone());
        let req = HttpRequest::new(
            "POST",
            Url::parse("https://garage.test/api/bookings").unwrap(),
        );

        assert_eq!(worker.handle_fetch(&req).await, FetchOutcome::Passthrough);
        assert!(network.calls().is_empty());
    }

    #[tokio::test]
    async fn test_font_failure_passes_through() {
        let network = Arc::new(ScriptedNetwork::new());
        network.set_offline(true);
        let worker = worker(network);
        let req = HttpRequest::parse_get("https://fonts.gstatic.com/s/inter.woff2").unwrap();

        assert_eq!(worker.handle_fetch(&req).await, FetchOutcome::Passthrough);
    }

    #[tokio::test]
    async fn test_manifest_is_served_by_static_shell() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond("https://garage.test/manifest.json", HttpResponse::new(200, "{}"));
        let worker = worker(network);
        let req = HttpRequest::parse_get("https://garage.test/manifest.json").unwrap();

        assert_eq!(
            worker.classifier().classify(&req),
            Route::Intercept(StrategyKind::StaticShell)
        );
        assert!(matches!(worker.handle_fetch(&req).await, FetchOutcome::Respond(r) if r.body_text() == "{}"));
        assert_eq!(
            worker
                .store()
                .entry_count(&worker.registry().name(PartitionRole::Static))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_control_server_uses_configured_buffer() {
        let config = WorkerConfig::from_yaml(
            "origin: https://garage.test/\ncontrol:\n  channel_buffer: 1",
        )
        .unwrap();
        let worker = ServiceWorker::from_config(
            &config,
            Arc::new(InMemoryPartitionStore::new()),
            Arc::new(ScriptedNetwork::new()),
        )
        .unwrap();
        let (handle, task) = worker.spawn_control_server();

        let mut pending = Vec::new();
        for _ in 0..3 {
            let handle = handle.clone();
            pending.push(tokio::spawn(async move {
                handle.request(ControlMessage::ping()).await
            }));
        }
        for reply in pending {
            assert!(reply.await.unwrap().unwrap().success);
        }

        drop(handle);
        task.await.unwrap();
    }
}
