//! Walk through install, activation, an offline API call and the control
//! channel against a scripted network.
//!
//! cargo run -p sworker --example offline --features test-utils
//!
//! With `--features test-utils,observability` interceptor metrics are
//! pushed to the OTLP endpoint of the `metrics:` section.
use serde_json::json;
use std::sync::Arc;
use sworker::control::ControlMessage;
use sworker::prelude::*;
use sworker::test_utils::{RecordingScope, ScriptedNetwork};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sworker::observability::init_tracing("info")?;

    let config = WorkerConfig::from_yaml(
        r#"
origin: https://garage.example.com/
cache:
  version: 4
  max_entries: 50
retry:
  initial_delay_ms: 200
  max_delay_ms: 400
"#,
    )?;
    #[cfg(feature = "observability")]
    let _metrics = sworker::observability::init_metrics(&config.metrics)?;

    let store = Arc::new(config.cache.in_memory_store());
    store.open("carfix-api-v3").await?;

    let network = Arc::new(ScriptedNetwork::new());
    for path in ["/", "/index.html", "/offline.html", "/manifest.json"] {
        network.respond(
            config.resolve(path)?.as_str(),
            HttpResponse::html(200, format!("<p>{path}</p>")),
        );
    }
    let bookings = config.resolve("/api/repairing-service/bookings")?;
    network.respond(
        bookings.as_str(),
        HttpResponse::json(200, &json!([{"id": 1, "services": [{"id": 5, "price": "20.00"}]}])),
    );

    let worker = ServiceWorker::from_config(&config, store.clone(), network.clone())?;
    let lifecycle = worker.lifecycle(Arc::new(RecordingScope::with_clients(1)))?;
    let installed = lifecycle.on_install().await?;
    let activated = lifecycle.on_activate().await?;
    info!(seeded = installed.seeded.len(), deleted = ?activated.deleted, "worker active");

    let request = HttpRequest::get(bookings);
    if let FetchOutcome::Respond(response) = worker.handle_fetch(&request).await {
        info!(body = %response.body_text(), "online");
    }

    network.set_offline(true);
    if let FetchOutcome::Respond(response) = worker.handle_fetch(&request).await {
        info!(status = response.status, body = %response.body_text(), "offline");
    }

    let (control, _task) = worker.spawn_control_server();
    for message in [
        ControlMessage::ping(),
        ControlMessage::cache_size(),
        ControlMessage::network_test(None),
        ControlMessage::clear_cache(None),
    ] {
        let reply = control.request(message.clone()).await?;
        info!(action = %message.action, reply = %serde_json::to_string(&reply)?, "control");
    }

    Ok(())
}
