use serde::Serialize;
use sworker_cache::{CacheMode, HttpRequest};
use sworker_config::NetworkClient;
use tokio::time::{Duration, Instant, timeout};
use url::Url;

/// Outcome of a reachability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub url: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Check whether `url` is reachable.
/// Sends an uncached HEAD request and measures the round trip; a 2xx
/// answer means reachable. Latency is reported either way.
pub async fn probe(
    network: &dyn NetworkClient,
    url: &Url,
    limit: Duration,
) -> ProbeReport {
    let request = HttpRequest::head(url.clone()).with_cache(CacheMode::NoStore);
    let started = Instant::now();
    let outcome = timeout(limit, network.fetch(&request)).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    let (reachable, status, error) = match outcome {
        Ok(Ok(response)) => {
            let reachable = response.is_success();
            if !reachable {
                tracing::warn!(url = %url, status = response.status, "healthcheck unexpected response status");
            }
            (reachable, Some(response.status), None)
        }
        Ok(Err(e)) => {
            tracing::warn!(url = %url, error = %e, "healthcheck request failed");
            (false, None, Some(e.to_string()))
        }
        Err(_) => {
            tracing::error!(url = %url, "healthcheck request timed out");
            (
                false,
                None,
                Some(format!("timed out after {}ms", limit.as_millis())),
            )
        }
    };

    ProbeReport {
        url: url.to_string(),
        reachable,
        status,
        latency_ms,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedNetwork;
    use sworker_cache::HttpResponse;

    const HOME: &str = "https://garage.test/";

    #[tokio::test(start_paused = true)]
    async fn test_probe_reachable() {
        let network = ScriptedNetwork::new();
        network.respond(HOME, HttpResponse::new(200, ""));
        network.set_delay(Duration::from_millis(40));

        let report = probe(&network, &Url::parse(HOME).unwrap(), Duration::from_secs(5)).await;

        assert!(report.reachable);
        assert_eq!(report.status, Some(200));
        assert_eq!(report.latency_ms, 40);
        let sent = &network.calls()[0];
        assert_eq!(sent.method, "HEAD");
        assert_eq!(sent.cache, CacheMode::NoStore);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_status_is_unreachable() {
        let network = ScriptedNetwork::new();
        network.respond(HOME, HttpResponse::new(502, ""));

        let report = probe(&network, &Url::parse(HOME).unwrap(), Duration::from_secs(5)).await;
        assert!(!report.reachable);
        assert_eq!(report.status, Some(502));
        assert_eq!(report.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_transport_failure_and_timeout() {
        let network = ScriptedNetwork::new();
        network.set_offline(true);
        let url = Url::parse(HOME).unwrap();

        let report = probe(&network, &url, Duration::from_secs(5)).await;
        assert!(!report.reachable);
        assert!(report.error.unwrap().contains("offline"));

        network.set_offline(false);
        network.respond(HOME, HttpResponse::new(200, ""));
        network.set_delay(Duration::from_secs(10));
        let report = probe(&network, &url, Duration::from_secs(5)).await;
        assert!(!report.reachable);
        assert_eq!(report.latency_ms, 5000);
        assert_eq!(report.error.as_deref(), Some("timed out after 5000ms"));
    }
}
