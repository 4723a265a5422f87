use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[cfg(feature = "observability")]
pub use metrics::{InterceptMetrics, MetricsHandle, init_metrics};

/// Install a fmt subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Returns an error when a global subscriber is already set.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;
    Ok(())
}

#[cfg(feature = "observability")]
mod metrics {
    use std::time::Duration;

    use opentelemetry::{
        KeyValue, global,
        metrics::{Counter, Histogram},
    };
    use opentelemetry_otlp::{ExportConfig, WithExportConfig};
    use opentelemetry_sdk::{
        Resource,
        metrics::{PeriodicReader, SdkMeterProvider},
    };
    use sworker_config::MetricsSettings;
    use sworker_router::StrategyKind;

    /// Owns the meter provider installed by `init_metrics`. Dropping it
    /// flushes what is still buffered.
    pub struct MetricsHandle {
        provider: Option<SdkMeterProvider>,
    }

    impl MetricsHandle {
        /// Flush and stop the exporter, reporting export failures.
        pub fn shutdown(mut self) -> anyhow::Result<()> {
            match self.provider.take() {
                Some(provider) => Ok(provider.shutdown()?),
                None => Ok(()),
            }
        }
    }

    impl Drop for MetricsHandle {
        fn drop(&mut self) {
            if let Some(provider) = self.provider.take() {
                if let Err(e) = provider.shutdown() {
                    tracing::debug!(error = %e, "metrics flush on drop failed");
                }
            }
        }
    }

    /// Export interceptor metrics over OTLP HTTP as configured in the
    /// `metrics:` section, and make the provider global so
    /// `InterceptMetrics` picks it up.
    pub fn init_metrics(settings: &MetricsSettings) -> anyhow::Result<MetricsHandle> {
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_http()
            .with_export_config(ExportConfig {
                endpoint: Some(settings.endpoint.clone()),
                ..Default::default()
            })
            .build()?;

        let provider = SdkMeterProvider::builder()
            .with_reader(
                PeriodicReader::builder(exporter)
                    .with_interval(settings.export_interval())
                    .build(),
            )
            .with_resource(
                Resource::builder()
                    .with_service_name(settings.service_name.clone())
                    .with_attributes([KeyValue::new(
                        "sworker.version",
                        env!("CARGO_PKG_VERSION"),
                    )])
                    .build(),
            )
            .build();
        global::set_meter_provider(provider.clone());
        tracing::info!(
            endpoint = %settings.endpoint,
            service = %settings.service_name,
            "exporting metrics"
        );

        Ok(MetricsHandle {
            provider: Some(provider),
        })
    }

    /// Per-strategy counters of the fetch interceptor.
    #[derive(Clone)]
    pub struct InterceptMetrics {
        requests: Counter<u64>,
        passthrough: Counter<u64>,
        latency_ms: Histogram<f64>,
    }

    impl InterceptMetrics {
        pub fn new() -> Self {
            let meter = global::meter("sworker.intercept");
            let requests = meter
                .u64_counter("sworker_requests_total")
                .with_description("Intercepted requests handled by a strategy")
                .build();
            let passthrough = meter
                .u64_counter("sworker_passthrough_total")
                .with_description("Requests handed back to the host network")
                .build();
            let latency_ms = meter
                .f64_histogram("sworker_handle_latency_ms")
                .with_unit("ms")
                .with_description("Time spent producing a response")
                .build();
            Self {
                requests,
                passthrough,
                latency_ms,
            }
        }

        pub fn record(&self, kind: StrategyKind, status: u16, latency: Duration) {
            let attrs = [
                KeyValue::new("strategy", kind.as_str()),
                KeyValue::new("status", i64::from(status)),
            ];
            self.requests.add(1, &attrs);
            self.latency_ms
                .record(latency.as_secs_f64() * 1000.0, &attrs[..1]);
        }

        pub fn record_passthrough(&self, kind: Option<StrategyKind>) {
            let strategy = kind.map(|k| k.as_str()).unwrap_or("none");
            self.passthrough
                .add(1, &[KeyValue::new("strategy", strategy)]);
        }
    }

    impl Default for InterceptMetrics {
        fn default() -> Self {
            Self::new()
        }
    }

}
