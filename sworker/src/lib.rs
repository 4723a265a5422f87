//! # sworker - offline-capable network interception cache
//!
//! `sworker` sits between an application's network stack and the
//! application itself. Every intercepted request is classified, routed to a
//! handling strategy and answered from the network, from a versioned cache
//! partition, or from a synthesized fallback. A failure inside the layer
//! never turns into a broken page load.
//!
//! ## Features
//!
//! - **Versioned partitions**: static shell, API, images and fonts each live
//!   in a partition named after the deployed version; activation sweeps
//!   everything else.
//! - **Strategies**: cache-first shell, network-first API with retries and
//!   booking-listing repair, cache-first images with background refresh,
//!   immutable fonts, network-first pages with an offline document.
//! - **Lifecycle**: install warms the shell and takes over immediately;
//!   activate purges stale partitions and claims open pages.
//! - **Control channel**: clear caches, measure them, probe the network,
//!   ping, each request answered exactly once.
//! - **Reset utility**: page-side recovery that clears caches, storage and
//!   the registration, then reloads.
//!
//! The host runtime is reached only through injected traits
//! ([`cache::PartitionStore`], [`config::NetworkClient`],
//! [`lifecycle::WorkerScope`], the page hooks in [`reset`]), so every path
//! can be driven with fakes.
//!
//! ## Modules
//!
//! - `booking`: normalization of booking-listing responses.
//! - `control`: control-channel messages, server and handle.
//! - `healthcheck`: network reachability probe.
//! - `lifecycle`: install and activation handling.
//! - `reset`: page-side full reset.
//! - `strategy`: per-partition request handling.
//! - `worker`: the fetch interceptor.
pub mod booking;
pub mod control;
pub mod healthcheck;
pub mod lifecycle;
pub mod observability;
pub mod prelude;
pub mod reset;
pub mod strategy;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod worker;

pub use sworker_cache as cache;
pub use sworker_config as config;
#[cfg(feature = "http")]
pub use sworker_config::http;
pub use sworker_router as router;
// re-export
pub use async_trait;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tracing;
pub use tracing_subscriber;
pub use url;
