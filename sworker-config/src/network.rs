//! The network seam. Strategies never reach the network directly; they go
//! through an injected [`NetworkClient`] so tests can script failures.
use async_trait::async_trait;
use sworker_cache::{HttpRequest, HttpResponse};
use thiserror::Error;

/// A fetch that produced no response at all.
///
/// HTTP error statuses are not errors at this level: a 500 is a response
/// and comes back as `Ok`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn fetch(&self, request: &HttpRequest)
    -> Result<HttpResponse, NetworkError>;
}
