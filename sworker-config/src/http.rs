//! reqwest-backed [`NetworkClient`] for real deployments.
//!
//! # Example
//! ```no_run
//! use sworker_config::http::{HttpClientParams, ReqwestNetworkClient};
//! use serde_yaml::Value;
//!
//! let config: Value = serde_yaml::from_str(r#"
//! http:
//!     timeout: 30
//!     connect_timeout: 10
//!     user_agent: sworker/0.3
//! "#).unwrap();
//!
//! let params = HttpClientParams::from_config(&config["http"]).unwrap();
//! let client = ReqwestNetworkClient::new(params).unwrap();
//! ```
use crate::config::ConfigError;
use crate::network::{NetworkClient, NetworkError};
use async_trait::async_trait;
use std::time::Duration;
use sworker_cache::{CacheMode, HttpRequest, HttpResponse};

const DEFAULT_USER_AGENT: &str = concat!("sworker/", env!("CARGO_PKG_VERSION"));

/// Parameters for configuring an HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientParams {
    pub timeout: u64,
    pub connect_timeout: u64,
    pub user_agent: String,
}

impl Default for HttpClientParams {
    fn default() -> Self {
        Self {
            timeout: 30,
            connect_timeout: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpClientParams {
    /// Creates an HttpClientParams instance from a YAML configuration.
    ///
    /// The configuration should follow this structure:
    /// ```yaml
    /// http:
    ///     timeout: 30
    ///     connect_timeout: 10
    ///     user_agent: sworker/0.3
    /// ```
    /// `timeout` and `connect_timeout` are required, `user_agent` is not.
    pub fn from_config(http_config: &serde_yaml::Value) -> Result<Self, ConfigError> {
        let timeout = http_config["timeout"]
            .as_u64()
            .ok_or_else(|| ConfigError::Missing("http.timeout".to_string()))?;
        let connect_timeout = http_config["connect_timeout"]
            .as_u64()
            .ok_or_else(|| ConfigError::Missing("http.connect_timeout".to_string()))?;
        let user_agent = http_config["user_agent"]
            .as_str()
            .unwrap_or(DEFAULT_USER_AGENT)
            .to_string();

        Ok(Self {
            timeout,
            connect_timeout,
            user_agent,
        })
    }
}

/// Builds an HTTP client with the specified parameters.
pub fn build_http_client(
    params: &HttpClientParams,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .timeout(Duration::from_secs(params.timeout))
        .connect_timeout(Duration::from_secs(params.connect_timeout))
        .user_agent(params.user_agent.as_str())
        .build()
}

#[derive(Debug, Clone)]
pub struct ReqwestNetworkClient {
    client: reqwest::Client,
}

impl ReqwestNetworkClient {
    pub fn new(params: HttpClientParams) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(&params)?,
        })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout(err.to_string())
        } else if err.is_builder() {
            NetworkError::InvalidRequest(err.to_string())
        } else {
            NetworkError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl NetworkClient for ReqwestNetworkClient {
    async fn fetch(
        &self,
        request: &HttpRequest,
    ) -> Result<HttpResponse, NetworkError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| NetworkError::InvalidRequest(e.to_string()))?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        // The client keeps no cookie store, so credentials are never
        // attached implicitly regardless of the credentials mode.
        builder = match request.cache {
            CacheMode::NoStore => builder.header("cache-control", "no-store"),
            CacheMode::NoCache | CacheMode::Reload => {
                builder.header("cache-control", "no-cache")
            }
            CacheMode::Default => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    const YAML_CONF_TEXT: &str = r#"
    http:
      timeout: 30
      connect_timeout: 10
      user_agent: garage-bot/1.0
    "#;

    const WRONG_YAML_CONF_TEXT: &str = r#"
    http:
      connect_timeout: 10
    "#;

    #[test]
    fn test_build_client() {
        let client = build_http_client(&HttpClientParams {
            timeout: 10,
            connect_timeout: 5,
            user_agent: "hello".to_string(),
        });

        assert!(client.is_ok());
    }

    #[test]
    fn test_params_from_config() {
        let config: Value = serde_yaml::from_str(YAML_CONF_TEXT).unwrap();
        let params = HttpClientParams::from_config(&config["http"]).unwrap();

        assert_eq!(params.timeout, 30);
        assert_eq!(params.connect_timeout, 10);
        assert_eq!(params.user_agent, "garage-bot/1.0");
        assert!(ReqwestNetworkClient::new(params).is_ok());
    }

    #[test]
    fn test_missing_timeout() {
        let config: Value = serde_yaml::from_str(WRONG_YAML_CONF_TEXT).unwrap();
        let result = HttpClientParams::from_config(&config["http"]);

        assert!(matches!(result, Err(ConfigError::Missing(field)) if field == "http.timeout"));
    }

    #[test]
    fn test_default_user_agent() {
        let config: Value =
            serde_yaml::from_str("timeout: 5\nconnect_timeout: 1").unwrap();
        let params = HttpClientParams::from_config(&config).unwrap();
        assert!(params.user_agent.starts_with("sworker/"));
    }

    #[tokio::test]
    async fn test_invalid_method_is_rejected() {
        let client = ReqwestNetworkClient::new(HttpClientParams::default()).unwrap();
        let request = HttpRequest::new(
            "NOT A METHOD",
            url::Url::parse("http://127.0.0.1:9/").unwrap(),
        );
        let result = client.fetch(&request).await;
        assert!(matches!(result, Err(NetworkError::InvalidRequest(_))));
    }
}
