use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Snapshot of an HTTP response: status, headers and the full body.
///
/// Cached snapshots are never mutated in place; a newer fetch replaces the
/// whole entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
    /// The response body
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// JSON response with `content-type: application/json`.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
            .with_header("content-type", "application/json")
    }

    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body.into())
            .with_header("content-type", "text/html; charset=utf-8")
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body.into())
            .with_header("content-type", "text/plain; charset=utf-8")
    }

    /// True for 2xx statuses. Only these are ever written to a partition.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// A cached request/response pair inside one partition.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Normalized request URL, see [`crate::HttpRequest::cache_key`]
    pub key: String,
    /// The stored response snapshot
    pub response: HttpResponse,
    /// When the snapshot was written
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: String, response: HttpResponse) -> Self {
        Self {
            key,
            response,
            stored_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(304, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
        assert!(!HttpResponse::new(503, "").is_success());
    }

    #[test]
    fn test_json_response() {
        let resp = HttpResponse::json(503, &json!({"error": "offline"}));
        assert_eq!(resp.header("Content-Type"), Some("application/json"));
        let value: serde_json::Value = resp.body_json().unwrap();
        assert_eq!(value["error"], "offline");
    }
}
