//! Core types for talking to a Sensu backend.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API group for core resources.
pub const CORE_API_GROUP: &str = "core/v2";

/// HTTP method used for an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Verb as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Whether the method only reads state (safe to retry).
    pub fn is_read(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection settings for the backend API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend host name or address
    pub host: String,
    /// Backend API port
    pub port: u16,
    /// Use HTTPS instead of HTTP
    pub ssl: bool,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            ssl: false,
            username: "admin".to_string(),
            password: "P@ssw0rd!".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Base URL of the backend, without a trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Options for a single [`crate::Client::request`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Namespace segment; `None` for cluster-scoped collections
    pub namespace: Option<String>,
    /// HTTP method
    pub method: Method,
    /// API group, e.g. `core/v2` or `enterprise/authentication/v2`
    pub api_group: String,
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            method: Method::Get,
            api_group: CORE_API_GROUP.to_string(),
            query: Vec::new(),
        }
    }
}

impl RequestOptions {
    /// Create options for a method with the default API group.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    /// Set the namespace.
    pub fn namespace(mut self, namespace: Option<&str>) -> Self {
        self.namespace = namespace.map(str::to_string);
        self
    }

    /// Set the API group.
    pub fn api_group(mut self, api_group: impl Into<String>) -> Self {
        self.api_group = api_group.into();
        self
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// One member of the backend's etcd cluster.
///
/// Field names follow the etcd JSON encoding the backend passes through.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterMember {
    #[serde(rename = "ID")]
    pub id: u64,
    /// Empty until the member has started and joined
    #[serde(default)]
    pub name: String,
    #[serde(rename = "peerURLs", default)]
    pub peer_urls: Vec<String>,
    #[serde(rename = "clientURLs", default)]
    pub client_urls: Vec<String>,
}

/// A fully resolved HTTP request handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// Value of the `Authorization` header, if any
    pub authorization: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Raw response from a transport. Non-2xx statuses are not errors at this level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Tokens issued by the `/auth` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

/// Configuration for retry behavior on read requests.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Create a retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let mut config = ClientConfig::default();
        assert_eq!(config.base_url(), "http://localhost:8080");

        config.ssl = true;
        config.host = "sensu.example.com".to_string();
        config.port = 8443;
        assert_eq!(config.base_url(), "https://sensu.example.com:8443");
    }

    #[test]
    fn test_delay_for_attempt_is_capped() {
        let config = RetryConfig::new(5, Duration::from_secs(1), 2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(10));
    }

    #[test]
    fn test_request_options_builder() {
        let opts = RequestOptions::new(Method::Put)
            .namespace(Some("dev"))
            .api_group("enterprise/authentication/v2");
        assert_eq!(opts.method, Method::Put);
        assert_eq!(opts.namespace.as_deref(), Some("dev"));
        assert_eq!(opts.api_group, "enterprise/authentication/v2");
        assert!(!opts.method.is_read());
        assert!(Method::Get.is_read());
        assert!(opts.query.is_empty());
    }

    #[test]
    fn test_cluster_member_uses_etcd_field_names() {
        let member: ClusterMember = serde_json::from_str(
            r#"{"ID": 12345, "peerURLs": ["http://10.0.0.2:2380"], "clientURLs": []}"#,
        )
        .unwrap();
        assert_eq!(member.id, 12345);
        assert!(member.name.is_empty());
        assert_eq!(member.peer_urls, ["http://10.0.0.2:2380"]);
    }
}
