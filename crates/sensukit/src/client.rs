//! Authenticated client for the Sensu backend REST API.

use crate::error::{Error, Result};
use crate::retry::{LogCallback, with_retry};
use crate::transport::Transport;
use crate::transport::http::HttpTransport;
use crate::types::{
    ClientConfig, ClusterMember, HttpRequest, HttpResponse, Method, RequestOptions, RetryConfig, Token,
};
use base64::Engine;
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval used by [`Client::wait_until_reachable`].
const REACHABLE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Percent-encode one path segment or query value.
///
/// Everything outside the unreserved set (plus `:`, `@`, `*` and `,`) is
/// escaped, so names containing `/` stay a single segment.
pub fn path_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b':' | b'@' | b'*' | b',' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

/// Client for the Sensu backend API.
///
/// Built once from a [`ClientConfig`] and passed by reference to whoever
/// needs it. The bearer token is fetched lazily and cached; a rejected token
/// triggers exactly one re-login per request.
///
/// # Example
///
/// ```no_run
/// use sensukit::{Client, ClientConfig, Method, RequestOptions};
///
/// let client = Client::new(ClientConfig::default());
/// let opts = RequestOptions::new(Method::Get).namespace(Some("default"));
/// if let Some(checks) = client.request("checks", None, &opts).unwrap() {
///     println!("{checks}");
/// }
/// ```
pub struct Client {
    config: ClientConfig,
    transport: Box<dyn Transport>,
    retry: RetryConfig,
    token: Mutex<Option<Token>>,
}

impl Client {
    /// Create a client using the real HTTP transport.
    pub fn new(config: ClientConfig) -> Self {
        let transport = Box::new(HttpTransport::new(config.timeout));
        Self::with_transport(config, transport)
    }

    /// Create a client with a custom transport (useful for testing).
    pub fn with_transport(config: ClientConfig, transport: Box<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            retry: RetryConfig::default(),
            token: Mutex::new(None),
        }
    }

    /// Replace the retry policy used for reads.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Connection settings.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Base URL of the backend.
    pub fn base_url(&self) -> String {
        self.config.base_url()
    }

    /// URL of a collection (or of one object when `collection` ends in
    /// `/<name>`). Callers escape names with [`path_segment`].
    pub fn url(&self, collection: &str, opts: &RequestOptions) -> String {
        let mut url = format!("{}/api/{}", self.base_url(), opts.api_group);
        if let Some(namespace) = &opts.namespace {
            url.push_str("/namespaces/");
            url.push_str(&path_segment(namespace));
        }
        url.push('/');
        url.push_str(collection.trim_start_matches('/'));
        for (i, (key, value)) in opts.query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(&path_segment(key));
            url.push('=');
            url.push_str(&path_segment(value));
        }
        url
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Perform an API call and return the parsed JSON body.
    ///
    /// * `Ok(None)`: the object or namespace does not exist (404 on GET)
    /// * `Ok(Some(Value::Null))`: success with an empty body
    /// * `Err(Error::Api)`: any other non-success status
    ///
    /// GET requests are retried on connection errors; writes never are.
    pub fn request(
        &self,
        collection: &str,
        payload: Option<&Value>,
        opts: &RequestOptions,
    ) -> Result<Option<Value>> {
        let url = self.url(collection, opts);
        log::debug!("{} {}", opts.method, url);

        let response = if opts.method.is_read() {
            with_retry(&self.retry, Some(&LogCallback), || {
                self.send_authenticated(opts.method, &url, payload)
            })?
        } else {
            self.send_authenticated(opts.method, &url, payload)?
        };

        match response.status {
            status if (200..300).contains(&status) => parse_body(&response.body).map(Some),
            404 if opts.method.is_read() => {
                log::debug!("{url} not found");
                Ok(None)
            }
            status => Err(Error::Api {
                status,
                body: response.body,
            }),
        }
    }

    /// Names of every namespace visible to the configured user.
    pub fn namespaces(&self) -> Result<Vec<String>> {
        let records = self
            .request("namespaces", None, &RequestOptions::new(Method::Get))?
            .unwrap_or(Value::Null);
        Ok(records
            .as_array()
            .map(|all| {
                all.iter()
                    .filter_map(|r| r.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Check that the configured credentials are accepted.
    pub fn auth_test(&self) -> Result<()> {
        self.login().map(|_| ())
    }

    // =========================================================================
    // Cluster members
    // =========================================================================

    /// Members of the backend's etcd cluster.
    pub fn cluster_members(&self) -> Result<Vec<ClusterMember>> {
        let response = self
            .request("cluster/members", None, &RequestOptions::new(Method::Get))?
            .ok_or_else(|| Error::NotFound {
                what: "cluster members endpoint".to_string(),
            })?;
        members_of(response)
    }

    /// Register a new member by its peer URLs. The member takes its name
    /// when it starts and joins.
    pub fn add_cluster_member(&self, peer_urls: &[String]) -> Result<()> {
        let opts = RequestOptions::new(Method::Post).query("peer-addrs", peer_urls.join(","));
        self.request("cluster/members", None, &opts)?;
        Ok(())
    }

    /// Replace the peer URLs of a member.
    pub fn update_cluster_member(&self, id: u64, peer_urls: &[String]) -> Result<()> {
        let opts = RequestOptions::new(Method::Put).query("peer-addrs", peer_urls.join(","));
        self.request(&format!("cluster/members/{id:x}"), None, &opts)?;
        Ok(())
    }

    /// Remove a member from the cluster.
    pub fn remove_cluster_member(&self, id: u64) -> Result<()> {
        self.request(
            &format!("cluster/members/{id:x}"),
            None,
            &RequestOptions::new(Method::Delete),
        )?;
        Ok(())
    }

    // =========================================================================
    // Reachability
    // =========================================================================

    /// Whether `GET {base}{path}` answers with a success status.
    pub fn is_reachable(&self, path: &str) -> bool {
        let request = HttpRequest {
            method: Method::Get,
            url: format!("{}{}", self.base_url(), path),
            authorization: None,
            body: None,
        };
        match self.transport.send(&request) {
            Ok(response) => response.is_success(),
            Err(e) => {
                log::debug!("{} not reachable: {e}", request.url);
                false
            }
        }
    }

    /// Poll [`Client::is_reachable`] until it succeeds or `timeout` elapses.
    pub fn wait_until_reachable(&self, path: &str, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.is_reachable(path) {
                return true;
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                log::warn!(
                    "Sensu API {}{} not reachable after {}s",
                    self.base_url(),
                    path,
                    timeout.as_secs()
                );
                return false;
            }
            log::info!("Waiting for Sensu API at {}{}", self.base_url(), path);
            thread::sleep(REACHABLE_POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn cached_token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    fn invalidate_token(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn token(&self) -> Result<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        let token = self.login()?;
        let access = token.access_token.clone();
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(access)
    }

    fn login(&self) -> Result<Token> {
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.config.username, self.config.password));
        let request = HttpRequest {
            method: Method::Get,
            url: format!("{}/auth", self.base_url()),
            authorization: Some(format!("Basic {credentials}")),
            body: None,
        };
        log::debug!("Logging in to {} as {}", self.base_url(), self.config.username);

        let response = self.transport.send(&request)?;
        match response.status {
            200 => Ok(serde_json::from_str(&response.body)?),
            401 => Err(Error::Authentication {
                message: format!("login rejected for user {}", self.config.username),
            }),
            status => Err(Error::Api {
                status,
                body: response.body,
            }),
        }
    }

    fn send_with_token(
        &self,
        method: Method,
        url: &str,
        payload: Option<&Value>,
        token: &str,
    ) -> Result<HttpResponse> {
        let request = HttpRequest {
            method,
            url: url.to_string(),
            authorization: Some(format!("Bearer {token}")),
            body: payload.cloned(),
        };
        self.transport.send(&request)
    }

    fn send_authenticated(&self, method: Method, url: &str, payload: Option<&Value>) -> Result<HttpResponse> {
        let response = self.send_with_token(method, url, payload, &self.token()?)?;
        if response.status != 401 {
            return Ok(response);
        }

        log::warn!("Token rejected by {url}, logging in again");
        self.invalidate_token();
        let response = self.send_with_token(method, url, payload, &self.token()?)?;
        if response.status == 401 {
            return Err(Error::Authentication {
                message: format!("{method} {url} rejected after re-login"),
            });
        }
        Ok(response)
    }
}

/// Members of a member list response, `{"members": [...]}` or a bare array.
pub(crate) fn members_of(response: Value) -> Result<Vec<ClusterMember>> {
    let members = match response {
        Value::Array(_) => response,
        Value::Object(mut object) => object.remove("members").unwrap_or(Value::Array(Vec::new())),
        Value::Null => Value::Array(Vec::new()),
        other => {
            return Err(Error::InvalidResponse(format!(
                "expected a member list, got {other}"
            )));
        }
    };
    Ok(serde_json::from_value(members)?)
}

fn parse_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(body)?)
}
