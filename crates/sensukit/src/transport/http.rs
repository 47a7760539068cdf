//! Blocking HTTP transport on top of `ureq`.

use crate::error::Result;
use crate::transport::Transport;
use crate::types::{HttpRequest, HttpResponse, Method};
use std::time::Duration;

/// Transport that performs real HTTP(S) requests.
///
/// Statuses are returned as-is; only transport failures (refused, timed out,
/// TLS) become errors.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Create a transport with a global per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

fn with_headers<B>(builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
    let builder = builder
        .header("Accept", "application/json")
        .header("User-Agent", "sensukit");
    match &request.authorization {
        Some(value) => builder.header("Authorization", value.as_str()),
        None => builder,
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        log::trace!("{} {}", request.method, request.url);

        let mut response = match request.method {
            Method::Get => with_headers(self.agent.get(&request.url), request).call()?,
            Method::Delete => with_headers(self.agent.delete(&request.url), request).call()?,
            Method::Post | Method::Put => {
                let builder = if request.method == Method::Post {
                    self.agent.post(&request.url)
                } else {
                    self.agent.put(&request.url)
                };
                let builder = with_headers(builder, request);
                match &request.body {
                    Some(body) => builder.send_json(body)?,
                    None => builder.send_empty()?,
                }
            }
        };

        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        Ok(HttpResponse { status, body })
    }
}
