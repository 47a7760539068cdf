//! Client for the Bonsai asset index.
//!
//! Bonsai publishes community assets as `<namespace>/<name>` with one entry
//! per released version. Each release has a ready-made asset definition
//! listing its builds, which is what gets installed on the backend.

use crate::client::path_segment;
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::transport::http::HttpTransport;
use crate::types::{HttpRequest, Method};
use semver::Version;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Public Bonsai instance.
pub const BONSAI_URL: &str = "https://bonsai.sensu.io";

/// Version keyword resolved to the newest release.
pub const LATEST: &str = "latest";

/// Annotation recording the installed release on a backend asset.
pub const VERSION_ANNOTATION: &str = "io.sensu.bonsai.version";

#[derive(Debug, Deserialize)]
struct AssetIndex {
    #[serde(default)]
    versions: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    version: String,
}

/// Read-only Bonsai client.
pub struct Bonsai {
    base_url: String,
    transport: Box<dyn Transport>,
}

impl Bonsai {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_transport(base_url, Box::new(HttpTransport::new(timeout)))
    }

    /// Create a client with a custom transport (useful for testing).
    pub fn with_transport(base_url: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn asset_url(&self, name: &str) -> Result<String> {
        let (namespace, asset) = name.split_once('/').ok_or_else(|| Error::NotFound {
            what: format!("Bonsai asset {name} (expected <namespace>/<name>)"),
        })?;
        Ok(format!(
            "{}/api/v1/assets/{}/{}",
            self.base_url,
            path_segment(namespace),
            path_segment(asset)
        ))
    }

    fn get(&self, url: String, what: impl FnOnce() -> String) -> Result<String> {
        log::debug!("GET {url}");
        let request = HttpRequest {
            method: Method::Get,
            url,
            authorization: None,
            body: None,
        };
        let response = self.transport.send(&request)?;
        match response.status {
            status if (200..300).contains(&status) => Ok(response.body),
            404 => Err(Error::NotFound { what: what() }),
            status => Err(Error::Api {
                status,
                body: response.body,
            }),
        }
    }

    /// Every released version of an asset, as published.
    pub fn versions(&self, name: &str) -> Result<Vec<String>> {
        let body = self.get(self.asset_url(name)?, || format!("Bonsai asset {name}"))?;
        let index: AssetIndex = serde_json::from_str(&body)?;
        Ok(index.versions.into_iter().map(|r| r.version).collect())
    }

    /// Highest semantic version of an asset. Versions that do not parse
    /// are ignored.
    pub fn latest(&self, name: &str) -> Result<String> {
        self.versions(name)?
            .into_iter()
            .filter_map(|v| parse_version(&v).map(|parsed| (parsed, v)))
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, v)| v)
            .ok_or_else(|| Error::NotFound {
                what: format!("released version of Bonsai asset {name}"),
            })
    }

    /// Turn `latest` into a concrete version; other versions must exist.
    pub fn resolve(&self, name: &str, version: &str) -> Result<String> {
        if version == LATEST {
            return self.latest(name);
        }
        let versions = self.versions(name)?;
        if versions.iter().any(|v| v == version) {
            Ok(version.to_string())
        } else {
            Err(Error::NotFound {
                what: format!("version {version} of Bonsai asset {name}"),
            })
        }
    }

    /// Asset definition of one release, `{type, api_version, metadata, spec}`.
    pub fn release(&self, name: &str, version: &str) -> Result<Value> {
        let url = format!(
            "{}/{}/release_asset_builds",
            self.asset_url(name)?,
            path_segment(version)
        );
        let body = self.get(url, || format!("version {version} of Bonsai asset {name}"))?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Parse a release version, tolerating a leading `v`.
pub fn parse_version(version: &str) -> Option<Version> {
    Version::parse(version.trim_start_matches('v')).ok()
}
