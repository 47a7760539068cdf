//! # sensukit
//!
//! Pure Rust client for a Sensu Go backend.
//!
//! This crate provides:
//! - [`Client`]: authenticated REST client with token caching, a single
//!   re-login on 401 and backoff retries for reads
//! - [`Sensuctl`]: thin wrapper over the `sensuctl` CLI
//! - [`Bonsai`]: read-only client for the Bonsai asset index
//! - [`transport::MockTransport`] and [`sensuctl::MockRunner`] for testing
//!   without a backend
//!
//! ## Example
//!
//! ```no_run
//! use sensukit::{Client, ClientConfig, Method, RequestOptions};
//! use serde_json::json;
//!
//! let client = Client::new(ClientConfig::default());
//!
//! let check = json!({
//!     "metadata": {"name": "check-cpu"},
//!     "command": "check-cpu.sh",
//!     "interval": 60,
//!     "subscriptions": ["linux"],
//! });
//! let opts = RequestOptions::new(Method::Post).namespace(Some("default"));
//! client.request("checks", Some(&check), &opts).unwrap();
//! ```

pub mod bonsai;
pub mod client;
pub mod error;
pub mod retry;
pub mod sensuctl;
pub mod transport;
pub mod types;

pub use bonsai::Bonsai;
pub use client::{Client, path_segment};
pub use error::{Error, ErrorCategory, Result};
pub use sensuctl::Sensuctl;
pub use types::{
    CORE_API_GROUP, ClientConfig, ClusterMember, HttpRequest, HttpResponse, Method, RequestOptions, RetryConfig,
    Token,
};
