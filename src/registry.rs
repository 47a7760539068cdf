//! Type registry and provider selection
//!
//! Every type has two providers: `sensu_api` talks to the REST API and
//! `sensuctl` shells out to the CLI. Both share the type's descriptor; only
//! the store differs. Most types reconcile records directly; agent
//! subscriptions, cluster members, events and Bonsai assets have providers
//! of their own.

use crate::bonsai::BonsaiAssetProvider;
use crate::cluster::{ApiMembers, CliMembers, ClusterMemberProvider};
use crate::event::EventProvider;
use crate::store::{ApiStore, CliStore};
use crate::subscription::SubscriptionProvider;
use crate::types::{self, AGENT_SUBSCRIPTION, BONSAI_ASSET, CLUSTER_MEMBER, EVENT};
use declarative::{Descriptor, Provider, Reconciler, Store, ValidationError};
use sensukit::{Bonsai, Client, Sensuctl};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which backend a resource is converged through
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[value(name = "sensu_api")]
    SensuApi,
    Sensuctl,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::SensuApi => "sensu_api",
            ProviderKind::Sensuctl => "sensuctl",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensu_api" => Ok(ProviderKind::SensuApi),
            "sensuctl" => Ok(ProviderKind::Sensuctl),
            other => Err(ValidationError::UnknownProvider(other.to_string())),
        }
    }
}

/// Connections the providers run against
pub struct Backends<'a> {
    pub client: &'a Client,
    pub sensuctl: &'a Sensuctl,
    pub bonsai: &'a Bonsai,
}

/// Maps type names to descriptors and builds their providers
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    default_provider: ProviderKind,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(ProviderKind::Sensuctl)
    }
}

impl Registry {
    pub fn new(default_provider: ProviderKind) -> Self {
        Self { default_provider }
    }

    pub fn default_provider(&self) -> ProviderKind {
        self.default_provider
    }

    /// Descriptor of a type; the `sensu_` prefix may be omitted.
    pub fn descriptor(&self, type_name: &str) -> Result<&'static Descriptor, ValidationError> {
        types::find(type_name).ok_or_else(|| ValidationError::UnknownType(type_name.to_string()))
    }

    /// Provider named by a resource, or the default when it names none.
    pub fn resolve_provider(&self, name: Option<&str>) -> Result<ProviderKind, ValidationError> {
        name.map_or(Ok(self.default_provider), str::parse)
    }

    /// Provider converging `descriptor` through `kind`.
    pub fn provider<'a>(
        &self,
        descriptor: &'static Descriptor,
        kind: ProviderKind,
        backends: &Backends<'a>,
    ) -> Box<dyn Provider + 'a> {
        if descriptor.type_name == CLUSTER_MEMBER.type_name {
            return match kind {
                ProviderKind::SensuApi => Box::new(ClusterMemberProvider::new(ApiMembers::new(backends.client))),
                ProviderKind::Sensuctl => Box::new(ClusterMemberProvider::new(CliMembers::new(backends.sensuctl))),
            };
        }
        match kind {
            ProviderKind::SensuApi => with_store(descriptor, ApiStore::new(backends.client), backends.bonsai),
            ProviderKind::Sensuctl => with_store(descriptor, CliStore::new(backends.sensuctl), backends.bonsai),
        }
    }
}

fn with_store<'a, S: Store + 'a>(
    descriptor: &'static Descriptor,
    store: S,
    bonsai: &'a Bonsai,
) -> Box<dyn Provider + 'a> {
    match descriptor.type_name {
        t if t == AGENT_SUBSCRIPTION.type_name => Box::new(SubscriptionProvider::new(store)),
        t if t == EVENT.type_name => Box::new(EventProvider::new(store)),
        t if t == BONSAI_ASSET.type_name => Box::new(BonsaiAssetProvider::new(store, bonsai)),
        _ => Box::new(Reconciler::new(store, descriptor)),
    }
}
