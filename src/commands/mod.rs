pub mod apply;
pub mod diff;
pub mod list;
pub mod ping;
pub mod types;
pub mod validate;

use crate::Context;
use crate::cli::ConnectionArgs;
use crate::config::Config;
use crate::manifest::{self, Manifest};
use crate::registry::{Backends, Registry};
use anyhow::Result;
use declarative::ExecutionPlan;
use sensukit::{Bonsai, Client, Sensuctl};
use std::path::Path;
use std::time::Duration;

/// Configuration and backend connections for one command
pub struct Session {
    pub config: Config,
    pub registry: Registry,
    pub client: Client,
    pub sensuctl: Sensuctl,
    pub bonsai: Bonsai,
}

impl Session {
    /// Load the config file, apply CLI overrides and connect.
    pub fn open(ctx: &Context) -> Result<Self> {
        let config = load_config(ctx)?;
        let client = Client::new(config.client_config()).with_retry(config.retry_config());
        let sensuctl = Sensuctl::new(config.sensuctl_program().to_string_lossy());
        let bonsai = Bonsai::new(&config.bonsai.url, Duration::from_secs(config.api.timeout_secs));
        Ok(Self::new(config, client, sensuctl, bonsai))
    }

    pub fn new(config: Config, client: Client, sensuctl: Sensuctl, bonsai: Bonsai) -> Self {
        Self {
            registry: Registry::new(config.default_provider),
            config,
            client,
            sensuctl,
            bonsai,
        }
    }

    pub fn backends(&self) -> Backends<'_> {
        Backends {
            client: &self.client,
            sensuctl: &self.sensuctl,
            bonsai: &self.bonsai,
        }
    }

    /// Load, validate and batch a manifest
    pub fn plan(&self, path: &Path, target: Option<&str>) -> Result<ExecutionPlan<'_>> {
        let resolved = Manifest::load(path)?.resolve(&self.registry)?;
        let plan = manifest::build_plan(resolved, &self.registry, &self.backends());
        Ok(plan.filter_by_target(target))
    }
}

/// Config file with CLI overrides applied
pub fn load_config(ctx: &Context) -> Result<Config> {
    let mut config = Config::load(ctx.config.as_deref())?;
    apply_overrides(&mut config, &ctx.connection);
    Ok(config)
}

fn apply_overrides(config: &mut Config, args: &ConnectionArgs) {
    if let Some(host) = &args.api_host {
        config.api.host.clone_from(host);
    }
    if let Some(port) = args.api_port {
        config.api.port = port;
    }
    if args.api_ssl {
        config.api.ssl = true;
    }
    if let Some(username) = &args.api_username {
        config.api.username.clone_from(username);
    }
    if let Some(password) = &args.api_password {
        config.api.password.clone_from(password);
    }
    if let Some(provider) = args.provider {
        config.default_provider = provider;
    }
}
