use crate::registry::ProviderKind;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sensu-converge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative reconciliation for Sensu Go resources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/sensu-converge/config.toml)
    #[arg(long, global = true, env = "SENSU_CONVERGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Backend connection overrides, applied on top of the config file
#[derive(Args, Debug, Default, Clone)]
pub struct ConnectionArgs {
    /// Sensu backend host
    #[arg(long, global = true, env = "SENSU_API_HOST")]
    pub api_host: Option<String>,

    /// Sensu backend API port
    #[arg(long, global = true, env = "SENSU_API_PORT")]
    pub api_port: Option<u16>,

    /// Use HTTPS
    #[arg(long, global = true)]
    pub api_ssl: bool,

    /// API username
    #[arg(long, global = true, env = "SENSU_API_USERNAME")]
    pub api_username: Option<String>,

    /// API password
    #[arg(long, global = true, env = "SENSU_API_PASSWORD", hide_env_values = true)]
    pub api_password: Option<String>,

    /// Provider for resources that do not name one
    #[arg(long, global = true, value_enum)]
    pub provider: Option<ProviderKind>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge the backend to a manifest
    Apply(ApplyArgs),

    /// Show what apply would change
    Diff(DiffArgs),

    /// Validate a manifest without contacting the backend
    Validate(ManifestArgs),

    /// List existing resources of a type
    List(ListArgs),

    /// List supported resource types
    Types(TypesArgs),

    /// Wait until the backend API answers
    Ping(PingArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Manifest file (TOML or JSON)
    #[arg(short, long = "file")]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Dry run - show what would change
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Only apply resources matching TYPE or TYPE.TITLE
    #[arg(short, long)]
    pub target: Option<String>,

    /// Wait for the API to answer before applying
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Only diff resources matching TYPE or TYPE.TITLE
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Resource type, e.g. sensu_check or check
    pub resource_type: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TypesArgs {
    /// Show the properties of one type
    pub resource_type: Option<String>,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Seconds to keep polling
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Path polled on the backend
    #[arg(long, default_value = "/info")]
    pub path: String,
}
