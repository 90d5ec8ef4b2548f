//! CLI command handling module
//!
//! Argument definitions live here; handlers live in `commands`.

mod commands;
mod logging;
mod version;

pub use commands::{ConfigSubcommand, handle_config_command, run};
pub use logging::*;
pub use version::display_version;

use clap::{Parser, Subcommand};

/// meshscope - traffic diagnostics for meshed Kubernetes workloads
#[derive(Parser, Debug)]
#[command(name = "meshscope")]
#[command(about = "Per-workload traffic stats, edges, routes and a live top view", long_about = None)]
pub struct Args {
    /// Enable debug logging to a temporary file
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Metrics API address, overriding `apiAddress`
    #[arg(long, global = true)]
    pub api_addr: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Main commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show traffic stats for resources
    Stat(QueryArgs),
    /// Show observed connections and their identities
    Edges(QueryArgs),
    /// Show per-route stats
    Routes(QueryArgs),
    /// Show live traffic aggregated by path
    Top(TopArgs),
    /// List the pod endpoints behind authorities
    Endpoints(EndpointsArgs),
    /// List the pods backing resources
    Pods(PodsArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
    /// Show version information
    Version,
}

/// Arguments shared by the batch commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Resources as `kind/name ...` or `kind [name ...]`
    #[arg(required = true)]
    pub resources: Vec<String>,

    /// Namespace of the resources
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// Query every namespace
    #[arg(long, short = 'A')]
    pub all_namespaces: bool,

    /// Only traffic sent to this resource
    #[arg(long)]
    pub to: Option<String>,

    /// Namespace of the `--to` resource
    #[arg(long)]
    pub to_namespace: Option<String>,

    /// Only traffic received from this resource
    #[arg(long)]
    pub from: Option<String>,

    /// Namespace of the `--from` resource
    #[arg(long)]
    pub from_namespace: Option<String>,

    /// Stats window, e.g. 10s, 1m, 1h
    #[arg(long, short = 't')]
    pub time_window: Option<String>,

    /// Output format: table, wide or json
    #[arg(long, short = 'o')]
    pub output: Option<String>,
}

/// Arguments for `top`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TopArgs {
    /// Resource to tap, as `kind/name` or `kind name`
    #[arg(required = true)]
    pub resources: Vec<String>,

    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// Only traffic sent to this resource
    #[arg(long)]
    pub to: Option<String>,

    #[arg(long)]
    pub to_namespace: Option<String>,

    /// Not supported for live traffic; rejected
    #[arg(long, hide = true)]
    pub from: Option<String>,

    /// Maximum requests per second to tap
    #[arg(long)]
    pub max_rps: Option<f64>,

    /// Only requests with this HTTP method
    #[arg(long)]
    pub method: Option<String>,

    /// Only requests whose path starts with this prefix
    #[arg(long)]
    pub path: Option<String>,

    /// Only requests to this authority
    #[arg(long)]
    pub authority: Option<String>,

    /// Collapse rows that differ only by source
    #[arg(long)]
    pub hide_sources: bool,

    /// Group by route label instead of path
    #[arg(long)]
    pub routes: bool,
}

/// Arguments for `endpoints`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct EndpointsArgs {
    /// Authorities, e.g. web.default.svc.cluster.local:80
    #[arg(required = true)]
    pub authorities: Vec<String>,

    #[arg(long, short = 'o')]
    pub output: Option<String>,
}

/// Arguments for `pods`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PodsArgs {
    /// Resources as `kind/name ...` or `kind [name ...]`
    #[arg(required = true)]
    pub resources: Vec<String>,

    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    #[arg(long, short = 'o')]
    pub output: Option<String>,
}
