//! CLI command handlers

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;

use super::{Args, Command, EndpointsArgs, PodsArgs, QueryArgs, TopArgs};
use crate::aggregate::{aggregate, discover_endpoints, sort_rows};
use crate::api::HttpMetricsClient;
use crate::config::{self, Config, ConfigLoader, paths};
use crate::kube::{self, KubeClusterState};
use crate::models::{PodSet, ResourceRef};
use crate::output::{render_endpoints, render_pods, render_rows};
use crate::request::{OutputFormat, QueryOptions, RequestKind, build_requests};
use crate::resolve::resolve_pods;

/// Connect timeout for the metrics API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Get configuration value
    Get {
        /// Configuration key (e.g., "apiAddress", "top.hideSources")
        key: Option<String>,
    },
    /// Set configuration value
    Set {
        /// Configuration key (e.g., "apiAddress", "top.hideSources")
        key: String,
        /// Configuration value; empty clears optional keys
        value: String,
    },
    /// List all configuration
    List,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

/// Dispatch a parsed command line
pub async fn run(args: Args) -> Result<()> {
    let Args {
        context,
        api_addr,
        command,
        ..
    } = args;
    let globals = Globals { context, api_addr };

    match command {
        Command::Stat(q) => run_batch(RequestKind::Stats, q, &globals).await,
        Command::Edges(q) => run_batch(RequestKind::Edges, q, &globals).await,
        Command::Routes(q) => run_batch(RequestKind::Routes, q, &globals).await,
        Command::Top(t) => run_top(t, &globals).await,
        Command::Endpoints(e) => run_endpoints(e, &globals).await,
        Command::Pods(p) => run_pods(p, &globals).await,
        Command::Config { subcommand } => handle_config_command(subcommand),
        Command::Version => {
            super::display_version();
            Ok(())
        }
    }
}

/// Flags that apply to every command
struct Globals {
    context: Option<String>,
    api_addr: Option<String>,
}

impl Globals {
    fn metrics_client(&self, config: &Config) -> Result<HttpMetricsClient> {
        let address = self.api_addr.as_deref().unwrap_or(&config.api_address);
        HttpMetricsClient::new(address, CONNECT_TIMEOUT)
            .with_context(|| format!("Failed to create metrics client for {}", address))
    }
}

fn load_config() -> Result<Config> {
    ConfigLoader::load().context("Failed to load configuration")
}

/// Flag, then config, then the kubeconfig context's namespace
fn pick_namespace(flag: Option<String>, config: &Config, connection: &kube::Connection) -> String {
    flag.or_else(|| config.default_namespace.clone())
        .unwrap_or_else(|| connection.default_namespace.clone())
}

async fn run_batch(kind: RequestKind, q: QueryArgs, globals: &Globals) -> Result<()> {
    let config = load_config()?;
    let connection = kube::connect(globals.context.as_deref()).await?;

    let opts = QueryOptions {
        request_kind: kind,
        namespace: pick_namespace(q.namespace, &config, &connection),
        all_namespaces: q.all_namespaces,
        to_resource: q.to,
        to_namespace: q.to_namespace,
        from_resource: q.from,
        from_namespace: q.from_namespace,
        time_window: q.time_window.unwrap_or_else(|| config.time_window.clone()),
        output: q.output.unwrap_or_else(|| config.output.clone()),
    };

    let cluster = KubeClusterState::new(connection.client);
    let requests = build_requests(&cluster, &q.resources, &opts).await?;
    let format: OutputFormat = opts.output.parse()?;

    let client = Arc::new(globals.metrics_client(&config)?);
    let mut rows = aggregate(requests, client).await?;
    // Edge rows arrive in backend order
    if kind == RequestKind::Edges {
        sort_rows(&mut rows);
    }

    println!("{}", render_rows(&rows, format)?);
    Ok(())
}

#[cfg(feature = "tui")]
async fn run_top(t: TopArgs, globals: &Globals) -> Result<()> {
    use crate::api::TapClient;
    use crate::models::ResourceKind;
    use crate::request::{TapOptions, build_tap_request};
    use crate::tap::{CorrelatorConfig, Termination, correlate};
    use crate::top::SummaryTable;
    use crate::tui::{LiveTableExit, Theme, TopContext};

    let config = load_config()?;
    let connection = kube::connect(globals.context.as_deref()).await?;

    let opts = QueryOptions {
        namespace: pick_namespace(t.namespace, &config, &connection),
        to_resource: t.to,
        to_namespace: t.to_namespace,
        from_resource: t.from,
        ..Default::default()
    };
    let tap = TapOptions {
        max_rps: t.max_rps.unwrap_or(config.top.max_rps),
        method: t.method,
        path_prefix: t.path,
        authority: t.authority,
    };
    let request = build_tap_request(&t.resources, &opts, &tap)?;

    // Fail before taking over the terminal if the target does not exist
    if request.target.kind != ResourceKind::Authority {
        let cluster = KubeClusterState::new(connection.client.clone());
        let pods = resolve_pods(&cluster, &request.target).await?;
        tracing::debug!("{} resolves to {} pod(s)", request.target, pods.len());
    }

    let client = globals.metrics_client(&config)?;
    let events = client.tap(&request).await?;
    let (exchanges, correlator) = correlate(
        events,
        CorrelatorConfig {
            queue_capacity: config.top.queue_capacity,
            pending_ttl: config.top.pending_ttl_secs.map(Duration::from_secs),
        },
    );

    let mut table = SummaryTable::new(t.hide_sources || config.top.hide_sources, t.routes);
    let ctx = TopContext {
        context: connection.context,
        target: request.target.to_string(),
    };
    let exit = crate::tui::run_top(
        exchanges,
        &mut table,
        Duration::from_millis(config.top.tick_interval_ms),
        &ctx,
        &Theme::default(),
    )
    .await?;

    match exit {
        LiveTableExit::Quit => {
            correlator.abort();
            Ok(())
        }
        LiveTableExit::StreamEnded => match correlator.await.context("Correlator task failed")? {
            Ok(Termination::Eof) => {
                eprintln!(
                    "Tap stream closed after {} request(s)",
                    table.total_count()
                );
                Ok(())
            }
            Ok(Termination::ReceiverClosed) => Ok(()),
            Err(e) => Err(e.into()),
        },
    }
}

#[cfg(not(feature = "tui"))]
async fn run_top(_t: TopArgs, _globals: &Globals) -> Result<()> {
    anyhow::bail!("`top` requires meshscope to be built with the \"tui\" feature")
}

async fn run_endpoints(e: EndpointsArgs, globals: &Globals) -> Result<()> {
    let config = load_config()?;
    let format: OutputFormat = e
        .output
        .unwrap_or_else(|| config.output.clone())
        .parse()?;

    let client = Arc::new(globals.metrics_client(&config)?);
    let timeout = Duration::from_secs(config.endpoints.timeout_secs);
    let endpoints = discover_endpoints(e.authorities, client, timeout).await;

    println!("{}", render_endpoints(&endpoints, format)?);
    Ok(())
}

async fn run_pods(p: PodsArgs, globals: &Globals) -> Result<()> {
    let config = load_config()?;
    let format: OutputFormat = p
        .output
        .unwrap_or_else(|| config.output.clone())
        .parse()?;
    let connection = kube::connect(globals.context.as_deref()).await?;
    let namespace = pick_namespace(p.namespace, &config, &connection);

    let targets = ResourceRef::parse_args(&namespace, &p.resources)?;
    let cluster = KubeClusterState::new(connection.client);

    let mut pods = PodSet::new();
    for target in &targets {
        pods.extend(resolve_pods(&cluster, target).await?);
    }

    println!("{}", render_pods(&pods, format)?);
    Ok(())
}

/// Handle configuration subcommands
pub fn handle_config_command(cmd: ConfigSubcommand) -> Result<()> {
    match cmd {
        ConfigSubcommand::Get { key } => {
            let config = load_config()?;

            if let Some(key) = key {
                println!("{}", config::get_config_value(&config, &key)?);
            } else {
                let yaml =
                    serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
                print!("{}", yaml);
            }
        }
        ConfigSubcommand::Set { key, value } => {
            // Start from the file alone so env overrides are never persisted
            let path = paths::root_config_path();
            let mut config = if path.exists() {
                ConfigLoader::load_file(&path)?
            } else {
                Config::default()
            };

            config::set_config_value(&mut config, &key, &value)
                .with_context(|| format!("Failed to set {} = {}", key, value))?;

            ConfigLoader::save_root(&config).context("Failed to save configuration")?;
            println!("Configuration saved");
        }
        ConfigSubcommand::List => {
            let config = load_config()?;
            for key in config::CONFIG_KEYS {
                println!("{}: {}", key, config::get_config_value(&config, key)?);
            }
        }
        ConfigSubcommand::Path => {
            println!("{}", paths::root_config_path().display());
        }
        ConfigSubcommand::Validate => {
            ConfigLoader::validate().context("Configuration validation failed")?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}
