//! Kubernetes client module
//!
//! Handles connection to the Kubernetes API server and exposes the
//! cluster-state provider used by resource resolution and request building.

mod cluster_state;

pub use cluster_state::{ClusterState, KubeClusterState};

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

/// A connected client together with the namespace the kubeconfig defaults to
pub struct Connection {
    pub client: Client,
    pub context: String,
    pub default_namespace: String,
}

/// Initialize a Kubernetes client
///
/// Uses the default kubeconfig loading strategy (in-cluster config,
/// `KUBECONFIG`, then `~/.kube/config`) unless a context is named explicitly.
pub async fn connect(context: Option<&str>) -> Result<Connection> {
    let config = match context {
        Some(name) => {
            let options = KubeConfigOptions {
                context: Some(name.to_string()),
                ..Default::default()
            };
            Config::from_kubeconfig(&options)
                .await
                .with_context(|| format!("Failed to load kubeconfig context '{}'", name))?
        }
        None => Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration")?,
    };

    let default_namespace = config.default_namespace.clone();
    let context = match context {
        Some(name) => name.to_string(),
        None => current_context().unwrap_or_else(|| "in-cluster".to_string()),
    };

    tracing::debug!(
        "Connecting to {} (context {}, namespace {})",
        config.cluster_url,
        context,
        default_namespace
    );

    let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
    Ok(Connection {
        client,
        context,
        default_namespace,
    })
}

/// Name of the kubeconfig's current context, if one is configured
fn current_context() -> Option<String> {
    Kubeconfig::read().ok()?.current_context
}
