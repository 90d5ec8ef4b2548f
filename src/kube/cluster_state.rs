//! Cluster-state provider
//!
//! `ClusterState` is the read-only seam between ownership resolution and the
//! Kubernetes API. `KubeClusterState` implements it with typed
//! `k8s-openapi` objects and converts them into `ClusterObject`s.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Namespace, Pod, ReplicationController, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::ListParams;
use kube::{Api, Client};

use crate::error::{MeshError, Result};
use crate::models::{ClusterObject, OwnerRef, ResourceKind};

/// Read-only access to typed cluster objects
#[async_trait]
pub trait ClusterState: Send + Sync {
    /// Fetch one object; `Ok(None)` when it does not exist
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterObject>>;

    /// List every object of a kind; `None` lists across all namespaces
    async fn list(&self, kind: ResourceKind, namespace: Option<&str>)
    -> Result<Vec<ClusterObject>>;

    /// List pods in a namespace matching an equality-based label selector
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<ClusterObject>>;
}

/// Cluster-state provider backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterState {
    client: Client,
}

impl KubeClusterState {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterState for KubeClusterState {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterObject>> {
        tracing::debug!("Fetching {}/{} in namespace {}", kind, name, namespace);
        let client = &self.client;

        macro_rules! get_typed {
            ($type:ty, $selector:expr) => {{
                let api: Api<$type> = Api::namespaced(client.clone(), namespace);
                Ok(api
                    .get_opt(name)
                    .await?
                    .map(|obj| to_cluster_object(kind, &obj.metadata, $selector(&obj))))
            }};
        }

        match kind {
            ResourceKind::Pod => get_typed!(Pod, no_selector),
            ResourceKind::Deployment => get_typed!(Deployment, deployment_selector),
            ResourceKind::ReplicaSet => get_typed!(ReplicaSet, replica_set_selector),
            ResourceKind::DaemonSet => get_typed!(DaemonSet, daemon_set_selector),
            ResourceKind::Job => get_typed!(Job, job_selector),
            ResourceKind::CronJob => get_typed!(CronJob, cron_job_selector),
            ResourceKind::StatefulSet => get_typed!(StatefulSet, stateful_set_selector),
            ResourceKind::ReplicationController => {
                get_typed!(ReplicationController, replication_controller_selector)
            }
            ResourceKind::Service => get_typed!(Service, service_selector),
            ResourceKind::Namespace => {
                let api: Api<Namespace> = Api::all(client.clone());
                Ok(api
                    .get_opt(name)
                    .await?
                    .map(|obj| to_cluster_object(kind, &obj.metadata, None)))
            }
            ResourceKind::Authority | ResourceKind::All => {
                Err(MeshError::unsupported(kind, "cluster lookups"))
            }
        }
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<ClusterObject>> {
        tracing::debug!(
            "Listing {} in namespace {}",
            kind,
            namespace.unwrap_or("<all>")
        );
        let client = &self.client;

        macro_rules! list_typed {
            ($type:ty, $selector:expr) => {{
                let api: Api<$type> = match namespace {
                    Some(ns) => Api::namespaced(client.clone(), ns),
                    None => Api::all(client.clone()),
                };
                let list = api.list(&ListParams::default()).await?;
                Ok(list
                    .items
                    .iter()
                    .map(|obj| to_cluster_object(kind, &obj.metadata, $selector(obj)))
                    .collect())
            }};
        }

        match kind {
            ResourceKind::Pod => list_typed!(Pod, no_selector),
            ResourceKind::Deployment => list_typed!(Deployment, deployment_selector),
            ResourceKind::ReplicaSet => list_typed!(ReplicaSet, replica_set_selector),
            ResourceKind::DaemonSet => list_typed!(DaemonSet, daemon_set_selector),
            ResourceKind::Job => list_typed!(Job, job_selector),
            ResourceKind::CronJob => list_typed!(CronJob, cron_job_selector),
            ResourceKind::StatefulSet => list_typed!(StatefulSet, stateful_set_selector),
            ResourceKind::ReplicationController => {
                list_typed!(ReplicationController, replication_controller_selector)
            }
            ResourceKind::Service => list_typed!(Service, service_selector),
            ResourceKind::Namespace => {
                let api: Api<Namespace> = Api::all(client.clone());
                let list = api.list(&ListParams::default()).await?;
                Ok(list
                    .items
                    .iter()
                    .map(|obj| to_cluster_object(kind, &obj.metadata, None))
                    .collect())
            }
            ResourceKind::Authority | ResourceKind::All => {
                Err(MeshError::unsupported(kind, "cluster lookups"))
            }
        }
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<ClusterObject>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&selector_string(selector));
        let list = api.list(&params).await?;
        Ok(list
            .items
            .iter()
            .map(|pod| to_cluster_object(ResourceKind::Pod, &pod.metadata, None))
            .collect())
    }
}

/// Render an equality-based selector in `k=v,k2=v2` form
pub fn selector_string(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(",")
}

fn to_cluster_object(
    kind: ResourceKind,
    metadata: &ObjectMeta,
    selector: Option<BTreeMap<String, String>>,
) -> ClusterObject {
    ClusterObject {
        kind,
        namespace: metadata.namespace.clone().unwrap_or_default(),
        name: metadata.name.clone().unwrap_or_default(),
        uid: metadata.uid.clone().unwrap_or_default(),
        labels: metadata.labels.clone().unwrap_or_default(),
        owner_references: metadata
            .owner_references
            .iter()
            .flatten()
            .map(|owner| OwnerRef {
                kind: owner.kind.clone(),
                name: owner.name.clone(),
                uid: owner.uid.clone(),
                controller: owner.controller.unwrap_or(false),
            })
            .collect(),
        selector,
    }
}

fn match_labels(selector: &LabelSelector) -> Option<BTreeMap<String, String>> {
    selector.match_labels.clone()
}

fn no_selector<T>(_: &T) -> Option<BTreeMap<String, String>> {
    None
}

fn deployment_selector(obj: &Deployment) -> Option<BTreeMap<String, String>> {
    obj.spec.as_ref().and_then(|spec| match_labels(&spec.selector))
}

fn replica_set_selector(obj: &ReplicaSet) -> Option<BTreeMap<String, String>> {
    obj.spec.as_ref().and_then(|spec| match_labels(&spec.selector))
}

fn daemon_set_selector(obj: &DaemonSet) -> Option<BTreeMap<String, String>> {
    obj.spec.as_ref().and_then(|spec| match_labels(&spec.selector))
}

fn stateful_set_selector(obj: &StatefulSet) -> Option<BTreeMap<String, String>> {
    obj.spec.as_ref().and_then(|spec| match_labels(&spec.selector))
}

fn job_selector(obj: &Job) -> Option<BTreeMap<String, String>> {
    obj.spec
        .as_ref()
        .and_then(|spec| spec.selector.as_ref())
        .and_then(match_labels)
}

/// CronJobs have no selector of their own; use the job template's pod labels
fn cron_job_selector(obj: &CronJob) -> Option<BTreeMap<String, String>> {
    obj.spec
        .as_ref()
        .and_then(|spec| spec.job_template.spec.as_ref())
        .and_then(|job| job.template.metadata.as_ref())
        .and_then(|meta| meta.labels.clone())
}

fn replication_controller_selector(
    obj: &ReplicationController,
) -> Option<BTreeMap<String, String>> {
    obj.spec.as_ref().and_then(|spec| spec.selector.clone())
}

fn service_selector(obj: &Service) -> Option<BTreeMap<String, String>> {
    obj.spec.as_ref().and_then(|spec| spec.selector.clone())
}
