//! Resource resolution
//!
//! Resolves a resource reference down to the pods that back it. Label
//! selectors narrow the candidate set; owner references decide membership,
//! so two workloads with overlapping selectors never claim each other's pods.
//!
//! Ownership is at most two hops:
//! - Pod → ReplicaSet → Deployment
//! - Pod → Job → CronJob
//! - Pod → DaemonSet / StatefulSet / Job / ReplicaSet / ReplicationController

use std::collections::{BTreeMap, HashSet};

use crate::error::{MeshError, Result};
use crate::kube::ClusterState;
use crate::models::{ClusterObject, PodInfo, PodSet, ResourceKind, ResourceRef};

/// Resolve a resource reference to the set of pods backing it
pub async fn resolve_pods<C>(cluster: &C, target: &ResourceRef) -> Result<PodSet>
where
    C: ClusterState + ?Sized,
{
    if matches!(target.kind, ResourceKind::Authority | ResourceKind::All) {
        return Err(MeshError::unsupported(target.kind, "pod resolution"));
    }

    match &target.name {
        Some(name) => {
            let obj = cluster
                .get(target.kind, &target.namespace, name)
                .await?
                .ok_or_else(|| MeshError::not_found(target.kind, &target.namespace, name))?;
            resolve_object(cluster, &obj).await
        }
        None => {
            let scope = match target.kind {
                ResourceKind::Namespace => None,
                _ => Some(target.namespace.as_str()),
            };
            let objects = cluster.list(target.kind, scope).await?;
            tracing::debug!(
                "Resolving {} {} object(s) in namespace {}",
                objects.len(),
                target.kind,
                target.namespace
            );

            let mut pods = PodSet::new();
            for obj in &objects {
                pods.extend(resolve_object(cluster, obj).await?);
            }
            Ok(pods)
        }
    }
}

/// Resolve one fetched object to its pods
async fn resolve_object<C>(cluster: &C, obj: &ClusterObject) -> Result<PodSet>
where
    C: ClusterState + ?Sized,
{
    match obj.kind {
        ResourceKind::Pod => Ok(std::iter::once(PodInfo::from(obj)).collect()),
        ResourceKind::Namespace => {
            let pods = cluster.list_pods(&obj.name, &BTreeMap::new()).await?;
            Ok(pods.iter().map(PodInfo::from).collect())
        }
        // Services never own pods, so the selector is the only signal
        ResourceKind::Service => match obj.selector.as_ref().filter(|s| !s.is_empty()) {
            Some(selector) => {
                let pods = cluster.list_pods(&obj.namespace, selector).await?;
                Ok(pods.iter().map(PodInfo::from).collect())
            }
            None => Ok(PodSet::new()),
        },
        kind if kind.is_workload() => resolve_workload(cluster, obj).await,
        kind => Err(MeshError::unsupported(kind, "pod resolution")),
    }
}

async fn resolve_workload<C>(cluster: &C, workload: &ClusterObject) -> Result<PodSet>
where
    C: ClusterState + ?Sized,
{
    let selector = workload.selector.clone().unwrap_or_default();
    let candidates = cluster.list_pods(&workload.namespace, &selector).await?;
    let owners = owner_uids(cluster, workload).await?;

    let mut pods = PodSet::new();
    for pod in &candidates {
        let owned = pod
            .owner_edges()
            .iter()
            .any(|edge| owners.contains(&edge.parent_uid));
        if owned {
            pods.insert(PodInfo::from(pod));
        } else {
            tracing::debug!(
                "Skipping pod {}/{}: matches selector of {} {} but is not owned by it",
                pod.namespace,
                pod.name,
                workload.kind,
                workload.name
            );
        }
    }
    Ok(pods)
}

/// UIDs a pod's owner reference may point at to count as owned by `workload`
///
/// The workload's own UID, plus the UIDs of intermediate controllers
/// (ReplicaSets of a Deployment, Jobs of a CronJob) it owns.
async fn owner_uids<C>(cluster: &C, workload: &ClusterObject) -> Result<HashSet<String>>
where
    C: ClusterState + ?Sized,
{
    let mut uids = HashSet::from([workload.uid.clone()]);

    if let Some(intermediate) = workload.kind.intermediate_owner() {
        let controllers = cluster
            .list(intermediate, Some(&workload.namespace))
            .await?;
        uids.extend(
            controllers
                .into_iter()
                .filter(|controller| controller.is_owned_by(&workload.uid))
                .map(|controller| controller.uid),
        );
    }

    Ok(uids)
}
