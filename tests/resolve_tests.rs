//! Tests for resolving resources to the pods that back them
//!
//! Runs against an in-memory cluster so ownership edge cases can be laid
//! out explicitly without a Kubernetes API server.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use meshscope::error::{MeshError, Result};
use meshscope::kube::ClusterState;
use meshscope::models::{ClusterObject, ResourceKind, ResourceRef};
use meshscope::resolve_pods;

/// In-memory cluster state that counts calls
#[derive(Default)]
struct FakeCluster {
    objects: Vec<ClusterObject>,
    gets: AtomicUsize,
    lists: AtomicUsize,
    pod_lists: AtomicUsize,
}

impl FakeCluster {
    fn new(objects: Vec<ClusterObject>) -> Self {
        Self {
            objects,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
            + self.lists.load(Ordering::SeqCst)
            + self.pod_lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterState for FakeCluster {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterObject>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .objects
            .iter()
            .find(|o| {
                o.kind == kind
                    && o.name == name
                    && (kind == ResourceKind::Namespace || o.namespace == namespace)
            })
            .cloned())
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<ClusterObject>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .objects
            .iter()
            .filter(|o| o.kind == kind && namespace.is_none_or(|ns| o.namespace == ns))
            .cloned()
            .collect())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<ClusterObject>> {
        self.pod_lists.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .objects
            .iter()
            .filter(|o| {
                o.kind == ResourceKind::Pod
                    && o.namespace == namespace
                    && o.matches_selector(selector)
            })
            .cloned()
            .collect())
    }
}

fn pod(name: &str, uid: &str) -> ClusterObject {
    ClusterObject::new(ResourceKind::Pod, "default", name, uid)
}

/// Two deployments with the same selector, each owning one ReplicaSet
fn overlapping_deployments() -> FakeCluster {
    FakeCluster::new(vec![
        ClusterObject::new(ResourceKind::Deployment, "default", "deploy-1", "d1")
            .with_selector("app", "web"),
        ClusterObject::new(ResourceKind::Deployment, "default", "deploy-2", "d2")
            .with_selector("app", "web"),
        ClusterObject::new(ResourceKind::ReplicaSet, "default", "deploy-1-rs", "rs1")
            .with_owner("Deployment", "deploy-1", "d1"),
        ClusterObject::new(ResourceKind::ReplicaSet, "default", "deploy-2-rs", "rs2")
            .with_owner("Deployment", "deploy-2", "d2"),
        pod("deploy-1-pod-a", "p1")
            .with_label("app", "web")
            .with_owner("ReplicaSet", "deploy-1-rs", "rs1"),
        pod("deploy-1-pod-b", "p2")
            .with_label("app", "web")
            .with_owner("ReplicaSet", "deploy-1-rs", "rs1"),
        pod("deploy-2-pod-a", "p3")
            .with_label("app", "web")
            .with_owner("ReplicaSet", "deploy-2-rs", "rs2"),
    ])
}

#[tokio::test]
async fn test_overlapping_selectors_resolve_by_ownership() {
    let cluster = overlapping_deployments();

    let first = resolve_pods(
        &cluster,
        &ResourceRef::named(ResourceKind::Deployment, "default", "deploy-1"),
    )
    .await
    .unwrap();
    assert_eq!(first.names(), vec!["deploy-1-pod-a", "deploy-1-pod-b"]);

    let second = resolve_pods(
        &cluster,
        &ResourceRef::named(ResourceKind::Deployment, "default", "deploy-2"),
    )
    .await
    .unwrap();
    assert_eq!(second.names(), vec!["deploy-2-pod-a"]);
}

#[tokio::test]
async fn test_deployment_skips_selector_match_without_owner() {
    let cluster = FakeCluster::new(vec![
        ClusterObject::new(ResourceKind::Deployment, "default", "web", "d1")
            .with_selector("app", "web"),
        ClusterObject::new(ResourceKind::ReplicaSet, "default", "web-6d4f", "rs1")
            .with_owner("Deployment", "web", "d1"),
        pod("web-abc", "p1")
            .with_label("app", "web")
            .with_owner("ReplicaSet", "web-6d4f", "rs1"),
        // Same labels, but created by hand
        pod("web-xyz", "p2").with_label("app", "web"),
    ]);

    let pods = resolve_pods(
        &cluster,
        &ResourceRef::named(ResourceKind::Deployment, "default", "web"),
    )
    .await
    .unwrap();

    assert_eq!(pods.names(), vec!["web-abc"]);
    assert!(!pods.contains("default", "web-xyz"));
    let web = pods.iter().next().unwrap();
    assert_eq!(web.owner_uid.as_deref(), Some("rs1"));
}

#[tokio::test]
async fn test_missing_resource_is_not_found() {
    let cluster = FakeCluster::default();
    let err = resolve_pods(
        &cluster,
        &ResourceRef::named(ResourceKind::StatefulSet, "default", "db"),
    )
    .await
    .unwrap_err();

    match err {
        MeshError::NotFound {
            kind,
            namespace,
            name,
        } => {
            assert_eq!(kind, ResourceKind::StatefulSet);
            assert_eq!(namespace, "default");
            assert_eq!(name, "db");
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_authority_and_all_are_unsupported_without_cluster_calls() {
    let cluster = FakeCluster::default();

    for target in [
        ResourceRef::named(ResourceKind::Authority, "default", "web.default.svc:8080"),
        ResourceRef::whole_kind(ResourceKind::All, "default"),
    ] {
        let err = resolve_pods(&cluster, &target).await.unwrap_err();
        assert!(
            matches!(err, MeshError::UnsupportedResourceType { .. }),
            "{} should be unsupported, got {:?}",
            target,
            err
        );
    }
    assert_eq!(cluster.calls(), 0);
}

#[tokio::test]
async fn test_whole_kind_is_union_of_each_object() {
    let cluster = overlapping_deployments();

    let pods = resolve_pods(
        &cluster,
        &ResourceRef::whole_kind(ResourceKind::Deployment, "default"),
    )
    .await
    .unwrap();

    assert_eq!(
        pods.names(),
        vec!["deploy-1-pod-a", "deploy-1-pod-b", "deploy-2-pod-a"]
    );
}

#[tokio::test]
async fn test_service_resolves_by_selector_only() {
    let cluster = FakeCluster::new(vec![
        ClusterObject::new(ResourceKind::Service, "default", "web", "s1")
            .with_selector("app", "web"),
        ClusterObject::new(ResourceKind::Service, "default", "external", "s2"),
        pod("web-abc", "p1")
            .with_label("app", "web")
            .with_owner("ReplicaSet", "web-6d4f", "rs1"),
        pod("web-manual", "p2").with_label("app", "web"),
        pod("api-abc", "p3").with_label("app", "api"),
    ]);

    let pods = resolve_pods(
        &cluster,
        &ResourceRef::named(ResourceKind::Service, "default", "web"),
    )
    .await
    .unwrap();
    assert_eq!(pods.names(), vec!["web-abc", "web-manual"]);

    // A service without a selector matches nothing rather than everything
    let pods = resolve_pods(
        &cluster,
        &ResourceRef::named(ResourceKind::Service, "default", "external"),
    )
    .await
    .unwrap();
    assert!(pods.is_empty());
}

#[tokio::test]
async fn test_namespace_resolves_to_every_pod_in_it() {
    let mut objects = vec![
        ClusterObject::new(ResourceKind::Namespace, "", "staging", "n1"),
        ClusterObject::new(ResourceKind::Pod, "staging", "worker-1", "p1"),
        ClusterObject::new(ResourceKind::Pod, "staging", "worker-2", "p2"),
    ];
    objects.push(pod("web-abc", "p3"));
    let cluster = FakeCluster::new(objects);

    let pods = resolve_pods(
        &cluster,
        &ResourceRef::named(ResourceKind::Namespace, "default", "staging"),
    )
    .await
    .unwrap();

    assert_eq!(pods.names(), vec!["worker-1", "worker-2"]);
    assert!(pods.iter().all(|p| p.namespace == "staging"));
}

#[tokio::test]
async fn test_pod_resolves_to_itself() {
    let cluster = FakeCluster::new(vec![pod("web-abc", "p1")]);

    let pods = resolve_pods(
        &cluster,
        &ResourceRef::named(ResourceKind::Pod, "default", "web-abc"),
    )
    .await
    .unwrap();

    assert_eq!(pods.names(), vec!["web-abc"]);
    assert_eq!(cluster.pod_lists.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cronjob_owns_pods_through_jobs() {
    let cluster = FakeCluster::new(vec![
        ClusterObject::new(ResourceKind::CronJob, "default", "backup", "c1")
            .with_selector("job", "backup"),
        ClusterObject::new(ResourceKind::Job, "default", "backup-28000", "j1")
            .with_owner("CronJob", "backup", "c1"),
        ClusterObject::new(ResourceKind::Job, "default", "adhoc", "j2"),
        pod("backup-28000-x", "p1")
            .with_label("job", "backup")
            .with_owner("Job", "backup-28000", "j1"),
        pod("adhoc-y", "p2")
            .with_label("job", "backup")
            .with_owner("Job", "adhoc", "j2"),
    ]);

    let pods = resolve_pods(
        &cluster,
        &ResourceRef::named(ResourceKind::CronJob, "default", "backup"),
    )
    .await
    .unwrap();

    assert_eq!(pods.names(), vec!["backup-28000-x"]);
}

#[tokio::test]
async fn test_direct_owner_workload() {
    let cluster = FakeCluster::new(vec![
        ClusterObject::new(ResourceKind::DaemonSet, "default", "agent", "ds1")
            .with_selector("app", "agent"),
        pod("agent-node1", "p1")
            .with_label("app", "agent")
            .with_owner("DaemonSet", "agent", "ds1"),
        pod("agent-node2", "p2")
            .with_label("app", "agent")
            .with_owner("DaemonSet", "agent", "ds1"),
    ]);

    let pods = resolve_pods(
        &cluster,
        &ResourceRef::named(ResourceKind::DaemonSet, "default", "agent"),
    )
    .await
    .unwrap();

    assert_eq!(pods.len(), 2);
    // DaemonSets own pods directly, so no intermediate controllers are listed
    assert_eq!(cluster.lists.load(Ordering::SeqCst), 0);
}
