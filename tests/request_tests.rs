//! Tests for building metric and tap requests from command-line input
//!
//! Invalid invocations must be rejected before the cluster is touched, so
//! every rejection test also asserts the cluster saw zero calls.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use meshscope::error::{MeshError, Result};
use meshscope::kube::ClusterState;
use meshscope::models::{ClusterObject, ResourceKind, ResourceRef};
use meshscope::request::{
    QueryOptions, RequestKind, TapOptions, TrafficFilter, build_requests, build_tap_request,
};

#[derive(Default)]
struct CountingCluster {
    objects: Vec<ClusterObject>,
    calls: AtomicUsize,
    scopes: std::sync::Mutex<Vec<Option<String>>>,
}

impl CountingCluster {
    fn with(objects: Vec<ClusterObject>) -> Self {
        Self {
            objects,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterState for CountingCluster {
    async fn get(
        &self,
        _kind: ResourceKind,
        _namespace: &str,
        _name: &str,
    ) -> Result<Option<ClusterObject>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Vec<ClusterObject>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut scopes) = self.scopes.lock() {
            scopes.push(namespace.map(str::to_string));
        }
        Ok(self
            .objects
            .iter()
            .filter(|o| o.kind == kind && namespace.is_none_or(|ns| o.namespace == ns))
            .cloned()
            .collect())
    }

    async fn list_pods(
        &self,
        _namespace: &str,
        _selector: &BTreeMap<String, String>,
    ) -> Result<Vec<ClusterObject>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn opts(kind: RequestKind) -> QueryOptions {
    QueryOptions {
        request_kind: kind,
        ..Default::default()
    }
}

async fn rejected(resources: &[&str], opts: QueryOptions) -> MeshError {
    let cluster = CountingCluster::default();
    let err = build_requests(&cluster, &args(resources), &opts)
        .await
        .expect_err("invocation should be rejected");
    assert_eq!(cluster.calls(), 0, "rejected invocation touched the cluster");
    err
}

#[tokio::test]
async fn test_to_and_from_are_mutually_exclusive() {
    let err = rejected(
        &["deploy/web"],
        QueryOptions {
            to_resource: Some("deploy/api".to_string()),
            from_resource: Some("deploy/db".to_string()),
            ..opts(RequestKind::Stats)
        },
    )
    .await;
    assert!(matches!(err, MeshError::ConflictingOptions(_)));

    let err = rejected(
        &["deploy/web"],
        QueryOptions {
            to_namespace: Some("prod".to_string()),
            from_namespace: Some("staging".to_string()),
            ..opts(RequestKind::Stats)
        },
    )
    .await;
    assert!(matches!(err, MeshError::ConflictingOptions(_)));
}

#[tokio::test]
async fn test_edges_reject_traffic_filters() {
    let err = rejected(
        &["deploy"],
        QueryOptions {
            to_resource: Some("deploy/api".to_string()),
            ..opts(RequestKind::Edges)
        },
    )
    .await;
    assert!(matches!(err, MeshError::ConflictingOptions(_)));
}

#[tokio::test]
async fn test_edges_reject_service_authority_and_all() {
    for target in ["svc/web", "au/web.default.svc:8080", "all"] {
        let err = rejected(&[target], opts(RequestKind::Edges)).await;
        assert!(
            matches!(
                err,
                MeshError::UnsupportedResourceType {
                    operation: "edges",
                    ..
                }
            ),
            "{} should be unsupported for edges, got {:?}",
            target,
            err
        );
    }
}

#[tokio::test]
async fn test_routes_reject_authority() {
    let err = rejected(&["au/web.default.svc:8080"], opts(RequestKind::Routes)).await;
    assert!(matches!(err, MeshError::UnsupportedResourceType { .. }));
}

#[tokio::test]
async fn test_all_namespaces_rejects_named_resource() {
    let err = rejected(
        &["deploy/web"],
        QueryOptions {
            all_namespaces: true,
            ..opts(RequestKind::Stats)
        },
    )
    .await;
    assert!(matches!(err, MeshError::ConflictingOptions(_)));
}

#[tokio::test]
async fn test_namespace_target_rejects_namespace_filters() {
    let err = rejected(
        &["ns/prod"],
        QueryOptions {
            to_namespace: Some("staging".to_string()),
            ..opts(RequestKind::Stats)
        },
    )
    .await;
    assert!(matches!(err, MeshError::ConflictingOptions(_)));
}

#[tokio::test]
async fn test_invalid_output_and_time_window() {
    let err = rejected(
        &["deploy/web"],
        QueryOptions {
            output: "yaml".to_string(),
            ..opts(RequestKind::Stats)
        },
    )
    .await;
    assert!(matches!(err, MeshError::InvalidArgument(_)));

    let err = rejected(
        &["deploy/web"],
        QueryOptions {
            time_window: "5 minutes".to_string(),
            ..opts(RequestKind::Stats)
        },
    )
    .await;
    assert!(matches!(err, MeshError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_unknown_kind_and_missing_resource() {
    let err = rejected(&["widgets/web"], opts(RequestKind::Stats)).await;
    assert!(matches!(err, MeshError::UnsupportedResourceType { .. }));

    let err = rejected(&[], opts(RequestKind::Stats)).await;
    assert!(matches!(err, MeshError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_from_authority_is_unsupported() {
    let err = rejected(
        &["deploy/web"],
        QueryOptions {
            from_resource: Some("au/api.default.svc:8080".to_string()),
            ..opts(RequestKind::Stats)
        },
    )
    .await;
    assert!(matches!(
        err,
        MeshError::UnsupportedResourceType {
            operation: "--from filters",
            ..
        }
    ));
}

#[tokio::test]
async fn test_named_targets_keep_argument_order() {
    let cluster = CountingCluster::default();
    let requests = build_requests(
        &cluster,
        &args(&["deploy", "web", "api", "db"]),
        &opts(RequestKind::Stats),
    )
    .await
    .unwrap();

    let names: Vec<_> = requests
        .iter()
        .map(|r| r.target.name.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["web", "api", "db"]);
    assert!(requests.iter().all(|r| r.kind == RequestKind::Stats));
    assert_eq!(cluster.calls(), 0);
}

#[tokio::test]
async fn test_whole_kind_expands_sorted_by_namespace_then_name() {
    let cluster = CountingCluster::with(vec![
        ClusterObject::new(ResourceKind::Deployment, "prod", "web", "1"),
        ClusterObject::new(ResourceKind::Deployment, "default", "web", "2"),
        ClusterObject::new(ResourceKind::Deployment, "default", "api", "3"),
    ]);

    let requests = build_requests(
        &cluster,
        &args(&["deploy"]),
        &QueryOptions {
            all_namespaces: true,
            ..opts(RequestKind::Stats)
        },
    )
    .await
    .unwrap();

    let targets: Vec<_> = requests.iter().map(|r| r.target.clone()).collect();
    assert_eq!(
        targets,
        vec![
            ResourceRef::named(ResourceKind::Deployment, "default", "api"),
            ResourceRef::named(ResourceKind::Deployment, "default", "web"),
            ResourceRef::named(ResourceKind::Deployment, "prod", "web"),
        ]
    );
    assert!(requests.iter().all(|r| r.all_namespaces));
    assert_eq!(*cluster.scopes.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn test_whole_kind_lists_only_the_target_namespace() {
    let cluster = CountingCluster::with(vec![
        ClusterObject::new(ResourceKind::Deployment, "prod", "web", "1"),
        ClusterObject::new(ResourceKind::Deployment, "default", "api", "2"),
    ]);

    let requests = build_requests(&cluster, &args(&["deploy"]), &opts(RequestKind::Stats))
        .await
        .unwrap();

    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target.name.as_deref(), Some("api"));
    assert_eq!(
        *cluster.scopes.lock().unwrap(),
        vec![Some("default".to_string())]
    );
}

#[tokio::test]
async fn test_authority_whole_kind_is_not_expanded() {
    let cluster = CountingCluster::default();
    let requests = build_requests(&cluster, &args(&["au"]), &opts(RequestKind::Stats))
        .await
        .unwrap();

    assert_eq!(requests.len(), 1);
    assert!(requests[0].target.is_whole_kind());
    assert_eq!(cluster.calls(), 0);
}

#[tokio::test]
async fn test_filters_attach_to_every_request() {
    let cluster = CountingCluster::default();
    let requests = build_requests(
        &cluster,
        &args(&["deploy/web", "deploy/api"]),
        &QueryOptions {
            to_resource: Some("svc/db".to_string()),
            to_namespace: Some("data".to_string()),
            ..opts(RequestKind::Routes)
        },
    )
    .await
    .unwrap();

    let expected = TrafficFilter::To(ResourceRef::named(ResourceKind::Service, "data", "db"));
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.filter.as_ref() == Some(&expected)));
}

#[tokio::test]
async fn test_bare_namespace_flag_filters_on_namespace() {
    let cluster = CountingCluster::default();
    let requests = build_requests(
        &cluster,
        &args(&["deploy/web"]),
        &QueryOptions {
            from_namespace: Some("staging".to_string()),
            ..opts(RequestKind::Stats)
        },
    )
    .await
    .unwrap();

    assert_eq!(
        requests[0].filter,
        Some(TrafficFilter::From(ResourceRef::named(
            ResourceKind::Namespace,
            "staging",
            "staging"
        )))
    );
}

#[test]
fn test_tap_request_rejects_from_and_bad_rate() {
    let from = QueryOptions {
        from_resource: Some("deploy/api".to_string()),
        ..Default::default()
    };
    let err = build_tap_request(&args(&["deploy/web"]), &from, &TapOptions::default()).unwrap_err();
    assert!(matches!(err, MeshError::ConflictingOptions(_)));

    for max_rps in [0.0, -1.0, f64::NAN] {
        let tap = TapOptions {
            max_rps,
            ..Default::default()
        };
        let err =
            build_tap_request(&args(&["deploy/web"]), &QueryOptions::default(), &tap).unwrap_err();
        assert!(matches!(err, MeshError::InvalidArgument(_)));
    }
}

#[test]
fn test_tap_request_needs_exactly_one_target() {
    let err = build_tap_request(
        &args(&["deploy", "web", "api"]),
        &QueryOptions::default(),
        &TapOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, MeshError::InvalidArgument(_)));

    let err = build_tap_request(&args(&["all"]), &QueryOptions::default(), &TapOptions::default())
        .unwrap_err();
    assert!(matches!(err, MeshError::UnsupportedResourceType { .. }));
}

#[test]
fn test_tap_request_carries_filters() {
    let opts = QueryOptions {
        namespace: "prod".to_string(),
        to_resource: Some("svc/api".to_string()),
        ..Default::default()
    };
    let tap = TapOptions {
        max_rps: 10.0,
        method: Some("POST".to_string()),
        path_prefix: Some("/orders".to_string()),
        authority: None,
    };

    let request = build_tap_request(&args(&["deploy/web"]), &opts, &tap).unwrap();
    assert_eq!(
        request.target,
        ResourceRef::named(ResourceKind::Deployment, "prod", "web")
    );
    assert_eq!(
        request.to,
        Some(ResourceRef::named(ResourceKind::Service, "prod", "api"))
    );
    assert_eq!(request.max_rps, 10.0);
    assert_eq!(request.method.as_deref(), Some("POST"));
    assert_eq!(request.path_prefix.as_deref(), Some("/orders"));
}

#[test]
fn test_tap_request_rejects_stray_to_namespace() {
    let without_to = QueryOptions {
        to_namespace: Some("prod".to_string()),
        ..Default::default()
    };
    let err = build_tap_request(&args(&["deploy/web"]), &without_to, &TapOptions::default())
        .unwrap_err();
    assert!(matches!(err, MeshError::ConflictingOptions(ref msg) if msg.contains("--to")));

    let namespace_target = QueryOptions {
        to_resource: Some("svc/api".to_string()),
        to_namespace: Some("prod".to_string()),
        ..Default::default()
    };
    let err = build_tap_request(
        &args(&["ns/default"]),
        &namespace_target,
        &TapOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, MeshError::ConflictingOptions(_)));

    // The same peer is fine for a workload target
    let request = build_tap_request(
        &args(&["deploy/web"]),
        &namespace_target,
        &TapOptions::default(),
    )
    .unwrap();
    assert_eq!(
        request.to,
        Some(ResourceRef::named(ResourceKind::Service, "prod", "api"))
    );
}
