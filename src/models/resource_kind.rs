//! Resource kind and resource reference definitions
//!
//! `ResourceKind` is the closed set of resource types the CLI accepts as
//! targets or filters. `ResourceRef` is the immutable (kind, namespace, name)
//! triple built from positional arguments such as `deploy/web` or
//! `deploy web api`.

use std::fmt;
use std::str::FromStr;

use crate::error::{MeshError, Result};

/// Enumeration of all resource kinds understood by meshscope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    // Workloads
    Pod,
    Deployment,
    ReplicaSet,
    DaemonSet,
    Job,
    CronJob,
    StatefulSet,
    ReplicationController,
    // Scopes and traffic targets
    Namespace,
    Service,
    Authority,
    /// Every kind at once; only meaningful for top-line stats
    All,
}

impl ResourceKind {
    /// Get the canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pod",
            ResourceKind::Deployment => "deployment",
            ResourceKind::ReplicaSet => "replicaset",
            ResourceKind::DaemonSet => "daemonset",
            ResourceKind::Job => "job",
            ResourceKind::CronJob => "cronjob",
            ResourceKind::StatefulSet => "statefulset",
            ResourceKind::ReplicationController => "replicationcontroller",
            ResourceKind::Namespace => "namespace",
            ResourceKind::Service => "service",
            ResourceKind::Authority => "authority",
            ResourceKind::All => "all",
        }
    }

    /// Try to parse a string into a ResourceKind, returning None if invalid
    pub fn parse_optional(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    /// Kinds that create and own pods through owner references
    pub fn is_workload(&self) -> bool {
        matches!(
            self,
            ResourceKind::Deployment
                | ResourceKind::ReplicaSet
                | ResourceKind::DaemonSet
                | ResourceKind::Job
                | ResourceKind::CronJob
                | ResourceKind::StatefulSet
                | ResourceKind::ReplicationController
        )
    }

    /// Kinds the cluster-state provider can enumerate
    pub fn is_listable(&self) -> bool {
        self.is_workload()
            || matches!(
                self,
                ResourceKind::Pod | ResourceKind::Namespace | ResourceKind::Service
            )
    }

    /// Intermediate controller between this kind and its pods, if any
    ///
    /// Deployments own pods through ReplicaSets and CronJobs through Jobs;
    /// every other workload owns its pods directly.
    pub fn intermediate_owner(&self) -> Option<ResourceKind> {
        match self {
            ResourceKind::Deployment => Some(ResourceKind::ReplicaSet),
            ResourceKind::CronJob => Some(ResourceKind::Job),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    /// Parse canonical names, plurals and kubectl short names (case-insensitive)
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "po" | "pod" | "pods" => Ok(ResourceKind::Pod),
            "deploy" | "deployment" | "deployments" => Ok(ResourceKind::Deployment),
            "rs" | "replicaset" | "replicasets" => Ok(ResourceKind::ReplicaSet),
            "ds" | "daemonset" | "daemonsets" => Ok(ResourceKind::DaemonSet),
            "job" | "jobs" => Ok(ResourceKind::Job),
            "cj" | "cronjob" | "cronjobs" => Ok(ResourceKind::CronJob),
            "sts" | "statefulset" | "statefulsets" => Ok(ResourceKind::StatefulSet),
            "rc" | "replicationcontroller" | "replicationcontrollers" => {
                Ok(ResourceKind::ReplicationController)
            }
            "ns" | "namespace" | "namespaces" => Ok(ResourceKind::Namespace),
            "svc" | "service" | "services" => Ok(ResourceKind::Service),
            "au" | "authority" | "authorities" => Ok(ResourceKind::Authority),
            "all" => Ok(ResourceKind::All),
            _ => Err(format!("Unknown resource kind: {}", s)),
        }
    }
}

/// A reference to one resource, or to every resource of a kind in a namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub namespace: String,
    /// `None` means "all of kind in namespace"
    pub name: Option<String>,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.map(str::to_string),
        }
    }

    pub fn named(kind: ResourceKind, namespace: impl Into<String>, name: &str) -> Self {
        Self::new(kind, namespace, Some(name))
    }

    pub fn whole_kind(kind: ResourceKind, namespace: impl Into<String>) -> Self {
        Self::new(kind, namespace, None)
    }

    pub fn is_whole_kind(&self) -> bool {
        self.name.is_none()
    }

    /// Parse a single `kind/name` or bare `kind` argument
    pub fn parse(namespace: &str, arg: &str) -> Result<Self> {
        match arg.split_once('/') {
            Some((kind, name)) => {
                if name.is_empty() || name.contains('/') {
                    return Err(MeshError::InvalidArgument(format!(
                        "invalid resource string \"{}\"",
                        arg
                    )));
                }
                Ok(Self::named(parse_kind(kind)?, namespace, name))
            }
            None => Ok(Self::whole_kind(parse_kind(arg)?, namespace)),
        }
    }

    /// Parse positional arguments into resource references, preserving order
    ///
    /// Accepts either every argument as `kind/name`, or a leading `kind`
    /// followed by zero or more names. A lone `kind` yields one whole-kind
    /// reference.
    pub fn parse_args(namespace: &str, args: &[String]) -> Result<Vec<Self>> {
        let Some(first) = args.first() else {
            return Err(MeshError::InvalidArgument(
                "please specify a resource".to_string(),
            ));
        };

        if first.contains('/') {
            return args
                .iter()
                .map(|arg| {
                    if !arg.contains('/') {
                        return Err(MeshError::InvalidArgument(format!(
                            "cannot mix \"kind/name\" and \"kind name\" forms (got \"{}\")",
                            arg
                        )));
                    }
                    Self::parse(namespace, arg)
                })
                .collect();
        }

        let kind = parse_kind(first)?;
        if args.len() == 1 {
            return Ok(vec![Self::whole_kind(kind, namespace)]);
        }

        args[1..]
            .iter()
            .map(|name| {
                if name.is_empty() || name.contains('/') {
                    return Err(MeshError::InvalidArgument(format!(
                        "cannot mix \"kind/name\" and \"kind name\" forms (got \"{}\")",
                        name
                    )));
                }
                Ok(Self::named(kind, namespace, name))
            })
            .collect()
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}/{}", self.kind, name),
            None => write!(f, "{}", self.kind),
        }
    }
}

fn parse_kind(s: &str) -> Result<ResourceKind> {
    ResourceKind::parse_optional(s).ok_or_else(|| MeshError::unsupported(s, "resource queries"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_as_str() {
        assert_eq!(ResourceKind::Deployment.as_str(), "deployment");
        assert_eq!(ResourceKind::ReplicationController.as_str(), "replicationcontroller");
        assert_eq!(ResourceKind::All.as_str(), "all");
    }

    #[test]
    fn test_from_str_aliases() {
        assert_eq!(ResourceKind::parse_optional("deploy"), Some(ResourceKind::Deployment));
        assert_eq!(ResourceKind::parse_optional("Pods"), Some(ResourceKind::Pod));
        assert_eq!(ResourceKind::parse_optional("CJ"), Some(ResourceKind::CronJob));
        assert_eq!(ResourceKind::parse_optional("au"), Some(ResourceKind::Authority));
        assert_eq!(ResourceKind::parse_optional("widgets"), None);
    }

    #[test]
    fn test_every_kind_round_trips_through_display() {
        for kind in [
            ResourceKind::Pod,
            ResourceKind::Deployment,
            ResourceKind::ReplicaSet,
            ResourceKind::DaemonSet,
            ResourceKind::Job,
            ResourceKind::CronJob,
            ResourceKind::StatefulSet,
            ResourceKind::ReplicationController,
            ResourceKind::Namespace,
            ResourceKind::Service,
            ResourceKind::Authority,
            ResourceKind::All,
        ] {
            assert_eq!(ResourceKind::parse_optional(&kind.to_string()), Some(kind));
        }
    }

    #[test]
    fn test_intermediate_owner() {
        assert_eq!(
            ResourceKind::Deployment.intermediate_owner(),
            Some(ResourceKind::ReplicaSet)
        );
        assert_eq!(ResourceKind::CronJob.intermediate_owner(), Some(ResourceKind::Job));
        assert_eq!(ResourceKind::StatefulSet.intermediate_owner(), None);
    }

    #[test]
    fn test_parse_args_slash_form_preserves_order() {
        let refs = ResourceRef::parse_args("default", &args(&["po/b-pod", "deploy/a-deploy"]))
            .unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], ResourceRef::named(ResourceKind::Pod, "default", "b-pod"));
        assert_eq!(
            refs[1],
            ResourceRef::named(ResourceKind::Deployment, "default", "a-deploy")
        );
    }

    #[test]
    fn test_parse_args_kind_then_names() {
        let refs = ResourceRef::parse_args("emojivoto", &args(&["deploy", "web", "voting"]))
            .unwrap();
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|r| r.kind == ResourceKind::Deployment));
        assert_eq!(refs[1].name.as_deref(), Some("voting"));
    }

    #[test]
    fn test_parse_args_lone_kind_is_whole_kind() {
        let refs = ResourceRef::parse_args("default", &args(&["deployments"])).unwrap();
        assert_eq!(refs, vec![ResourceRef::whole_kind(ResourceKind::Deployment, "default")]);
        assert!(refs[0].is_whole_kind());
    }

    #[test]
    fn test_parse_args_rejects_mixed_forms() {
        let err = ResourceRef::parse_args("default", &args(&["deploy/web", "voting"]))
            .unwrap_err();
        assert!(matches!(err, MeshError::InvalidArgument(_)));

        let err = ResourceRef::parse_args("default", &args(&["deploy", "po/web"])).unwrap_err();
        assert!(matches!(err, MeshError::InvalidArgument(_)));
    }

    #[test]
    fn test_parse_args_unknown_kind_is_named() {
        let err = ResourceRef::parse_args("default", &args(&["widget/a"])).unwrap_err();
        match err {
            MeshError::UnsupportedResourceType { kind, .. } => assert_eq!(kind, "widget"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_args_empty() {
        assert!(ResourceRef::parse_args("default", &[]).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ResourceRef::named(ResourceKind::Deployment, "default", "web").to_string(),
            "deployment/web"
        );
        assert_eq!(
            ResourceRef::whole_kind(ResourceKind::Pod, "default").to_string(),
            "pod"
        );
    }
}
