//! Cluster object and pod-set data structures
//!
//! `ClusterObject` is the provider-neutral view of a Kubernetes object that
//! ownership resolution needs: identity, labels, owner references and the
//! pod-template selector where the kind has one.

use std::collections::BTreeMap;

use serde::Serialize;

use super::ResourceKind;

/// Owner reference recorded in an object's metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    /// Kubernetes kind as written in the reference (e.g. "ReplicaSet")
    pub kind: String,
    pub name: String,
    pub uid: String,
    pub controller: bool,
}

/// Child → parent edge derived from an owner reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerEdge {
    pub child_uid: String,
    pub parent_uid: String,
    pub parent_kind: String,
}

/// Provider-neutral cluster object
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterObject {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerRef>,
    /// Pod-template selector (workloads) or pod selector (services)
    pub selector: Option<BTreeMap<String, String>>,
}

impl ClusterObject {
    pub fn new(kind: ResourceKind, namespace: &str, name: &str, uid: &str) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            uid: uid.to_string(),
            labels: BTreeMap::new(),
            owner_references: Vec::new(),
            selector: None,
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_selector(mut self, key: &str, value: &str) -> Self {
        self.selector
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_owner(mut self, kind: &str, name: &str, uid: &str) -> Self {
        self.owner_references.push(OwnerRef {
            kind: kind.to_string(),
            name: name.to_string(),
            uid: uid.to_string(),
            controller: true,
        });
        self
    }

    /// Owner edges pointing from this object to each of its owners
    pub fn owner_edges(&self) -> Vec<OwnerEdge> {
        self.owner_references
            .iter()
            .map(|owner| OwnerEdge {
                child_uid: self.uid.clone(),
                parent_uid: owner.uid.clone(),
                parent_kind: owner.kind.clone(),
            })
            .collect()
    }

    /// Whether any owner reference points at `uid`
    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owner_references.iter().any(|owner| owner.uid == uid)
    }

    /// Whether this object's labels satisfy an equality-based selector
    pub fn matches_selector(&self, selector: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(key, value)| self.labels.get(key) == Some(value))
    }

    /// UID of the controlling owner, falling back to the first owner
    pub fn owner_uid(&self) -> Option<&str> {
        self.owner_references
            .iter()
            .find(|owner| owner.controller)
            .or_else(|| self.owner_references.first())
            .map(|owner| owner.uid.as_str())
    }
}

/// Concrete pod identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodInfo {
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    pub owner_uid: Option<String>,
}

impl From<&ClusterObject> for PodInfo {
    fn from(obj: &ClusterObject) -> Self {
        Self {
            namespace: obj.namespace.clone(),
            name: obj.name.clone(),
            uid: obj.uid.clone(),
            labels: obj.labels.clone(),
            owner_uid: obj.owner_uid().map(str::to_string),
        }
    }
}

/// Set of pods resolved for one resource reference
///
/// Keyed by (namespace, name), so iteration order is deterministic and
/// unions of overlapping resolutions do not duplicate pods.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodSet {
    pods: BTreeMap<(String, String), PodInfo>,
}

impl PodSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pod: PodInfo) {
        self.pods
            .insert((pod.namespace.clone(), pod.name.clone()), pod);
    }

    pub fn extend(&mut self, other: PodSet) {
        self.pods.extend(other.pods);
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.pods
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PodInfo> {
        self.pods.values()
    }

    /// Pod names in (namespace, name) order
    pub fn names(&self) -> Vec<String> {
        self.pods.values().map(|pod| pod.name.clone()).collect()
    }
}

impl FromIterator<PodInfo> for PodSet {
    fn from_iter<I: IntoIterator<Item = PodInfo>>(iter: I) -> Self {
        let mut set = PodSet::new();
        for pod in iter {
            set.insert(pod);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_selector() {
        let pod = ClusterObject::new(ResourceKind::Pod, "default", "web-abc", "p1")
            .with_label("app", "web")
            .with_label("tier", "frontend");

        let mut selector = BTreeMap::new();
        selector.insert("app".to_string(), "web".to_string());
        assert!(pod.matches_selector(&selector));

        selector.insert("tier".to_string(), "backend".to_string());
        assert!(!pod.matches_selector(&selector));

        assert!(pod.matches_selector(&BTreeMap::new()));
    }

    #[test]
    fn test_owner_edges_and_owner_uid() {
        let pod = ClusterObject::new(ResourceKind::Pod, "default", "web-abc", "p1")
            .with_owner("ReplicaSet", "web-rs", "rs1");

        let edges = pod.owner_edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].child_uid, "p1");
        assert_eq!(edges[0].parent_uid, "rs1");
        assert_eq!(edges[0].parent_kind, "ReplicaSet");
        assert_eq!(pod.owner_uid(), Some("rs1"));
        assert!(pod.is_owned_by("rs1"));
        assert!(!pod.is_owned_by("d1"));
    }

    #[test]
    fn test_pod_set_dedups_and_orders() {
        let a = ClusterObject::new(ResourceKind::Pod, "default", "b", "u2");
        let b = ClusterObject::new(ResourceKind::Pod, "default", "a", "u1");

        let mut set: PodSet = [PodInfo::from(&a), PodInfo::from(&b)].into_iter().collect();
        set.insert(PodInfo::from(&a));

        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), vec!["a".to_string(), "b".to_string()]);
        assert!(set.contains("default", "a"));
    }
}
