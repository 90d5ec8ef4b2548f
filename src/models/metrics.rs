//! Batch metric rows returned by the metrics backend

use serde::{Deserialize, Serialize};

/// Top-line traffic stats for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatRow {
    pub namespace: String,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub meshed_pods: u32,
    #[serde(default)]
    pub running_pods: u32,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    #[serde(default)]
    pub latency_ms_p50: Option<u64>,
    #[serde(default)]
    pub latency_ms_p95: Option<u64>,
    #[serde(default)]
    pub latency_ms_p99: Option<u64>,
    #[serde(default)]
    pub tcp_open_connections: Option<u64>,
    pub time_window: String,
}

impl StatRow {
    pub fn success_rate(&self) -> Option<f64> {
        success_rate(self.success_count, self.failure_count)
    }
}

/// One observed connection edge between two resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRow {
    pub src_namespace: String,
    pub src: String,
    pub dst_namespace: String,
    pub dst: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub no_identity_msg: Option<String>,
}

/// Per-route stats for a service profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRow {
    pub namespace: String,
    /// Resource the routes belong to
    pub name: String,
    pub route: String,
    pub authority: String,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    #[serde(default)]
    pub requests_per_sec: f64,
    #[serde(default)]
    pub latency_ms_p50: Option<u64>,
    #[serde(default)]
    pub latency_ms_p95: Option<u64>,
    #[serde(default)]
    pub latency_ms_p99: Option<u64>,
}

impl RouteRow {
    pub fn success_rate(&self) -> Option<f64> {
        success_rate(self.success_count, self.failure_count)
    }
}

/// A batch row of any request kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Row {
    Stat(StatRow),
    Edge(EdgeRow),
    Route(RouteRow),
}

impl Row {
    /// Stable display key: namespace, then name
    pub fn sort_key(&self) -> (&str, &str) {
        match self {
            Row::Stat(row) => (&row.namespace, &row.name),
            Row::Edge(row) => (&row.src_namespace, &row.src),
            Row::Route(row) => (&row.namespace, &row.name),
        }
    }
}

/// A pod endpoint backing an authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub namespace: String,
    pub pod: String,
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub service: Option<String>,
}

fn success_rate(success: u64, failure: u64) -> Option<f64> {
    let total = success + failure;
    if total == 0 {
        None
    } else {
        Some(success as f64 / total as f64)
    }
}
