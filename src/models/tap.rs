//! Tap event data structures
//!
//! A tap feed is an ordered stream of request-init, response-init and
//! response-end events. Events belonging to one request/response exchange
//! share a `StreamId`.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One side of a tapped connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    /// `ip:port`
    pub address: String,
    /// Mesh metadata (namespace, pod, deployment, ...)
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Peer {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Human-readable name: the owning pod when known, else the address
    pub fn display_name(&self) -> String {
        match self.labels.get("pod") {
            Some(pod) => pod.clone(),
            None => self.address.clone(),
        }
    }
}

/// Identity of one exchange within a tap feed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId {
    pub source: String,
    pub destination: String,
    pub sequence: u64,
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} #{}", self.source, self.destination, self.sequence)
    }
}

/// Request headers observed when a request starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestInit {
    pub method: String,
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub authority: String,
    pub path: String,
    /// Service-profile route label, when the proxy knows it
    #[serde(default)]
    pub route: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Response headers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseInit {
    pub http_status: u16,
    pub since_request_init: Duration,
}

/// End of the response stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnd {
    /// `grpc-status` trailer
    #[serde(default)]
    pub grpc_status: Option<u32>,
    /// Stream reset error code
    #[serde(default)]
    pub reset_error_code: Option<u32>,
    pub since_request_init: Duration,
    #[serde(default)]
    pub since_response_init: Duration,
    #[serde(default)]
    pub response_bytes: u64,
}

/// Event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum TapPayload {
    RequestInit(RequestInit),
    ResponseInit(ResponseInit),
    ResponseEnd(ResponseEnd),
}

/// One event from the tap feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapEvent {
    pub source: Peer,
    pub destination: Peer,
    /// Per-connection stream sequence number
    pub stream: u64,
    pub payload: TapPayload,
}

impl TapEvent {
    pub fn stream_id(&self) -> StreamId {
        StreamId {
            source: self.source.address.clone(),
            destination: self.destination.address.clone(),
            sequence: self.stream,
        }
    }
}

/// A request/response pair whose init and end halves were both observed
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedExchange {
    pub id: StreamId,
    pub source: Peer,
    pub destination: Peer,
    pub method: String,
    pub authority: String,
    pub path: String,
    pub route: Option<String>,
    pub started_at: DateTime<Utc>,
    /// `None` when the stream ended without response headers
    pub http_status: Option<u16>,
    pub grpc_status: Option<u32>,
    pub reset_error_code: Option<u32>,
    /// Request-init to response-end
    pub latency: Duration,
}

impl CompletedExchange {
    /// HTTP status below 500, gRPC status absent or OK, and no stream reset
    pub fn is_success(&self) -> bool {
        let http_ok = self.http_status.is_none_or(|status| status < 500);
        let grpc_ok = self.grpc_status.is_none_or(|code| code == 0);
        http_ok && grpc_ok && self.reset_error_code.is_none()
    }
}
