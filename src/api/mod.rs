//! Metrics backend seams
//!
//! The aggregation and tap layers talk to the metrics backend only through
//! these traits, so tests can substitute in-memory clients.

mod http;

pub use http::HttpMetricsClient;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;
use crate::models::{Endpoint, Row, TapEvent};
use crate::request::{MetricRequest, TapRequest};

/// Ordered, fallible feed of tap events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<TapEvent>> + Send>>;

/// Batch stats, edges and routes
#[async_trait]
pub trait MetricsClient: Send + Sync {
    /// Fetch the rows answering one request
    async fn fetch(&self, request: &MetricRequest) -> Result<Vec<Row>>;
}

/// Live request/response events
#[async_trait]
pub trait TapClient: Send + Sync {
    /// Open a tap subscription; the stream ends when the backend closes it
    async fn tap(&self, request: &TapRequest) -> Result<EventStream>;
}

/// Pod endpoints behind an authority
#[async_trait]
pub trait EndpointsClient: Send + Sync {
    async fn endpoints(&self, authority: &str) -> Result<Vec<Endpoint>>;
}
