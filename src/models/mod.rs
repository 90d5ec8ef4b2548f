//! meshscope model layer
//!
//! Structure:
//! - `resource_kind.rs` - resource kinds, resource references and argument parsing
//! - `object.rs` - provider-neutral cluster objects and resolved pod sets
//! - `metrics.rs` - batch rows returned by the metrics backend
//! - `tap.rs` - tap events and completed exchanges

mod metrics;
mod object;
mod resource_kind;
mod tap;

pub use metrics::{EdgeRow, Endpoint, RouteRow, Row, StatRow};
pub use object::{ClusterObject, OwnerEdge, OwnerRef, PodInfo, PodSet};
pub use resource_kind::{ResourceKind, ResourceRef};
pub use tap::{
    CompletedExchange, Peer, RequestInit, ResponseEnd, ResponseInit, StreamId, TapEvent,
    TapPayload,
};
