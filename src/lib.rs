//! meshscope library
//!
//! Core of the meshscope CLI: resolving resources to pods, building and
//! fanning out metric requests, correlating tap events and summarizing live
//! traffic. It can be used both as a binary and as a library for testing.

pub mod aggregate;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod kube;
pub mod models;
pub mod output;
pub mod request;
pub mod resolve;
pub mod tap;
pub mod top;
#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types for convenience
pub use aggregate::{aggregate, discover_endpoints, sort_rows};
pub use error::{MeshError, Result};
pub use request::{build_requests, build_tap_request};
pub use resolve::resolve_pods;
pub use tap::{Correlator, CorrelatorConfig, correlate};
pub use top::SummaryTable;
