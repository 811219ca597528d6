//! Safe Routing
//!
//! Risk-weighted shortest-path routing over an externally supplied street
//! graph:
//!
//! - [`RoadGraph`] - immutable petgraph street network with an id lookup
//!   and nearest-node snapping
//! - [`provider`] - graph acquisition: a [`GraphSource`] trait plus a
//!   cached-file loader with retry-once, fatal-at-startup semantics
//! - [`RiskRouter`] - A*-style search whose per-edge cost blends physical
//!   length with the live risk field, tuned by a single lambda

use thiserror::Error;

use risk_model::ModelError;

pub mod graph;
pub mod provider;
pub mod router;

pub use graph::{RoadEdge, RoadGraph, RoadNetworkData, RoadNode};
pub use provider::{load_or_fetch, FileGraphSource, GraphSource};
pub use router::{RiskRouter, RouteRequest, RouteResponse, SearchStrategy};

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Blend parameter lambda out of range: {0}")]
    InvalidLambda(f64),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Road graph has no nodes")]
    EmptyGraph,
    #[error("Location ({lat:.4}, {lng:.4}) is {distance_m:.0} m from the nearest street node")]
    Unreachable {
        lat: f64,
        lng: f64,
        distance_m: f64,
    },
    #[error("No route between the resolved endpoints")]
    NoRoute,
    #[error("Graph source unavailable for region {region}: {reason}")]
    SourceUnavailable { region: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RoutingError>;
