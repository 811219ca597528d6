//! Risk-weighted A* search.
//!
//! Per-edge weight: `(1-lambda) * length_m / length_scale + lambda *
//! risk_at(edge midpoint)`. The risk term is a live field query, so edge
//! costs are computed lazily during the search and memoized per route.
//!
//! Heuristic note: the blended weight mixes two incommensurate
//! quantities, so no generally admissible heuristic exists for it. The
//! default strategy uses the deliberately weak estimate
//! `(1-lambda) * great_circle / length_scale`, which bounds the distance
//! term (street length is never shorter than the straight line) but
//! ignores risk entirely; on graphs whose edge lengths understate their
//! geometry it can return a slightly sub-optimal path.
//! [`SearchStrategy::UniformCost`] drops the heuristic for callers that
//! need strict optimality under the mixed metric.

use petgraph::algo::astar;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::graph::RoadGraph;
use crate::{Result, RoutingError};
use risk_field::{RiskField, RiskMemo};
use risk_model::{check_coordinate, haversine_m};

/// How the router expands the search frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStrategy {
    /// A* with the weak distance-only heuristic. Faster; may be slightly
    /// sub-optimal under the mixed metric.
    WeightedAstar,
    /// No heuristic (Dijkstra expansion). Optimal for the blended weight.
    UniformCost,
}

/// A routing request: endpoints as (lng, lat) plus the blend parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start: (f64, f64),
    pub end: (f64, f64),
    /// 0 = pure shortest distance, 1 = pure risk avoidance.
    pub lambda: f64,
}

/// An ordered path of (lng, lat) vertices plus the lambda it was
/// computed with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub coordinates: Vec<(f64, f64)>,
    pub lambda: f64,
}

/// Router over an immutable street graph and a live risk field.
///
/// Owns the graph handle for the process lifetime; stateless per request,
/// so routes may be computed concurrently from many threads.
pub struct RiskRouter {
    graph: Arc<RoadGraph>,
    field: RiskField,
    length_scale: f64,
    max_snap_m: f64,
    strategy: SearchStrategy,
}

impl RiskRouter {
    pub fn new(graph: Arc<RoadGraph>, field: RiskField) -> Self {
        let config = field.config();
        let length_scale = graph.length_scale(config.length_sample_cap);
        let max_snap_m = config.max_snap_m;
        info!(length_scale, "router initialized");
        Self {
            graph,
            field,
            length_scale,
            max_snap_m,
            strategy: SearchStrategy::WeightedAstar,
        }
    }

    /// Override the length normalization scale (tests, pre-computed values).
    pub fn with_length_scale(mut self, length_scale: f64) -> Self {
        self.length_scale = length_scale;
        self
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    /// Compute a risk-weighted route.
    pub fn route(&self, request: &RouteRequest) -> Result<RouteResponse> {
        let lambda = request.lambda;
        if !lambda.is_finite() || !(0.0..=1.0).contains(&lambda) {
            return Err(RoutingError::InvalidLambda(lambda));
        }
        let (start_lng, start_lat) = request.start;
        let (end_lng, end_lat) = request.end;
        check_coordinate(start_lat, start_lng)?;
        check_coordinate(end_lat, end_lng)?;
        if self.graph.node_count() == 0 {
            return Err(RoutingError::EmptyGraph);
        }

        let start = self.snap(start_lat, start_lng)?;
        let goal = self.snap(end_lat, end_lng)?;
        let goal_node = *self.graph.node(goal);

        let scale = self.length_scale.max(1e-6);
        let mut memo = RiskMemo::new();

        let found = astar(
            self.graph.inner(),
            start,
            |n| n == goal,
            |e| {
                let u = self.graph.node(e.source());
                let v = self.graph.node(e.target());
                let mid_lat = (u.lat + v.lat) * 0.5;
                let mid_lng = (u.lng + v.lng) * 0.5;
                // Graph coordinates are validated at build time, so the
                // midpoint of two valid coordinates is itself valid.
                let risk = memo.risk_at_validated(&self.field, mid_lat, mid_lng);
                (1.0 - lambda) * *e.weight() / scale + lambda * risk
            },
            |n| match self.strategy {
                SearchStrategy::WeightedAstar => {
                    let node = self.graph.node(n);
                    (1.0 - lambda)
                        * haversine_m(node.lat, node.lng, goal_node.lat, goal_node.lng)
                        / scale
                }
                SearchStrategy::UniformCost => 0.0,
            },
        );

        let Some((cost, path)) = found else {
            return Err(RoutingError::NoRoute);
        };

        debug!(
            lambda,
            cost,
            vertices = path.len(),
            field_queries = memo.len(),
            "route found"
        );

        let coordinates = path
            .into_iter()
            .map(|idx| {
                let node = self.graph.node(idx);
                (node.lng, node.lat)
            })
            .collect();

        Ok(RouteResponse {
            coordinates,
            lambda,
        })
    }

    fn snap(&self, lat: f64, lng: f64) -> Result<petgraph::graph::NodeIndex> {
        let (idx, distance_m) = self
            .graph
            .nearest_node(lat, lng)
            .ok_or(RoutingError::EmptyGraph)?;
        if distance_m > self.max_snap_m {
            return Err(RoutingError::Unreachable {
                lat,
                lng,
                distance_m,
            });
        }
        Ok(idx)
    }
}
