//! Immutable street graph.
//!
//! Loaded once per process and never mutated afterwards; the router only
//! reads it, so any number of route computations may share one instance.

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::Result;
use risk_model::{check_coordinate, haversine_m};

/// A street intersection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadNode {
    pub id: i64,
    pub lng: f64,
    pub lat: f64,
}

/// A walkable segment between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadEdge {
    pub u: i64,
    pub v: i64,
    pub length_m: f64,
}

/// Wire format for a region's street network, as produced by the graph
/// source and persisted in the local cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadNetworkData {
    pub nodes: Vec<RoadNode>,
    pub edges: Vec<RoadEdge>,
}

/// Undirected street graph with node-id lookup and nearest-node snapping.
#[derive(Debug)]
pub struct RoadGraph {
    graph: UnGraph<RoadNode, f64>,
    node_index: HashMap<i64, NodeIndex>,
}

impl RoadGraph {
    /// Build a graph from wire data. Nodes with invalid coordinates and
    /// edges referencing unknown nodes are skipped and counted.
    pub fn from_data(data: RoadNetworkData) -> Result<Self> {
        let mut graph = UnGraph::with_capacity(data.nodes.len(), data.edges.len());
        let mut node_index = HashMap::with_capacity(data.nodes.len());

        let mut skipped_nodes = 0usize;
        for node in data.nodes {
            if check_coordinate(node.lat, node.lng).is_err() {
                skipped_nodes += 1;
                continue;
            }
            let idx = graph.add_node(node);
            node_index.insert(node.id, idx);
        }

        let mut skipped_edges = 0usize;
        for edge in data.edges {
            let (Some(&u), Some(&v)) = (node_index.get(&edge.u), node_index.get(&edge.v)) else {
                skipped_edges += 1;
                continue;
            };
            if !(edge.length_m.is_finite() && edge.length_m > 0.0) {
                skipped_edges += 1;
                continue;
            }
            graph.add_edge(u, v, edge.length_m);
        }

        if skipped_nodes > 0 || skipped_edges > 0 {
            warn!(skipped_nodes, skipped_edges, "malformed graph entries dropped");
        }
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "road graph built"
        );

        Ok(Self { graph, node_index })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node(&self, idx: NodeIndex) -> &RoadNode {
        &self.graph[idx]
    }

    pub fn node_by_id(&self, id: i64) -> Option<NodeIndex> {
        self.node_index.get(&id).copied()
    }

    /// Closest graph node to a coordinate, with its great-circle distance
    /// in meters.
    pub fn nearest_node(&self, lat: f64, lng: f64) -> Option<(NodeIndex, f64)> {
        let mut best: Option<(NodeIndex, f64)> = None;
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            let d = haversine_m(lat, lng, node.lat, node.lng);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((idx, d));
            }
        }
        best
    }

    /// Median edge length over a bounded sample (meters).
    ///
    /// Normalizes the router's distance term to ~O(1) regardless of city
    /// scale. Falls back to 50 m on an edgeless graph.
    pub fn length_scale(&self, sample_cap: usize) -> f64 {
        let mut lengths: Vec<f64> = self
            .graph
            .edge_weights()
            .take(sample_cap)
            .copied()
            .collect();
        if lengths.is_empty() {
            return 50.0;
        }
        lengths.sort_by(f64::total_cmp);
        lengths[lengths.len() / 2]
    }

    pub(crate) fn inner(&self) -> &UnGraph<RoadNode, f64> {
        &self.graph
    }
}
