//! Sparse adjacency graph of feasible links.

use crate::arena::{NodeArena, NodeIndex};
use crate::spatial::{gating_radius_m, SpatialIndex};
use meshtrace_link::{LinkCost, LinkModel};
use meshtrace_metrics::{metric_defs, metrics};
use rayon::prelude::*;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Unordered node pair, stored as `(lower, higher)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey(NodeIndex, NodeIndex);

impl EdgeKey {
    /// Normalizes a pair.
    pub fn new(a: NodeIndex, b: NodeIndex) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    /// Lower handle.
    pub fn low(&self) -> NodeIndex {
        self.0
    }

    /// Higher handle.
    pub fn high(&self) -> NodeIndex {
        self.1
    }
}

/// Cached costs of every feasible link between gated node pairs.
///
/// Infeasible pairs are simply absent. Read-only once built; a changed node
/// set means a new graph.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyGraph {
    edges: HashMap<EdgeKey, LinkCost>,
    neighbors: Vec<Vec<NodeIndex>>,
}

impl AdjacencyGraph {
    /// Evaluates every gated pair in parallel on the current rayon pool.
    pub fn build(arena: &NodeArena, index: &SpatialIndex, model: &LinkModel) -> Self {
        let start = Instant::now();
        let pairs = index.gated_pairs(arena, gating_radius_m(model.params()));
        let candidate_pairs = pairs.len();

        let evaluated: Vec<(EdgeKey, LinkCost)> = pairs
            .into_par_iter()
            .filter_map(|(a, b)| {
                model
                    .evaluate(&arena[a].position, &arena[b].position)
                    .map(|link| (EdgeKey::new(a, b), link))
            })
            .collect();

        let mut neighbors = vec![Vec::new(); arena.len()];
        let mut edges = HashMap::with_capacity(evaluated.len());
        for (key, link) in evaluated {
            neighbors[key.low().index()].push(key.high());
            neighbors[key.high().index()].push(key.low());
            edges.insert(key, link);
        }
        for list in &mut neighbors {
            list.sort_unstable();
        }

        let graph = Self { edges, neighbors };
        let blocked = graph.edges.values().filter(|l| l.terrain_blocked).count();
        let elapsed = start.elapsed();

        metrics::gauge!(metric_defs::GRAPH_NODES.name).set(arena.len() as f64);
        metrics::gauge!(metric_defs::GRAPH_EDGES.name).set(graph.edge_count() as f64);
        metrics::gauge!(metric_defs::GRAPH_BLOCKED_EDGES.name).set(blocked as f64);
        metrics::histogram!(metric_defs::GRAPH_BUILD_TIME.name).record(elapsed.as_secs_f64() * 1000.0);
        debug!(
            nodes = arena.len(),
            candidate_pairs,
            edges = graph.edge_count(),
            blocked,
            elapsed_ms = elapsed.as_millis() as u64,
            "built adjacency graph"
        );
        graph
    }

    /// Cost of the link between two nodes, or `None` if infeasible.
    pub fn cost(&self, a: NodeIndex, b: NodeIndex) -> Option<f64> {
        self.edge(a, b).map(|link| link.cost)
    }

    /// Full link record between two nodes.
    pub fn edge(&self, a: NodeIndex, b: NodeIndex) -> Option<&LinkCost> {
        self.edges.get(&EdgeKey::new(a, b))
    }

    /// Feasible neighbors of a node, ascending.
    pub fn neighbors(&self, node: NodeIndex) -> &[NodeIndex] {
        self.neighbors
            .get(node.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of feasible edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of nodes the graph was built over.
    pub fn node_count(&self) -> usize {
        self.neighbors.len()
    }

    /// All edges, in no particular order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, &LinkCost)> {
        self.edges.iter().map(|(key, link)| (*key, link))
    }
}
