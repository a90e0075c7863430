//! Lowest-cost routes over the adjacency graph.

use crate::arena::NodeIndex;
use crate::graph::AdjacencyGraph;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A node sequence with its summed link cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Nodes from source to destination, inclusive.
    pub nodes: Vec<NodeIndex>,
    /// Sum of link costs along the route.
    pub cost: f64,
}

impl Route {
    /// Number of links traversed.
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    node: NodeIndex,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (cheapest first, then lowest handle)
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Dijkstra's algorithm from `from` to `to`.
///
/// Returns `None` if `to` is unreachable. Equal-cost alternatives resolve to
/// the route settled through lower node handles first.
pub fn shortest_route(graph: &AdjacencyGraph, from: NodeIndex, to: NodeIndex) -> Option<Route> {
    let n = graph.node_count();
    if from.index() >= n || to.index() >= n {
        return None;
    }

    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<NodeIndex>> = vec![None; n];
    let mut heap = BinaryHeap::new();

    dist[from.index()] = 0.0;
    heap.push(Frontier {
        cost: 0.0,
        node: from,
    });

    while let Some(Frontier { cost, node }) = heap.pop() {
        if node == to {
            let mut nodes = vec![to];
            let mut current = to;
            while let Some(p) = prev[current.index()] {
                nodes.push(p);
                current = p;
            }
            nodes.reverse();
            return Some(Route { nodes, cost });
        }
        if cost > dist[node.index()] {
            continue;
        }

        for &next in graph.neighbors(node) {
            let Some(step) = graph.cost(node, next) else {
                continue;
            };
            let candidate = cost + step;
            if candidate < dist[next.index()] {
                dist[next.index()] = candidate;
                prev[next.index()] = Some(node);
                heap.push(Frontier {
                    cost: candidate,
                    node: next,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::NodeArena;
    use crate::spatial::SpatialIndex;
    use meshtrace_common::{Node, Position};
    use meshtrace_link::{LinkCostParams, LinkModel, DB_TO_COST};

    fn line(count: usize, spacing_deg: f64) -> (NodeArena, AdjacencyGraph) {
        let arena = NodeArena::from_nodes((0..count).map(|i| {
            Node::known(
                format!("{:02X}01", i + 1).parse().unwrap(),
                format!("n{}", i),
                Position::new(45.0 + i as f64 * spacing_deg, 7.0),
            )
        }))
        .unwrap();
        let model = LinkModel::new(LinkCostParams::default());
        let graph = AdjacencyGraph::build(&arena, &SpatialIndex::build(&arena), &model);
        (arena, graph)
    }

    #[test]
    fn test_prefers_short_hops_over_long_bulged_link() {
        // 0.5 deg (~55 km) links carry bulge penalty; 0.25 deg ones do not
        let (arena, graph) = line(3, 0.25);
        let first = arena.lookup(&"0101".parse().unwrap()).unwrap();
        let last = arena.lookup(&"0301".parse().unwrap()).unwrap();

        let route = shortest_route(&graph, first, last).unwrap();
        assert_eq!(route.hops(), 2);
        assert!((route.cost - 12.0 * DB_TO_COST).abs() < 1e-9);
    }

    #[test]
    fn test_unreachable() {
        let (arena, graph) = line(2, 2.0);
        let a = arena.lookup(&"0101".parse().unwrap()).unwrap();
        let b = arena.lookup(&"0201".parse().unwrap()).unwrap();
        assert!(shortest_route(&graph, a, b).is_none());
    }

    #[test]
    fn test_route_to_self() {
        let (arena, graph) = line(1, 0.0);
        let a = arena.lookup(&"0101".parse().unwrap()).unwrap();
        let route = shortest_route(&graph, a, a).unwrap();
        assert_eq!(route.nodes, vec![a]);
        assert_eq!(route.cost, 0.0);
    }
}
