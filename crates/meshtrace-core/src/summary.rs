//! Exportable per-packet results and the network summary.

use crate::arena::{NodeArena, NodeIndex};
use crate::graph::{AdjacencyGraph, EdgeKey};
use crate::pipeline::PacketOutcome;
use meshtrace_common::{NodeId, NodeKind, PacketId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decode status of one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketStatus {
    /// A path was found.
    Decoded,
    /// No feasible path exists.
    Failed,
    /// The packet was malformed.
    Rejected,
}

/// One resolved hop in a packet report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopReport {
    /// Prefix as two hex digits.
    pub prefix: String,
    /// Known, discovered or ghost.
    pub kind: NodeKind,
    /// Full identifier of the chosen node; absent for ghosts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
}

/// Result for one packet, ready for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketReport {
    /// Packet identifier.
    pub packet: PacketId,
    /// Outcome.
    pub status: PacketStatus,
    /// Resolved hops (empty unless decoded).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hops: Vec<HopReport>,
    /// Total path cost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    /// Hop index where decoding became infeasible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_hop: Option<usize>,
    /// Rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PacketReport {
    /// Builds the report for an outcome.
    pub fn new(arena: &NodeArena, outcome: &PacketOutcome) -> Self {
        match outcome {
            PacketOutcome::Decoded(path) => Self {
                packet: path.packet,
                status: PacketStatus::Decoded,
                hops: path
                    .hops
                    .iter()
                    .map(|hop| HopReport {
                        prefix: format!("{:02X}", hop.prefix),
                        kind: hop.kind,
                        node: hop.node.map(|n| arena[n].id.clone()),
                    })
                    .collect(),
                total_cost: Some(path.total_cost),
                failed_hop: None,
                reason: None,
            },
            PacketOutcome::Failed { packet, hop } => Self {
                packet: *packet,
                status: PacketStatus::Failed,
                hops: Vec::new(),
                total_cost: None,
                failed_hop: Some(*hop),
                reason: None,
            },
            PacketOutcome::Rejected { packet, reason } => Self {
                packet: *packet,
                status: PacketStatus::Rejected,
                hops: Vec::new(),
                total_cost: None,
                failed_hop: None,
                reason: Some(reason.to_string()),
            },
        }
    }
}

/// A node in the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    /// Full identifier.
    pub id: NodeId,
    /// Display name.
    pub name: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Known or discovered.
    pub kind: NodeKind,
    /// 1.0 for known nodes.
    pub confidence: f64,
    /// Supporting packets of a discovered node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<PacketId>,
}

/// A feasible link in the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSummary {
    /// Lower identifier of the pair.
    pub from: NodeId,
    /// Higher identifier of the pair.
    pub to: NodeId,
    /// Number of decoded path steps using this link, in either direction.
    /// Zero for links no path took.
    pub traversals: usize,
    /// Link cost.
    pub cost: f64,
    /// Link length in km.
    pub distance_km: f64,
    /// Whether terrain obstructs the link.
    pub terrain_blocked: bool,
    /// `exp(-cost)` scaled by `t / (t + 1)` for `t` traversals.
    pub confidence: f64,
}

/// Every node plus every feasible link of the graph, with how often decoded
/// paths used it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    /// Nodes in arena order.
    pub nodes: Vec<NodeSummary>,
    /// Edges by (from, to) identifier.
    pub edges: Vec<EdgeSummary>,
}

/// Confidence of a link from its cost and how often it was traversed.
pub fn edge_confidence(cost: f64, traversals: usize) -> f64 {
    let t = traversals as f64;
    (-cost).exp() * t / (t + 1.0)
}

impl NetworkSummary {
    /// Summarizes decoded outcomes.
    pub fn build(arena: &NodeArena, graph: &AdjacencyGraph, outcomes: &[PacketOutcome]) -> Self {
        let nodes = arena
            .iter()
            .map(|(_, node)| NodeSummary {
                id: node.id.clone(),
                name: node.name.clone(),
                lat: node.position.lat,
                lon: node.position.lon,
                kind: node.kind,
                confidence: node.confidence,
                provenance: node.provenance.clone(),
            })
            .collect();

        let mut traversals: BTreeMap<EdgeKey, usize> = BTreeMap::new();
        for outcome in outcomes {
            let PacketOutcome::Decoded(path) = outcome else {
                continue;
            };
            for pair in path.hops.windows(2) {
                if let (Some(a), Some(b)) = (pair[0].node, pair[1].node) {
                    if a != b {
                        *traversals.entry(EdgeKey::new(a, b)).or_default() += 1;
                    }
                }
            }
        }

        let mut edges: Vec<EdgeSummary> = graph
            .edges()
            .map(|(key, link)| {
                let count = traversals.get(&key).copied().unwrap_or(0);
                let (from, to) = ordered_ids(arena, key.low(), key.high());
                EdgeSummary {
                    from,
                    to,
                    traversals: count,
                    cost: link.cost,
                    distance_km: link.distance_km,
                    terrain_blocked: link.terrain_blocked,
                    confidence: edge_confidence(link.cost, count),
                }
            })
            .collect();
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));

        Self { nodes, edges }
    }
}

fn ordered_ids(arena: &NodeArena, a: NodeIndex, b: NodeIndex) -> (NodeId, NodeId) {
    let (a, b) = (&arena[a].id, &arena[b].id);
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}
