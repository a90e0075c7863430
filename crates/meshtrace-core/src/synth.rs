//! Seeded synthetic meshes for demos and tests.
//!
//! A scenario scatters repeaters around a center point, injects prefix
//! clashes, hides some repeaters from the known list, and routes packets
//! between random repeaters along lowest-cost routes over the full mesh.

use crate::arena::{ArenaError, NodeArena, NodeIndex};
use crate::graph::AdjacencyGraph;
use crate::route::shortest_route;
use crate::spatial::SpatialIndex;
use meshtrace_common::{Node, NodeId, Packet, Position};
use meshtrace_link::{LinkCostParams, LinkModel};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Scenario generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// RNG seed; equal seeds give equal scenarios.
    pub seed: u64,
    /// Repeaters in the known list.
    pub node_count: usize,
    /// Repeaters that relay packets but are missing from the known list.
    pub hidden_count: usize,
    /// Packets to route.
    pub packet_count: usize,
    /// Center of the deployment area.
    pub center: Position,
    /// Half-width of the deployment square in km.
    pub spread_km: f64,
    /// Longest accepted route, in hops.
    pub max_hops: usize,
    /// Every n-th repeater reuses the prefix of an earlier one (0 = never).
    pub clash_every: usize,
    /// Max distance of packet endpoints from the first and last repeater, m.
    pub endpoint_jitter_m: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            node_count: 60,
            hidden_count: 4,
            packet_count: 200,
            center: Position::new(51.5074, -0.1278),
            spread_km: 50.0,
            max_hops: 8,
            clash_every: 7,
            endpoint_jitter_m: 300.0,
        }
    }
}

/// A generated mesh with ground truth.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Nodes given to the reconstructor.
    pub known: Vec<Node>,
    /// Nodes withheld from the reconstructor.
    pub hidden: Vec<Node>,
    /// Observed packets.
    pub packets: Vec<Packet>,
    /// True repeater sequence of each packet, in packet order.
    pub routes: Vec<Vec<NodeId>>,
}

/// Generates a scenario.
pub fn generate(config: &SynthConfig, link: &LinkCostParams) -> Result<Scenario, ArenaError> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let total = config.node_count + config.hidden_count;

    let mut ids: HashSet<NodeId> = HashSet::new();
    let mut nodes: Vec<Node> = Vec::with_capacity(total);
    for i in 0..total {
        let clash = config.clash_every > 0 && i > 0 && i % config.clash_every == 0;
        let id = loop {
            let mut bytes: [u8; 3] = rng.gen();
            if clash {
                bytes[0] = nodes[rng.gen_range(0..nodes.len())].prefix();
            }
            let Ok(id) = NodeId::from_bytes(bytes) else {
                continue;
            };
            if ids.insert(id.clone()) {
                break id;
            }
        };

        let east = rng.gen_range(-config.spread_km..=config.spread_km) * 1000.0;
        let north = rng.gen_range(-config.spread_km..=config.spread_km) * 1000.0;
        let position = config.center.offset_m(east, north);
        let name = if i < config.node_count {
            format!("node-{}", i)
        } else {
            format!("hidden-{}", i - config.node_count)
        };
        nodes.push(Node::known(id, name, position));
    }

    let arena = NodeArena::from_nodes(nodes.iter().cloned())?;
    let model = LinkModel::new(*link);
    let graph = AdjacencyGraph::build(&arena, &SpatialIndex::build(&arena), &model);

    let mut packets = Vec::new();
    let mut routes = Vec::new();
    let attempts = config.packet_count.saturating_mul(20);
    for _ in 0..attempts {
        if packets.len() >= config.packet_count || total < 2 {
            break;
        }
        let from = rng.gen_range(0..total);
        let to = rng.gen_range(0..total);
        if from == to {
            continue;
        }
        let (from, to) = (handle(&arena, &nodes[from]), handle(&arena, &nodes[to]));
        let (Some(from), Some(to)) = (from, to) else {
            continue;
        };
        let Some(route) = shortest_route(&graph, from, to) else {
            continue;
        };
        if route.nodes.len() > config.max_hops {
            continue;
        }

        let first = &arena[route.nodes[0]].position;
        let last = &arena[route.nodes[route.nodes.len() - 1]].position;
        let start = jitter(&mut rng, first, config.endpoint_jitter_m);
        let end = jitter(&mut rng, last, config.endpoint_jitter_m);
        let path: Vec<u8> = route.nodes.iter().map(|&n| arena[n].prefix()).collect();

        packets.push(Packet::new(packets.len() as u64 + 1, start, end, path));
        routes.push(route.nodes.iter().map(|&n| arena[n].id.clone()).collect());
    }

    debug!(
        seed = config.seed,
        nodes = total,
        edges = graph.edge_count(),
        packets = packets.len(),
        "generated synthetic scenario"
    );

    let hidden = nodes.split_off(config.node_count);
    Ok(Scenario {
        known: nodes,
        hidden,
        packets,
        routes,
    })
}

fn handle(arena: &NodeArena, node: &Node) -> Option<NodeIndex> {
    arena.lookup(&node.id)
}

fn jitter(rng: &mut ChaCha8Rng, around: &Position, max_m: f64) -> Position {
    if max_m <= 0.0 {
        return *around;
    }
    around.offset_m(rng.gen_range(-max_m..=max_m), rng.gen_range(-max_m..=max_m))
}
