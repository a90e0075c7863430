//! Per-packet Viterbi decoding over prefix candidates.
//!
//! Each hop of a packet's path is a layer of candidate states: every stored
//! node whose prefix matches the recorded byte, plus one ghost standing for
//! an unmodeled repeater with that prefix. Emission is binary and already
//! enforced by candidate construction, so only transition costs matter:
//!
//! - node to node: the cached graph cost (absent = infeasible)
//! - anything into or out of a ghost: the fixed ghost cost
//! - start position to hop 0 and last hop to end position: the link model
//!
//! Ties resolve to the earlier candidate in layer order, which puts stored
//! nodes (ascending identifier) before the ghost.

use crate::arena::{NodeArena, NodeIndex};
use crate::graph::AdjacencyGraph;
use meshtrace_common::{NodeKind, Packet, PacketError, PacketId};
use meshtrace_link::LinkModel;
use thiserror::Error;

/// One state in a trellis layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Candidate {
    /// A stored (known or discovered) node.
    Node(NodeIndex),
    /// An unmodeled repeater with the hop's prefix.
    Ghost,
}

/// How one hop of a packet was resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHop {
    /// Prefix recorded in the packet.
    pub prefix: u8,
    /// Known, Discovered or Ghost.
    pub kind: NodeKind,
    /// The chosen node; `None` for a ghost.
    pub node: Option<NodeIndex>,
    /// Cost of the transition into this hop.
    pub step_cost: f64,
}

/// Most likely node sequence for one packet.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPath {
    /// Packet decoded.
    pub packet: PacketId,
    /// One entry per path byte.
    pub hops: Vec<ResolvedHop>,
    /// Cost from the last hop to the end position.
    pub exit_cost: f64,
    /// Sum of all transition costs.
    pub total_cost: f64,
}

impl DecodedPath {
    /// Number of hops resolved to a ghost.
    pub fn ghost_hops(&self) -> usize {
        self.hops.iter().filter(|h| h.kind == NodeKind::Ghost).count()
    }

    /// Cost of leaving hop `i` (into the next hop or the end position).
    pub fn outgoing_cost(&self, i: usize) -> f64 {
        self.hops
            .get(i + 1)
            .map(|next| next.step_cost)
            .unwrap_or(self.exit_cost)
    }
}

/// Why a packet could not be decoded.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    /// The packet failed validation.
    #[error("packet {packet} rejected: {reason}")]
    Malformed {
        /// Packet identifier.
        packet: PacketId,
        /// Validation failure.
        #[source]
        reason: PacketError,
    },

    /// Every state at `hop` is unreachable. `hop` equals the path length when
    /// the end position is unreachable from every final state.
    #[error("packet {packet}: no feasible path at hop {hop}")]
    Infeasible {
        /// Packet identifier.
        packet: PacketId,
        /// Failing hop index.
        hop: usize,
    },
}

impl DecodeError {
    /// Packet the error refers to.
    pub fn packet(&self) -> PacketId {
        match self {
            DecodeError::Malformed { packet, .. } | DecodeError::Infeasible { packet, .. } => *packet,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TrellisState {
    candidate: Candidate,
    cost: f64,
    step: f64,
    back: Option<usize>,
}

/// Decodes packets against a fixed node set.
///
/// Holds only shared references, so one decoder can serve many threads.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    arena: &'a NodeArena,
    graph: &'a AdjacencyGraph,
    model: &'a LinkModel,
    ghost_cost: Option<f64>,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder. `ghost_cost` of `None` disables ghost states.
    pub fn new(
        arena: &'a NodeArena,
        graph: &'a AdjacencyGraph,
        model: &'a LinkModel,
        ghost_cost: Option<f64>,
    ) -> Self {
        Self {
            arena,
            graph,
            model,
            ghost_cost,
        }
    }

    /// Finds the minimum-cost node sequence for a packet.
    pub fn decode(&self, packet: &Packet) -> Result<DecodedPath, DecodeError> {
        packet.validate().map_err(|reason| DecodeError::Malformed {
            packet: packet.id,
            reason,
        })?;

        let infeasible = |hop| DecodeError::Infeasible {
            packet: packet.id,
            hop,
        };
        let hop_count = packet.hop_count();
        let mut trellis: Vec<Vec<TrellisState>> = Vec::with_capacity(hop_count);

        let first: Vec<_> = self
            .candidates(packet.path[0])
            .filter_map(|candidate| {
                self.entry_cost(packet, candidate).map(|cost| TrellisState {
                    candidate,
                    cost,
                    step: cost,
                    back: None,
                })
            })
            .collect();
        if first.is_empty() {
            return Err(infeasible(0));
        }
        trellis.push(first);

        for hop in 1..hop_count {
            let previous = &trellis[hop - 1];
            let mut layer = Vec::new();

            for candidate in self.candidates(packet.path[hop]) {
                let mut best: Option<TrellisState> = None;
                for (i, state) in previous.iter().enumerate() {
                    let Some(step) = self.transition(state.candidate, candidate) else {
                        continue;
                    };
                    let cost = state.cost + step;
                    if best.map_or(true, |b| cost < b.cost) {
                        best = Some(TrellisState {
                            candidate,
                            cost,
                            step,
                            back: Some(i),
                        });
                    }
                }
                layer.extend(best);
            }

            if layer.is_empty() {
                return Err(infeasible(hop));
            }
            trellis.push(layer);
        }

        let last = &trellis[hop_count - 1];
        let mut terminal: Option<(usize, f64, f64)> = None;
        for (i, state) in last.iter().enumerate() {
            let Some(exit) = self.exit_cost(packet, state.candidate) else {
                continue;
            };
            let total = state.cost + exit;
            if terminal.map_or(true, |(_, best, _)| total < best) {
                terminal = Some((i, total, exit));
            }
        }
        let (mut cursor, total_cost, exit_cost) = terminal.ok_or_else(|| infeasible(hop_count))?;

        let mut hops = Vec::with_capacity(hop_count);
        for hop in (0..hop_count).rev() {
            let state = trellis[hop][cursor];
            let (kind, node) = match state.candidate {
                Candidate::Node(index) => (self.arena[index].kind, Some(index)),
                Candidate::Ghost => (NodeKind::Ghost, None),
            };
            hops.push(ResolvedHop {
                prefix: packet.path[hop],
                kind,
                node,
                step_cost: state.step,
            });
            if let Some(back) = state.back {
                cursor = back;
            }
        }
        hops.reverse();

        Ok(DecodedPath {
            packet: packet.id,
            hops,
            exit_cost,
            total_cost,
        })
    }

    /// Candidate layer for a prefix: matching nodes by identifier, then the ghost.
    fn candidates(&self, prefix: u8) -> impl Iterator<Item = Candidate> + 'a {
        self.arena
            .with_prefix(prefix)
            .iter()
            .map(|&index| Candidate::Node(index))
            .chain(self.ghost_cost.map(|_| Candidate::Ghost))
    }

    fn transition(&self, from: Candidate, to: Candidate) -> Option<f64> {
        match (from, to) {
            (Candidate::Node(a), Candidate::Node(b)) => self.graph.cost(a, b),
            _ => self.ghost_cost,
        }
    }

    fn entry_cost(&self, packet: &Packet, candidate: Candidate) -> Option<f64> {
        match candidate {
            Candidate::Node(index) => self.model.cost(&packet.start, &self.arena[index].position),
            Candidate::Ghost => self.ghost_cost,
        }
    }

    fn exit_cost(&self, packet: &Packet, candidate: Candidate) -> Option<f64> {
        match candidate {
            Candidate::Node(index) => self.model.cost(&self.arena[index].position, &packet.end),
            Candidate::Ghost => self.ghost_cost,
        }
    }
}
