//! Ghost evidence collected from decoded paths.

use crate::arena::NodeArena;
use crate::decoder::DecodedPath;
use meshtrace_common::{NodeKind, Packet, PacketId, Position};
use std::collections::BTreeMap;

/// One observation of an unmodeled repeater.
#[derive(Debug, Clone, PartialEq)]
pub struct GhostEvidence {
    /// Prefix the ghost stood in for.
    pub prefix: u8,
    /// Estimated position, interpolated between the anchors.
    pub position: Position,
    /// Packet that produced this evidence.
    pub packet: PacketId,
    /// Hop index within the packet.
    pub hop: usize,
    /// Ghost cost paid entering and leaving this hop.
    pub cost: f64,
    /// Nearest resolved position before the ghost (or the packet start).
    pub left: Position,
    /// Nearest resolved position after the ghost (or the packet end).
    pub right: Position,
}

/// Extracts evidence for every ghost hop of a decoded packet.
///
/// A ghost's anchors are the nearest non-ghost hops on either side; a run of
/// ghosts at either end of the path anchors on the packet's own start or end
/// position. The estimate is placed along the great circle between the
/// anchors in proportion to hop index.
pub fn ghost_evidence(arena: &NodeArena, packet: &Packet, path: &DecodedPath) -> Vec<GhostEvidence> {
    let hops = &path.hops;
    let end_slot = hops.len() as isize;

    // Resolved anchor at each hop, or None for ghosts
    let anchors: Vec<Option<Position>> = hops
        .iter()
        .map(|hop| hop.node.map(|index| arena[index].position))
        .collect();

    let mut evidence = Vec::new();
    for (i, hop) in hops.iter().enumerate() {
        if hop.kind != NodeKind::Ghost {
            continue;
        }

        let (left_slot, left) = anchors[..i]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(j, a)| a.map(|p| (j as isize, p)))
            .unwrap_or((-1, packet.start));
        let (right_slot, right) = anchors[i + 1..]
            .iter()
            .enumerate()
            .find_map(|(k, a)| a.map(|p| ((i + 1 + k) as isize, p)))
            .unwrap_or((end_slot, packet.end));

        let t = (i as isize - left_slot) as f64 / (right_slot - left_slot) as f64;
        evidence.push(GhostEvidence {
            prefix: hop.prefix,
            position: left.interpolate(&right, t),
            packet: path.packet,
            hop: i,
            cost: hop.step_cost + path.outgoing_cost(i),
            left,
            right,
        });
    }
    evidence
}

/// Ghost evidence grouped strictly by prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceSet {
    by_prefix: BTreeMap<u8, Vec<GhostEvidence>>,
}

impl EvidenceSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one record.
    pub fn push(&mut self, record: GhostEvidence) {
        self.by_prefix.entry(record.prefix).or_default().push(record);
    }

    /// Adds the evidence of one decoded packet.
    pub fn extend_from_path(&mut self, arena: &NodeArena, packet: &Packet, path: &DecodedPath) {
        for record in ghost_evidence(arena, packet, path) {
            self.push(record);
        }
    }

    /// Combines two partial sets.
    pub fn merge(mut self, other: EvidenceSet) -> EvidenceSet {
        for (prefix, mut records) in other.by_prefix {
            self.by_prefix.entry(prefix).or_default().append(&mut records);
        }
        self
    }

    /// Puts every group in packet then hop order, so results do not depend
    /// on how work was split across threads.
    pub fn sort(&mut self) {
        for records in self.by_prefix.values_mut() {
            records.sort_by_key(|r| (r.packet, r.hop));
        }
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.by_prefix.values().map(Vec::len).sum()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.by_prefix.values().all(Vec::is_empty)
    }

    /// Records for one prefix.
    pub fn for_prefix(&self, prefix: u8) -> &[GhostEvidence] {
        self.by_prefix.get(&prefix).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Groups in ascending prefix order.
    pub fn groups(&self) -> impl Iterator<Item = (u8, &[GhostEvidence])> {
        self.by_prefix.iter().map(|(p, r)| (*p, r.as_slice()))
    }

    /// All records, grouped by ascending prefix.
    pub fn iter(&self) -> impl Iterator<Item = &GhostEvidence> {
        self.by_prefix.values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::NodeIndex;
    use crate::decoder::ResolvedHop;
    use meshtrace_common::Node;

    fn arena() -> NodeArena {
        NodeArena::from_nodes([
            Node::known("AA01".parse().unwrap(), "a", Position::new(45.0, 7.0)),
            Node::known("CC01".parse().unwrap(), "c", Position::new(45.3, 7.0)),
        ])
        .unwrap()
    }

    fn hop(prefix: u8, node: Option<NodeIndex>, kind: NodeKind) -> ResolvedHop {
        ResolvedHop {
            prefix,
            kind,
            node,
            step_cost: 1.0,
        }
    }

    fn path(packet: u64, hops: Vec<ResolvedHop>) -> DecodedPath {
        DecodedPath {
            packet: PacketId(packet),
            total_cost: hops.len() as f64 + 1.0,
            hops,
            exit_cost: 1.0,
        }
    }

    #[test]
    fn test_interior_ghosts_split_the_gap_by_hop_index() {
        let arena = arena();
        let a = arena.lookup(&"AA01".parse().unwrap());
        let c = arena.lookup(&"CC01".parse().unwrap());
        let packet = Packet::new(1, Position::new(45.0, 7.0), Position::new(45.3, 7.0), [0xAA, 0x42, 0x43, 0xCC]);
        let decoded = path(
            1,
            vec![
                hop(0xAA, a, NodeKind::Known),
                hop(0x42, None, NodeKind::Ghost),
                hop(0x43, None, NodeKind::Ghost),
                hop(0xCC, c, NodeKind::Known),
            ],
        );

        let evidence = ghost_evidence(&arena, &packet, &decoded);
        assert_eq!(evidence.len(), 2);
        assert!((evidence[0].position.lat - 45.1).abs() < 1e-6);
        assert!((evidence[1].position.lat - 45.2).abs() < 1e-6);
        assert_eq!(evidence[0].left, Position::new(45.0, 7.0));
        assert_eq!(evidence[1].right, Position::new(45.3, 7.0));
        assert_eq!(evidence[0].cost, 2.0);
    }

    #[test]
    fn test_boundary_ghost_anchors_on_packet_endpoint() {
        let arena = arena();
        let a = arena.lookup(&"AA01".parse().unwrap());
        let end = Position::new(45.2, 7.0);
        let packet = Packet::new(2, Position::new(45.0, 7.0), end, [0xAA, 0x42]);
        let decoded = path(
            2,
            vec![hop(0xAA, a, NodeKind::Known), hop(0x42, None, NodeKind::Ghost)],
        );

        let evidence = ghost_evidence(&arena, &packet, &decoded);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].right, end);
        // halfway between hop 0 and the end slot
        assert!((evidence[0].position.lat - 45.1).abs() < 1e-6);
    }

    #[test]
    fn test_merge_keeps_prefixes_apart_and_sorts() {
        let record = |prefix, packet, hop| GhostEvidence {
            prefix,
            position: Position::new(45.0, 7.0),
            packet: PacketId(packet),
            hop,
            cost: 0.0,
            left: Position::new(45.0, 7.0),
            right: Position::new(45.0, 7.0),
        };

        let mut left = EvidenceSet::new();
        left.push(record(0x42, 5, 1));
        left.push(record(0x43, 1, 0));
        let mut right = EvidenceSet::new();
        right.push(record(0x42, 2, 3));

        let mut merged = left.merge(right);
        merged.sort();
        assert_eq!(merged.len(), 3);
        let packets: Vec<_> = merged.for_prefix(0x42).iter().map(|r| r.packet.0).collect();
        assert_eq!(packets, vec![2, 5]);
        assert_eq!(merged.for_prefix(0x43).len(), 1);
        assert!(merged.for_prefix(0x44).is_empty());
    }
}
