//! Turning clusters into discovered nodes.

use crate::arena::NodeArena;
use crate::cluster::Cluster;
use crate::config::ReconstructionConfig;
use crate::localize::{centroid_only, localize, Localization};
use meshtrace_common::{Node, NodeId, Position};
use meshtrace_link::LinkModel;
use tracing::{debug, warn};

/// Discovered node proposed for one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Promotion {
    /// The new node.
    pub node: Node,
    /// Evidence records in the cluster.
    pub members: usize,
    /// Refinement result the node was placed with.
    pub localization: Localization,
}

/// Proposes a discovered node for every cluster not already explained by a
/// stored node.
///
/// A cluster is skipped when a node with the same prefix (stored, or accepted
/// earlier in this call) lies within the clustering radius of its estimate.
/// Locations are refined against `model`. Identifiers are the lowest free `NodeId::discovered(prefix, seq)`. The
/// function is pure: the same arena and clusters always give the same result,
/// and running it again after merging its output promotes nothing new.
pub fn promote(
    arena: &NodeArena,
    clusters: &[Cluster],
    config: &ReconstructionConfig,
    model: &LinkModel,
) -> Vec<Promotion> {
    let radius_m = config.clustering.radius_km * 1000.0;
    let mut accepted: Vec<Promotion> = Vec::new();

    for cluster in clusters {
        let localization = match localize(
            cluster,
            model,
            &config.clustering,
            &config.localization,
        ) {
            Ok(localization) => localization,
            Err(e) => {
                warn!(
                    prefix = %format!("{:02X}", cluster.prefix),
                    error = %e,
                    "location refinement failed, using centroid"
                );
                centroid_only(cluster, &config.clustering)
            }
        };
        let position = localization.position;

        let near = |p: &Position| p.distance_m(&position) <= radius_m;
        let explained = arena
            .with_prefix(cluster.prefix)
            .iter()
            .any(|&i| near(&arena[i].position))
            || accepted
                .iter()
                .any(|p| p.node.prefix() == cluster.prefix && near(&p.node.position));
        if explained {
            debug!(
                prefix = %format!("{:02X}", cluster.prefix),
                at = %position,
                "cluster already explained by a nearby node"
            );
            continue;
        }

        let id = next_free_id(arena, &accepted, cluster.prefix);
        let node = Node::discovered(
            id,
            position,
            localization.confidence,
            cluster.packets.iter().copied().collect(),
        );
        accepted.push(Promotion {
            node,
            members: cluster.members.len(),
            localization,
        });
    }
    accepted
}

fn next_free_id(arena: &NodeArena, accepted: &[Promotion], prefix: u8) -> NodeId {
    let mut seq = 0u32;
    loop {
        let id = NodeId::discovered(prefix, seq);
        let taken = arena.lookup(&id).is_some() || accepted.iter().any(|p| p.node.id == id);
        if !taken {
            return id;
        }
        seq += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::GhostEvidence;
    use meshtrace_common::{NodeKind, PacketId};
    use std::collections::BTreeSet;

    fn model(config: &ReconstructionConfig) -> LinkModel {
        LinkModel::new(config.link)
    }

    fn cluster(prefix: u8, at: Position, packets: std::ops::Range<u64>) -> Cluster {
        let members: Vec<_> = packets
            .map(|p| GhostEvidence {
                prefix,
                position: at,
                packet: PacketId(p),
                hop: 1,
                cost: 0.0,
                left: at.offset_m(0.0, -10_000.0),
                right: at.offset_m(0.0, 10_000.0),
            })
            .collect();
        Cluster {
            prefix,
            centroid: at,
            packets: members.iter().map(|m| m.packet).collect::<BTreeSet<_>>(),
            members,
        }
    }

    #[test]
    fn test_promotes_with_provenance() {
        let arena = NodeArena::new();
        let at = Position::new(45.0, 7.0);
        let config = ReconstructionConfig::default();
        let promoted = promote(&arena, &[cluster(0x42, at, 0..5)], &config, &model(&config));

        assert_eq!(promoted.len(), 1);
        let node = &promoted[0].node;
        assert_eq!(node.kind, NodeKind::Discovered);
        assert_eq!(node.prefix(), 0x42);
        assert_eq!(node.provenance, (0..5).map(PacketId).collect::<Vec<_>>());
        assert!(node.position.distance_m(&at) < 100.0);
        assert!(node.confidence > 0.0 && node.confidence <= 1.0);
    }

    #[test]
    fn test_promotion_is_idempotent() {
        let config = ReconstructionConfig::default();
        let mut arena = NodeArena::new();
        let clusters = vec![
            cluster(0x42, Position::new(45.0, 7.0), 0..4),
            cluster(0x42, Position::new(45.5, 7.0), 10..14),
        ];

        let first = promote(&arena, &clusters, &config, &model(&config));
        let again = promote(&arena, &clusters, &config, &model(&config));
        assert_eq!(first, again);
        assert_eq!(first.len(), 2);
        assert_ne!(first[0].node.id, first[1].node.id);

        for p in &first {
            arena.push(p.node.clone()).unwrap();
        }
        assert!(promote(&arena, &clusters, &config, &model(&config)).is_empty());
    }

    #[test]
    fn test_nearby_known_node_explains_cluster() {
        let at = Position::new(45.0, 7.0);
        let arena = NodeArena::from_nodes([Node::known(
            "42AB".parse().unwrap(),
            "known",
            at.offset_m(1_000.0, 0.0),
        )])
        .unwrap();
        let config = ReconstructionConfig::default();
        assert!(promote(&arena, &[cluster(0x42, at, 0..5)], &config, &model(&config)).is_empty());
        // a different prefix at the same spot is not explained
        assert_eq!(promote(&arena, &[cluster(0x43, at, 0..5)], &config, &model(&config)).len(), 1);
    }

    #[test]
    fn test_overlapping_clusters_promote_once() {
        let at = Position::new(45.0, 7.0);
        let clusters = vec![
            cluster(0x42, at, 0..3),
            cluster(0x42, at.offset_m(2_000.0, 0.0), 3..6),
        ];
        let config = ReconstructionConfig::default();
        let promoted = promote(&NodeArena::new(), &clusters, &config, &model(&config));
        assert_eq!(promoted.len(), 1);
    }
}
