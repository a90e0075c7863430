//! Density-based clustering of ghost evidence.
//!
//! Standard DBSCAN run separately for every prefix: a point with at least
//! `min_points` evidence positions (itself included) within `radius_km` is a
//! core point, clusters grow through core points, and points not reachable
//! from any core point are noise. A cluster is kept only if its members come
//! from at least `min_points` distinct packets, so one long packet full of
//! ghosts cannot promote a node on its own.

use crate::config::ClusteringConfig;
use crate::evidence::{EvidenceSet, GhostEvidence};
use meshtrace_common::{chord_length_m, PacketId, Position};
use rstar::primitives::GeomWithData;
use rstar::RTree;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

/// A dense group of ghost evidence for one prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Shared prefix.
    pub prefix: u8,
    /// Member evidence, in evidence order.
    pub members: Vec<GhostEvidence>,
    /// Spherical mean of member positions.
    pub centroid: Position,
    /// Distinct supporting packets.
    pub packets: BTreeSet<PacketId>,
}

impl Cluster {
    /// Number of distinct supporting packets.
    pub fn support(&self) -> usize {
        self.packets.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Label {
    Unvisited,
    Noise,
    Member(usize),
}

/// Clusters every prefix group of an evidence set.
///
/// The output is ordered by prefix, then by the first member's position in
/// the (sorted) evidence, so identical input yields identical clusters.
pub fn cluster_evidence(evidence: &EvidenceSet, config: &ClusteringConfig) -> Vec<Cluster> {
    let radius_m = config.radius_km * 1000.0;
    let mut clusters = Vec::new();

    for (prefix, records) in evidence.groups() {
        let positions: Vec<Position> = records.iter().map(|r| r.position).collect();
        let groups = dbscan(&positions, radius_m, config.min_points);
        let found = groups.len();

        let mut kept = 0usize;
        for group in groups {
            let members: Vec<GhostEvidence> = group.iter().map(|&i| records[i].clone()).collect();
            let packets: BTreeSet<PacketId> = members.iter().map(|m| m.packet).collect();
            if packets.len() < config.min_points {
                continue;
            }
            let Some(centroid) = Position::centroid(members.iter().map(|m| &m.position)) else {
                continue;
            };
            clusters.push(Cluster {
                prefix,
                members,
                centroid,
                packets,
            });
            kept += 1;
        }

        debug!(
            prefix = %format!("{prefix:02X}"),
            evidence = records.len(),
            dense = found,
            kept,
            "clustered ghost evidence"
        );
    }
    clusters
}

/// DBSCAN over surface positions. Returns member indices per cluster, each
/// ascending, clusters in order of their first core point.
pub fn dbscan(positions: &[Position], radius_m: f64, min_points: usize) -> Vec<Vec<usize>> {
    if positions.is_empty() {
        return Vec::new();
    }

    let tree = RTree::bulk_load(
        positions
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new(p.to_ecef(), i))
            .collect(),
    );
    let chord = chord_length_m(radius_m) * (1.0 + 1e-9);
    let region = |i: usize| -> Vec<usize> {
        let mut found: Vec<usize> = tree
            .locate_within_distance(positions[i].to_ecef(), chord * chord)
            .map(|point| point.data)
            .collect();
        found.sort_unstable();
        found
    };

    let mut labels = vec![Label::Unvisited; positions.len()];
    let mut count = 0usize;

    for i in 0..positions.len() {
        if labels[i] != Label::Unvisited {
            continue;
        }
        let neighbors = region(i);
        if neighbors.len() < min_points {
            labels[i] = Label::Noise;
            continue;
        }

        let cluster = count;
        count += 1;
        labels[i] = Label::Member(cluster);

        let mut queue: VecDeque<usize> = neighbors.into();
        while let Some(j) = queue.pop_front() {
            match labels[j] {
                Label::Member(_) => {}
                // border point
                Label::Noise => labels[j] = Label::Member(cluster),
                Label::Unvisited => {
                    labels[j] = Label::Member(cluster);
                    let reach = region(j);
                    if reach.len() >= min_points {
                        queue.extend(reach);
                    }
                }
            }
        }
    }

    let mut clusters = vec![Vec::new(); count];
    for (i, label) in labels.iter().enumerate() {
        if let Label::Member(c) = label {
            clusters[*c].push(i);
        }
    }
    clusters
}
