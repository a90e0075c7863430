//! R-tree over node positions for radius gating.
//!
//! Points are stored as ECEF coordinates so a surface-distance radius maps to
//! an exact chord-length query, with no special cases at the antimeridian or
//! the poles.

use crate::arena::{NodeArena, NodeIndex};
use meshtrace_common::{chord_length_m, Position};
use meshtrace_link::LinkCostParams;
use rstar::primitives::GeomWithData;
use rstar::RTree;

type IndexedPoint = GeomWithData<[f64; 3], NodeIndex>;

/// Relative slack on query radii so points exactly at the cutoff are kept.
const RADIUS_SLACK: f64 = 1e-9;

/// Gating radius in meters for a link model.
///
/// The horizon is the only hard limit; bulge and terrain are soft penalties,
/// so nothing beyond the horizon can ever be feasible.
pub fn gating_radius_m(params: &LinkCostParams) -> f64 {
    params.horizon_m()
}

/// Spatial index of node positions.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: RTree<IndexedPoint>,
}

impl SpatialIndex {
    /// Bulk-loads every node in the arena.
    pub fn build(arena: &NodeArena) -> Self {
        let points = arena
            .iter()
            .map(|(index, node)| GeomWithData::new(node.position.to_ecef(), index))
            .collect();
        Self {
            tree: RTree::bulk_load(points),
        }
    }

    /// Adds one node.
    pub fn insert(&mut self, index: NodeIndex, position: &Position) {
        self.tree.insert(GeomWithData::new(position.to_ecef(), index));
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Nodes within `radius_m` of surface distance from `center`, ascending by
    /// handle.
    pub fn within(&self, center: &Position, radius_m: f64) -> Vec<NodeIndex> {
        let chord = chord_length_m(radius_m) * (1.0 + RADIUS_SLACK);
        let mut found: Vec<_> = self
            .tree
            .locate_within_distance(center.to_ecef(), chord * chord)
            .map(|point| point.data)
            .collect();
        found.sort_unstable();
        found
    }

    /// Every unordered pair of distinct nodes within `radius_m` of each
    /// other, as `(lower, higher)` handles in ascending order.
    pub fn gated_pairs(&self, arena: &NodeArena, radius_m: f64) -> Vec<(NodeIndex, NodeIndex)> {
        let mut pairs = Vec::new();
        for (index, node) in arena.iter() {
            for other in self.within(&node.position, radius_m) {
                if other > index {
                    pairs.push((index, other));
                }
            }
        }
        pairs
    }
}
