//! Append-only node storage.

use meshtrace_common::{Node, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Index;
use thiserror::Error;

/// Handle to a node in a [`NodeArena`]. Stable for the arena's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(u32);

impl NodeIndex {
    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Errors adding nodes to the arena.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArenaError {
    /// Two nodes share a full identifier.
    #[error("duplicate node identifier {0}")]
    DuplicateId(NodeId),

    /// Ghosts are decoder states, not stored nodes.
    #[error("ghost node {0} cannot be stored")]
    GhostNode(NodeId),

    /// Position out of range or not finite.
    #[error("node {id} has invalid position ({lat}, {lon})")]
    InvalidPosition {
        /// Node identifier.
        id: NodeId,
        /// Latitude as given.
        lat: f64,
        /// Longitude as given.
        lon: f64,
    },
}

/// Known and discovered nodes, indexed by handle, identifier and prefix.
///
/// The arena only grows, so a [`NodeIndex`] handed out once stays valid and
/// the spatial index and graph can hold handles instead of copies.
#[derive(Debug, Clone)]
pub struct NodeArena {
    nodes: Vec<Node>,
    by_id: HashMap<NodeId, NodeIndex>,
    /// Per prefix, sorted by identifier.
    by_prefix: Vec<Vec<NodeIndex>>,
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            by_id: HashMap::new(),
            by_prefix: vec![Vec::new(); 256],
        }
    }

    /// Builds an arena from a node list.
    pub fn from_nodes<I: IntoIterator<Item = Node>>(nodes: I) -> Result<Self, ArenaError> {
        let mut arena = Self::new();
        for node in nodes {
            arena.push(node)?;
        }
        Ok(arena)
    }

    /// Adds a node and returns its handle.
    pub fn push(&mut self, node: Node) -> Result<NodeIndex, ArenaError> {
        if node.kind == NodeKind::Ghost {
            return Err(ArenaError::GhostNode(node.id));
        }
        if !node.position.is_valid() {
            return Err(ArenaError::InvalidPosition {
                id: node.id,
                lat: node.position.lat,
                lon: node.position.lon,
            });
        }
        if self.by_id.contains_key(&node.id) {
            return Err(ArenaError::DuplicateId(node.id));
        }

        let index = NodeIndex(self.nodes.len() as u32);
        let bucket = &mut self.by_prefix[node.prefix() as usize];
        let nodes = &self.nodes;
        let slot = bucket
            .binary_search_by(|entry| nodes[entry.index()].id.cmp(&node.id))
            .unwrap_or_else(|slot| slot);
        bucket.insert(slot, index);

        self.by_id.insert(node.id.clone(), index);
        self.nodes.push(node);
        Ok(index)
    }

    /// Node for a handle.
    pub fn get(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index.index())
    }

    /// Handle for a full identifier.
    pub fn lookup(&self, id: &NodeId) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    /// Nodes with a prefix, in ascending identifier order.
    pub fn with_prefix(&self, prefix: u8) -> &[NodeIndex] {
        &self.by_prefix[prefix as usize]
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes with their handles, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeIndex(i as u32), node))
    }

    /// Number of discovered nodes.
    pub fn discovered_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Discovered)
            .count()
    }
}

impl Index<NodeIndex> for NodeArena {
    type Output = Node;

    fn index(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.index()]
    }
}
