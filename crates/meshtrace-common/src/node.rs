//! Node identifiers and node records.

use crate::{PacketId, Position};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors parsing a [`NodeId`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeIdError {
    /// The identifier has no bytes.
    #[error("empty node identifier")]
    Empty,

    /// The hex string has an odd number of digits.
    #[error("node identifier {0:?} has an odd number of hex digits")]
    OddLength(String),

    /// The string contains non-hex characters.
    #[error("node identifier {id:?} is not valid hex: {source}")]
    InvalidHex {
        /// The offending identifier.
        id: String,
        /// Underlying decode error.
        source: hex::FromHexError,
    },
}

/// Marker bytes following the prefix in identifiers minted for discovered nodes.
const DISCOVERED_MARKER: [u8; 2] = [0xD1, 0x5C];

/// Full node identifier. The first byte is the routing prefix recorded in
/// packet headers.
///
/// Identifiers order numerically (big-endian, leading zero bytes ignored), so
/// `0x00AB < 0x0100` and `AA1111 < AA2222`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NodeId(Vec<u8>);

impl NodeId {
    /// Creates an identifier from raw bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, NodeIdError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(NodeIdError::Empty);
        }
        Ok(Self(bytes))
    }

    /// Mints the identifier for the `seq`-th discovered node with `prefix`.
    pub fn discovered(prefix: u8, seq: u32) -> Self {
        let mut bytes = Vec::with_capacity(7);
        bytes.push(prefix);
        bytes.extend_from_slice(&DISCOVERED_MARKER);
        bytes.extend_from_slice(&seq.to_be_bytes());
        Self(bytes)
    }

    /// The 8-bit routing prefix.
    pub fn prefix(&self) -> u8 {
        self.0[0]
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn significant(&self) -> &[u8] {
        let start = self.0.iter().position(|&b| b != 0).unwrap_or(self.0.len());
        &self.0[start..]
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.significant(), other.significant());
        a.len()
            .cmp(&b.len())
            .then_with(|| a.cmp(b))
            .then_with(|| self.0.len().cmp(&other.0.len()))
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(NodeIdError::Empty);
        }
        if digits.len() % 2 != 0 {
            return Err(NodeIdError::OddLength(s.to_string()));
        }

        let bytes = hex::decode(digits).map_err(|source| NodeIdError::InvalidHex {
            id: s.to_string(),
            source,
        })?;
        Self::from_bytes(bytes)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// How a node (or a decoded hop) is known to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Loaded from the input node list.
    Known,
    /// Synthetic per-decode state for an unmodeled repeater. Never stored.
    Ghost,
    /// Promoted from clustered ghost evidence.
    Discovered,
}

impl NodeKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Known => "known",
            NodeKind::Ghost => "ghost",
            NodeKind::Discovered => "discovered",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical repeater, either loaded or discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Full identifier.
    pub id: NodeId,
    /// Display name.
    pub name: String,
    /// Surface position.
    pub position: Position,
    /// Known or Discovered.
    pub kind: NodeKind,
    /// 1.0 for loaded nodes; promotion confidence for discovered ones.
    pub confidence: f64,
    /// Packets whose ghost evidence produced this node.
    #[serde(default)]
    pub provenance: Vec<PacketId>,
}

impl Node {
    /// A loaded node with full confidence.
    pub fn known(id: NodeId, name: impl Into<String>, position: Position) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            kind: NodeKind::Known,
            confidence: 1.0,
            provenance: Vec::new(),
        }
    }

    /// A node produced by promotion.
    pub fn discovered(
        id: NodeId,
        position: Position,
        confidence: f64,
        provenance: Vec<PacketId>,
    ) -> Self {
        let name = format!("discovered-{}", id);
        Self {
            id,
            name,
            position,
            kind: NodeKind::Discovered,
            confidence,
            provenance,
        }
    }

    /// The 8-bit routing prefix.
    pub fn prefix(&self) -> u8 {
        self.id.prefix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_with_and_without_0x() {
        assert_eq!(id("0xAA1111"), id("aa1111"));
        assert_eq!(id("AA1111").prefix(), 0xAA);
        assert_eq!(id("AA1111").to_string(), "AA1111");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<NodeId>(), Err(NodeIdError::Empty));
        assert_eq!("0x".parse::<NodeId>(), Err(NodeIdError::Empty));
        assert!(matches!("ABC".parse::<NodeId>(), Err(NodeIdError::OddLength(_))));
        assert!(matches!("ZZ11".parse::<NodeId>(), Err(NodeIdError::InvalidHex { .. })));
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(id("AA1111") < id("AA2222"));
        assert!(id("00AB") < id("0100"));
        assert!(id("FF") < id("0100"));
        assert!(id("AB") < id("00AB"));
        assert_ne!(id("AB"), id("00AB"));
    }

    #[test]
    fn test_discovered_ids_keep_prefix() {
        let a = NodeId::discovered(0x42, 0);
        let b = NodeId::discovered(0x42, 1);
        assert_eq!(a.prefix(), 0x42);
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let json = serde_json::to_string(&id("BB2222")).unwrap();
        assert_eq!(json, "\"BB2222\"");
        let back: NodeId = serde_json::from_str("\"0xbb2222\"").unwrap();
        assert_eq!(back, id("BB2222"));
    }

    #[test]
    fn test_known_node_defaults() {
        let node = Node::known(id("CC00D1"), "Hilltop", Position::new(1.0, 2.0));
        assert_eq!(node.kind, NodeKind::Known);
        assert_eq!(node.confidence, 1.0);
        assert_eq!(node.prefix(), 0xCC);
        assert!(node.provenance.is_empty());
    }
}
