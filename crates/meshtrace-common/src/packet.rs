//! Observed packets and their routing paths.

use crate::Position;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum number of prefixes a packet's routing path can carry.
pub const MAX_PATH_LEN: usize = 64;

/// Identifier of an observed packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(pub u64);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reasons a packet is rejected before decoding.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PacketError {
    /// The routing path has no hops.
    #[error("routing path is empty")]
    EmptyPath,

    /// The routing path is longer than [`MAX_PATH_LEN`].
    #[error("routing path has {len} hops (max {max})")]
    PathTooLong {
        /// Actual path length.
        len: usize,
        /// Allowed maximum.
        max: usize,
    },

    /// Start coordinates are out of range or not finite.
    #[error("invalid start position ({lat}, {lon})")]
    InvalidStart {
        /// Latitude as given.
        lat: f64,
        /// Longitude as given.
        lon: f64,
    },

    /// End coordinates are out of range or not finite.
    #[error("invalid end position ({lat}, {lon})")]
    InvalidEnd {
        /// Latitude as given.
        lat: f64,
        /// Longitude as given.
        lon: f64,
    },
}

impl PacketError {
    /// Short machine-readable reason, used as a metric label.
    pub const fn reason(&self) -> &'static str {
        match self {
            PacketError::EmptyPath => "empty_path",
            PacketError::PathTooLong { .. } => "path_too_long",
            PacketError::InvalidStart { .. } => "invalid_start",
            PacketError::InvalidEnd { .. } => "invalid_end",
        }
    }
}

/// A packet observed somewhere in the mesh.
///
/// `path` holds the 1-byte prefixes of the repeaters that forwarded it, in
/// order. `start` and `end` are where it was sent from and heard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Packet identifier.
    pub id: PacketId,
    /// Origin position.
    pub start: Position,
    /// Receiver position.
    pub end: Position,
    /// Routing path prefixes, hex-encoded in serialized form.
    #[serde(with = "hex_path")]
    pub path: Vec<u8>,
}

impl Packet {
    /// Creates a new packet.
    pub fn new(id: u64, start: Position, end: Position, path: impl Into<Vec<u8>>) -> Self {
        Self {
            id: PacketId(id),
            start,
            end,
            path: path.into(),
        }
    }

    /// Number of hops (path length).
    pub fn hop_count(&self) -> usize {
        self.path.len()
    }

    /// Checks path length and coordinates.
    pub fn validate(&self) -> Result<(), PacketError> {
        if self.path.is_empty() {
            return Err(PacketError::EmptyPath);
        }
        if self.path.len() > MAX_PATH_LEN {
            return Err(PacketError::PathTooLong {
                len: self.path.len(),
                max: MAX_PATH_LEN,
            });
        }
        if !self.start.is_valid() {
            return Err(PacketError::InvalidStart {
                lat: self.start.lat,
                lon: self.start.lon,
            });
        }
        if !self.end.is_valid() {
            return Err(PacketError::InvalidEnd {
                lat: self.end.lat,
                lon: self.end.lon,
            });
        }
        Ok(())
    }
}

mod hex_path {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(path: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(path))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits: String = s.chars().filter(|c| !c.is_whitespace() && *c != ',').collect();
        hex::decode(digits).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(path: Vec<u8>) -> Packet {
        Packet::new(7, Position::new(45.0, 7.0), Position::new(45.5, 7.0), path)
    }

    #[test]
    fn test_validate_accepts_normal_packet() {
        assert_eq!(packet(vec![0xAA, 0xBB]).validate(), Ok(()));
        assert_eq!(packet(vec![0x01; MAX_PATH_LEN]).validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_paths() {
        assert_eq!(packet(vec![]).validate(), Err(PacketError::EmptyPath));
        assert_eq!(
            packet(vec![0x01; MAX_PATH_LEN + 1]).validate(),
            Err(PacketError::PathTooLong { len: 65, max: 64 })
        );
    }

    #[test]
    fn test_validate_rejects_bad_coordinates() {
        let mut p = packet(vec![0xAA]);
        p.start = Position::new(123.0, 0.0);
        assert!(matches!(p.validate(), Err(PacketError::InvalidStart { .. })));

        let mut p = packet(vec![0xAA]);
        p.end = Position::new(0.0, f64::INFINITY);
        assert!(matches!(p.validate(), Err(PacketError::InvalidEnd { .. })));
    }

    #[test]
    fn test_json_path_is_hex() {
        let p = packet(vec![0xAA, 0x0B]);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["path"], "AA0B");
        assert_eq!(json["id"], 7);

        let parsed: Packet = serde_json::from_str(
            r#"{"id": 3, "start": {"lat": 1.0, "lon": 2.0}, "end": {"lat": 1.5, "lon": 2.0}, "path": "aa,bb cc"}"#,
        )
        .unwrap();
        assert_eq!(parsed.path, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(parsed.id, PacketId(3));
    }
}
