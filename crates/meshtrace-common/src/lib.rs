//! # meshtrace-common
//!
//! Shared types for mesh path reconstruction.
//!
//! - [`Position`] and the spherical-Earth helpers ([`haversine_m`],
//!   [`earth_bulge_m`], [`curvature_drop_m`])
//! - [`NodeId`], [`Node`] and [`NodeKind`]
//! - [`Packet`], the observed routing path of one transmission

mod geo;
mod node;
mod packet;

pub use geo::{
    chord_length_m, curvature_drop_m, earth_bulge_m, haversine_m, Position, EARTH_RADIUS_M,
};
pub use node::{Node, NodeId, NodeIdError, NodeKind};
pub use packet::{Packet, PacketError, PacketId, MAX_PATH_LEN};
