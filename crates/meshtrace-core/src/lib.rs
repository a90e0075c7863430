//! # meshtrace-core
//!
//! Probabilistic path reconstruction for prefix-routed mesh packets.
//!
//! Packets in the mesh carry only the first byte of each repeater's
//! identifier, so one recorded path can match many node sequences. This crate
//! recovers the most likely sequence and discovers repeaters missing from the
//! known node list:
//!
//! 1. [`SpatialIndex`] gates node pairs by the horizon radius.
//! 2. [`AdjacencyGraph`] caches the link cost of every feasible pair.
//! 3. [`Decoder`] runs a per-packet Viterbi search over prefix candidates,
//!    falling back to a [`Candidate::Ghost`] for unmodeled repeaters.
//! 4. [`EvidenceSet`] collects ghost hops, [`cluster_evidence`] groups them
//!    per prefix, and [`promote`] turns dense clusters into discovered nodes.
//! 5. [`Reconstructor`] repeats the above until nothing new is promoted.
//!
//! ## Example
//!
//! ```rust
//! use meshtrace_common::{Node, Packet, Position};
//! use meshtrace_core::{ReconstructionConfig, Reconstructor};
//!
//! let nodes = vec![
//!     Node::known("AA01".parse().unwrap(), "north", Position::new(45.1, 7.0)),
//!     Node::known("BB01".parse().unwrap(), "south", Position::new(45.0, 7.0)),
//! ];
//! let packets = vec![Packet::new(1, Position::new(45.1, 7.0), Position::new(45.0, 7.0), [0xAA, 0xBB])];
//!
//! let reconstructor = Reconstructor::new(ReconstructionConfig::default()).unwrap();
//! let result = reconstructor.run(nodes, &packets).unwrap();
//! assert_eq!(result.decoded_count(), 1);
//! ```

pub mod arena;
pub mod cluster;
pub mod config;
pub mod decoder;
pub mod evidence;
pub mod graph;
pub mod localize;
pub mod pipeline;
pub mod promote;
pub mod route;
pub mod spatial;
pub mod summary;
pub mod synth;

pub use arena::{ArenaError, NodeArena, NodeIndex};
pub use cluster::{cluster_evidence, dbscan, Cluster};
pub use config::{
    ClusteringConfig, ConfigError, DecoderConfig, LocalizationConfig, ReconstructionConfig,
};
pub use decoder::{Candidate, DecodeError, DecodedPath, Decoder, ResolvedHop};
pub use evidence::{ghost_evidence, EvidenceSet, GhostEvidence};
pub use graph::{AdjacencyGraph, EdgeKey};
pub use localize::{localize, LocalizeError, Localization};
pub use pipeline::{
    IterationReport, PacketOutcome, ReconstructError, Reconstruction, Reconstructor,
};
pub use promote::{promote, Promotion};
pub use route::{shortest_route, Route};
pub use spatial::{gating_radius_m, SpatialIndex};
pub use summary::{
    EdgeSummary, HopReport, NetworkSummary, NodeSummary, PacketReport, PacketStatus,
};
pub use synth::{generate, Scenario, SynthConfig};
