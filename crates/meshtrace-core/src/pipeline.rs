//! The decode / cluster / promote refinement loop.

use crate::arena::{ArenaError, NodeArena};
use crate::cluster::cluster_evidence;
use crate::config::{ConfigError, ReconstructionConfig};
use crate::decoder::{DecodeError, DecodedPath, Decoder};
use crate::evidence::EvidenceSet;
use crate::graph::AdjacencyGraph;
use crate::promote::{promote, Promotion};
use crate::spatial::SpatialIndex;
use crate::summary::{NetworkSummary, PacketReport};
use meshtrace_common::{Node, Packet, PacketError, PacketId};
use meshtrace_link::{ElevationSource, LinkModel};
use meshtrace_metrics::{metric_defs, metrics};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that stop a reconstruction before any packet is decoded.
#[derive(Debug, Error)]
pub enum ReconstructError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The decode worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A promoted node could not be stored.
    #[error("failed to store promoted node: {0}")]
    Arena(#[from] ArenaError),
}

/// What happened to one packet.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketOutcome {
    /// Decoded successfully.
    Decoded(DecodedPath),
    /// No feasible path; `hop` is the first hop with no reachable state.
    Failed {
        /// Packet identifier.
        packet: PacketId,
        /// Failing hop index.
        hop: usize,
    },
    /// Malformed; never decoded.
    Rejected {
        /// Packet identifier.
        packet: PacketId,
        /// Validation failure.
        reason: PacketError,
    },
}

impl PacketOutcome {
    /// Packet the outcome refers to.
    pub fn packet(&self) -> PacketId {
        match self {
            PacketOutcome::Decoded(path) => path.packet,
            PacketOutcome::Failed { packet, .. } | PacketOutcome::Rejected { packet, .. } => {
                *packet
            }
        }
    }

    /// The decoded path, if any.
    pub fn path(&self) -> Option<&DecodedPath> {
        match self {
            PacketOutcome::Decoded(path) => Some(path),
            _ => None,
        }
    }
}

/// Counters for one pass of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IterationReport {
    /// 1-based pass number.
    pub iteration: usize,
    /// Nodes in the arena during the pass.
    pub nodes: usize,
    /// Feasible edges in the graph.
    pub edges: usize,
    /// Packets decoded.
    pub decoded: usize,
    /// Packets with no feasible path.
    pub failed: usize,
    /// Hops resolved to a ghost.
    pub ghost_hops: usize,
    /// Evidence records collected.
    pub evidence: usize,
    /// Clusters retained.
    pub clusters: usize,
    /// Nodes promoted after the pass.
    pub promoted: usize,
}

/// Final state of a reconstruction.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Known nodes plus every promoted node.
    pub arena: NodeArena,
    /// Graph the final pass decoded against.
    pub graph: AdjacencyGraph,
    /// One outcome per input packet, in input order.
    pub outcomes: Vec<PacketOutcome>,
    /// Ghost evidence from the final pass.
    pub evidence: EvidenceSet,
    /// One report per pass.
    pub iterations: Vec<IterationReport>,
    /// Every promotion, in order.
    pub promoted: Vec<Promotion>,
    /// Known node rows left out of the arena.
    pub skipped_nodes: Vec<ArenaError>,
}

impl Reconstruction {
    /// Per-packet export records, in input order.
    pub fn reports(&self) -> Vec<PacketReport> {
        self.outcomes
            .iter()
            .map(|outcome| PacketReport::new(&self.arena, outcome))
            .collect()
    }

    /// Node and edge summary of the final pass.
    pub fn summary(&self) -> NetworkSummary {
        NetworkSummary::build(&self.arena, &self.graph, &self.outcomes)
    }

    /// Number of decoded packets.
    pub fn decoded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.path().is_some()).count()
    }

    /// Number of packets with no feasible path.
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PacketOutcome::Failed { .. }))
            .count()
    }

    /// Number of malformed packets.
    pub fn rejected_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PacketOutcome::Rejected { .. }))
            .count()
    }
}

/// Per-worker partial results, merged after the parallel phase.
#[derive(Debug, Default)]
struct BatchAccumulator {
    outcomes: Vec<(usize, PacketOutcome)>,
    evidence: EvidenceSet,
}

impl BatchAccumulator {
    fn merge(mut self, mut other: BatchAccumulator) -> BatchAccumulator {
        self.outcomes.append(&mut other.outcomes);
        self.evidence = self.evidence.merge(other.evidence);
        self
    }
}

/// Runs the bounded refinement loop on a dedicated worker pool.
pub struct Reconstructor {
    config: ReconstructionConfig,
    model: LinkModel,
    pool: rayon::ThreadPool,
}

impl Reconstructor {
    /// Validates the configuration and starts the worker pool.
    pub fn new(config: ReconstructionConfig) -> Result<Self, ReconstructError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("meshtrace-decode-{}", i))
            .build()?;
        let model = LinkModel::new(config.link);
        Ok(Self {
            config,
            model,
            pool,
        })
    }

    /// Adds a terrain source for Fresnel clearance checks.
    pub fn with_terrain(mut self, terrain: Arc<dyn ElevationSource>) -> Self {
        self.model = self.model.with_terrain(terrain);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// Number of decode workers.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Reconstructs paths for `packets` over `nodes`.
    ///
    /// Known nodes that cannot be stored (a duplicate identifier or an
    /// invalid position) are skipped with a warning. Malformed packets are
    /// rejected once up front. Each pass rebuilds the
    /// spatial index and graph, decodes every valid packet in parallel,
    /// clusters ghost evidence and promotes new nodes. The loop stops when a
    /// pass promotes nothing or after `max_iterations` passes. Nodes promoted
    /// by the final pass are kept in the arena but were not decoded against.
    pub fn run(&self, nodes: Vec<Node>, packets: &[Packet]) -> Result<Reconstruction, ReconstructError> {
        let (mut arena, skipped_nodes) = load_known(nodes);
        let ghost_cost = self.config.ghost_cost();

        let mut rejected = Vec::new();
        let mut valid = Vec::with_capacity(packets.len());
        for (slot, packet) in packets.iter().enumerate() {
            match packet.validate() {
                Ok(()) => valid.push((slot, packet)),
                Err(reason) => {
                    warn!(packet = %packet.id, %reason, "rejected malformed packet");
                    metrics::counter!(metric_defs::PACKETS_REJECTED.name, "reason" => reason.reason())
                        .increment(1);
                    rejected.push((
                        slot,
                        PacketOutcome::Rejected {
                            packet: packet.id,
                            reason,
                        },
                    ));
                }
            }
        }

        info!(
            nodes = arena.len(),
            skipped_nodes = skipped_nodes.len(),
            packets = packets.len(),
            rejected = rejected.len(),
            workers = self.workers(),
            terrain = self.model.has_terrain(),
            "starting reconstruction"
        );

        let mut iterations = Vec::new();
        let mut promoted_all = Vec::new();
        let mut iteration = 0;

        let (graph, batch) = loop {
            iteration += 1;

            // Graph and index are complete before any packet of this pass decodes.
            let (graph, mut batch) = self.pool.install(|| {
                let index = SpatialIndex::build(&arena);
                let graph = AdjacencyGraph::build(&arena, &index, &self.model);
                let batch = {
                    let decoder = Decoder::new(&arena, &graph, &self.model, ghost_cost);
                    decode_batch(&decoder, &arena, &valid)
                };
                (graph, batch)
            });
            batch.evidence.sort();

            let clusters = cluster_evidence(&batch.evidence, &self.config.clustering);
            let promotions = promote(&arena, &clusters, &self.config, &self.model);

            let decoded: Vec<&DecodedPath> =
                batch.outcomes.iter().filter_map(|(_, o)| o.path()).collect();
            let report = IterationReport {
                iteration,
                nodes: arena.len(),
                edges: graph.edge_count(),
                decoded: decoded.len(),
                failed: batch.outcomes.len() - decoded.len(),
                ghost_hops: decoded.iter().map(|p| p.ghost_hops()).sum(),
                evidence: batch.evidence.len(),
                clusters: clusters.len(),
                promoted: promotions.len(),
            };
            info!(
                iteration,
                nodes = report.nodes,
                edges = report.edges,
                decoded = report.decoded,
                failed = report.failed,
                ghost_hops = report.ghost_hops,
                clusters = report.clusters,
                promoted = report.promoted,
                "refinement pass complete"
            );
            iterations.push(report);
            metrics::counter!(metric_defs::REFINEMENT_ITERATIONS.name).increment(1);
            metrics::counter!(metric_defs::CLUSTERS_FOUND.name).increment(clusters.len() as u64);
            metrics::counter!(metric_defs::NODES_PROMOTED.name).increment(promotions.len() as u64);

            let done = promotions.is_empty() || iteration >= self.config.max_iterations;
            for promotion in &promotions {
                debug!(
                    id = %promotion.node.id,
                    at = %promotion.node.position,
                    confidence = promotion.node.confidence,
                    support = promotion.node.provenance.len(),
                    "promoted discovered node"
                );
                arena.push(promotion.node.clone())?;
            }
            promoted_all.extend(promotions);

            if done {
                break (graph, batch);
            }
        };

        let mut outcomes = batch.outcomes;
        outcomes.extend(rejected);
        outcomes.sort_by_key(|(slot, _)| *slot);
        let outcomes: Vec<PacketOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

        record_outcomes(&outcomes);

        let reconstruction = Reconstruction {
            arena,
            graph,
            outcomes,
            evidence: batch.evidence,
            iterations,
            promoted: promoted_all,
            skipped_nodes,
        };
        info!(
            decoded = reconstruction.decoded_count(),
            failed = reconstruction.failed_count(),
            rejected = reconstruction.rejected_count(),
            discovered = reconstruction.arena.discovered_count(),
            passes = reconstruction.iterations.len(),
            "reconstruction complete"
        );
        Ok(reconstruction)
    }
}

impl std::fmt::Debug for Reconstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconstructor")
            .field("config", &self.config)
            .field("model", &self.model)
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}

/// Stores every usable known node, returning the errors for the rest.
fn load_known(nodes: Vec<Node>) -> (NodeArena, Vec<ArenaError>) {
    let mut arena = NodeArena::new();
    let mut skipped = Vec::new();
    for node in nodes {
        if let Err(e) = arena.push(node) {
            warn!(error = %e, "skipping known node");
            skipped.push(e);
        }
    }
    (arena, skipped)
}

/// Decodes every packet on the current pool, each worker folding into its
/// own accumulator.
fn decode_batch(decoder: &Decoder<'_>, arena: &NodeArena, packets: &[(usize, &Packet)]) -> BatchAccumulator {
    packets
        .par_iter()
        .fold(BatchAccumulator::default, |mut acc, &(slot, packet)| {
            let outcome = match decoder.decode(packet) {
                Ok(path) => {
                    acc.evidence.extend_from_path(arena, packet, &path);
                    PacketOutcome::Decoded(path)
                }
                Err(DecodeError::Infeasible { packet, hop }) => PacketOutcome::Failed { packet, hop },
                Err(DecodeError::Malformed { packet, reason }) => {
                    PacketOutcome::Rejected { packet, reason }
                }
            };
            acc.outcomes.push((slot, outcome));
            acc
        })
        .reduce(BatchAccumulator::default, BatchAccumulator::merge)
}

fn record_outcomes(outcomes: &[PacketOutcome]) {
    for outcome in outcomes {
        match outcome {
            PacketOutcome::Decoded(path) => {
                metrics::counter!(metric_defs::PACKETS_DECODED.name).increment(1);
                metrics::histogram!(metric_defs::PATH_COST.name).record(path.total_cost);
                for hop in &path.hops {
                    metrics::counter!(metric_defs::HOPS_RESOLVED.name, "kind" => hop.kind.as_str())
                        .increment(1);
                }
            }
            PacketOutcome::Failed { packet, hop } => {
                warn!(packet = %packet, hop, "no feasible path, packet skipped");
                metrics::counter!(metric_defs::PACKETS_FAILED.name).increment(1);
            }
            PacketOutcome::Rejected { .. } => {}
        }
    }
}
