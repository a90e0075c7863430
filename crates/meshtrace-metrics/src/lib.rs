//! Metrics infrastructure for meshtrace.
//!
//! Every metric the reconstruction pipeline records is declared here as a
//! const [`Metric`], so names are checked at compile time and descriptions can
//! be registered in one call to [`describe_metrics`].
//!
//! # Example
//!
//! ```rust
//! use meshtrace_metrics::{metric_defs, metrics};
//!
//! let rejected = &metric_defs::PACKETS_REJECTED;
//! assert_eq!(rejected.labels, &["reason"]);
//! metrics::counter!(rejected.name, "reason" => "empty_path").increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// How a metric aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Name and metadata of one metric, declared as a `const` in [`metric_defs`].
#[derive(Debug, Clone)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys recorders should expect.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn of_kind(kind: MetricKind, name: &'static str) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::of_kind(MetricKind::Counter, name)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::of_kind(MetricKind::Gauge, name)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::of_kind(MetricKind::Histogram, name)
    }

    pub const fn with_description(self, description: &'static str) -> Self {
        Self { description, ..self }
    }

    pub const fn with_unit(self, unit: Unit) -> Self {
        Self {
            unit: Some(unit),
            ..self
        }
    }

    pub const fn with_labels(self, labels: &'static [&'static str]) -> Self {
        Self { labels, ..self }
    }

    /// Hands the description and unit to the installed recorder, if any.
    pub fn describe(&self) {
        let (name, text) = (self.name, self.description);
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(name, unit, text),
            (MetricKind::Counter, None) => describe_counter!(name, text),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(name, unit, text),
            (MetricKind::Gauge, None) => describe_gauge!(name, text),
            (MetricKind::Histogram, Some(unit)) => describe_histogram!(name, unit, text),
            (MetricKind::Histogram, None) => describe_histogram!(name, text),
        }
    }
}

/// All metric definitions.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Decoding
    // ========================================================================

    /// Packets decoded to a full path.
    pub const PACKETS_DECODED: Metric = Metric::counter("meshtrace.decode.packets_decoded")
        .with_description("Packets decoded to a full path")
        .with_unit(Unit::Count);

    /// Packets with no feasible path.
    pub const PACKETS_FAILED: Metric = Metric::counter("meshtrace.decode.packets_failed")
        .with_description("Packets for which no feasible path exists")
        .with_unit(Unit::Count);

    /// Packets rejected before decoding.
    ///
    /// Labels: reason
    pub const PACKETS_REJECTED: Metric = Metric::counter("meshtrace.decode.packets_rejected")
        .with_description("Malformed packets rejected before decoding")
        .with_unit(Unit::Count)
        .with_labels(&["reason"]);

    /// Decoded hops by resolution.
    ///
    /// Labels: kind (known, discovered, ghost)
    pub const HOPS_RESOLVED: Metric = Metric::counter("meshtrace.decode.hops_resolved")
        .with_description("Decoded hops by resolved node kind")
        .with_unit(Unit::Count)
        .with_labels(&["kind"]);

    /// Total cost of decoded paths.
    pub const PATH_COST: Metric = Metric::histogram("meshtrace.decode.path_cost")
        .with_description("Total negative log-likelihood cost of decoded paths");

    // ========================================================================
    // Graph
    // ========================================================================

    /// Nodes in the current graph.
    pub const GRAPH_NODES: Metric = Metric::gauge("meshtrace.graph.nodes")
        .with_description("Nodes in the adjacency graph")
        .with_unit(Unit::Count);

    /// Feasible edges in the current graph.
    pub const GRAPH_EDGES: Metric = Metric::gauge("meshtrace.graph.edges")
        .with_description("Feasible edges in the adjacency graph")
        .with_unit(Unit::Count);

    /// Terrain-blocked edges in the current graph.
    pub const GRAPH_BLOCKED_EDGES: Metric = Metric::gauge("meshtrace.graph.blocked_edges")
        .with_description("Edges whose path infringes the Fresnel clearance")
        .with_unit(Unit::Count);

    /// Time to build the graph.
    pub const GRAPH_BUILD_TIME: Metric = Metric::histogram("meshtrace.graph.build_time_ms")
        .with_description("Time to build spatial index and adjacency graph")
        .with_unit(Unit::Milliseconds);

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Ghost clusters found.
    pub const CLUSTERS_FOUND: Metric = Metric::counter("meshtrace.discovery.clusters")
        .with_description("Dense clusters of ghost evidence")
        .with_unit(Unit::Count);

    /// Nodes promoted from clusters.
    pub const NODES_PROMOTED: Metric = Metric::counter("meshtrace.discovery.nodes_promoted")
        .with_description("Discovered nodes promoted from ghost clusters")
        .with_unit(Unit::Count);

    /// Refinement iterations run.
    pub const REFINEMENT_ITERATIONS: Metric = Metric::counter("meshtrace.discovery.iterations")
        .with_description("Decode/promote refinement iterations")
        .with_unit(Unit::Count);

    // ========================================================================
    // Terrain
    // ========================================================================

    /// Elevation tiles loaded.
    pub const TILES_LOADED: Metric = Metric::counter("meshtrace.terrain.tiles_loaded")
        .with_description("Elevation tiles loaded into the cache")
        .with_unit(Unit::Count);

    /// Elevation tiles not available.
    pub const TILES_MISSING: Metric = Metric::counter("meshtrace.terrain.tiles_missing")
        .with_description("Elevation tiles absent or failed to load")
        .with_unit(Unit::Count);

    /// Every declared metric.
    pub const ALL: &[Metric] = &[
        PACKETS_DECODED,
        PACKETS_FAILED,
        PACKETS_REJECTED,
        HOPS_RESOLVED,
        PATH_COST,
        GRAPH_NODES,
        GRAPH_EDGES,
        GRAPH_BLOCKED_EDGES,
        GRAPH_BUILD_TIME,
        CLUSTERS_FOUND,
        NODES_PROMOTED,
        REFINEMENT_ITERATIONS,
        TILES_LOADED,
        TILES_MISSING,
    ];
}

/// Describes every metric in [`metric_defs::ALL`]. Call after installing a
/// recorder; without one this does nothing.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::PACKETS_DECODED.name, "meshtrace.decode.packets_decoded");
        assert_eq!(metric_defs::PACKETS_DECODED.kind, MetricKind::Counter);
        assert_eq!(metric_defs::PACKETS_REJECTED.labels, &["reason"]);
        assert_eq!(metric_defs::PATH_COST.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::GRAPH_EDGES.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::GRAPH_BUILD_TIME.unit, Some(Unit::Milliseconds));
    }

    #[test]
    fn test_names_unique_and_namespaced() {
        assert!(metric_defs::ALL.iter().all(|m| m.name.starts_with("meshtrace.")));
        let mut names: Vec<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_builder_defaults() {
        const BARE: Metric = Metric::gauge("bare");
        assert_eq!(BARE.kind, MetricKind::Gauge);
        assert!(BARE.description.is_empty());
        assert!(BARE.unit.is_none());
        assert!(BARE.labels.is_empty());
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}
