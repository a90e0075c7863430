//! Output files.

use crate::input::NodeRecord;
use crate::RunnerError;
use meshtrace_common::{Node, NodeId, Packet, PacketId};
use meshtrace_core::{IterationReport, NetworkSummary, PacketReport, Reconstruction, Scenario};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Packet counts by outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub decoded: usize,
    pub failed: usize,
    pub rejected: usize,
    pub discovered: usize,
    pub skipped_nodes: usize,
}

/// Everything a reconstruction run exports.
#[derive(Debug, Clone, Serialize)]
pub struct ReconstructionReport {
    pub totals: Totals,
    pub iterations: Vec<IterationReport>,
    pub packets: Vec<PacketReport>,
    pub network: NetworkSummary,
}

impl ReconstructionReport {
    /// Collects the exportable parts of a reconstruction.
    pub fn new(result: &Reconstruction) -> Self {
        Self {
            totals: Totals {
                decoded: result.decoded_count(),
                failed: result.failed_count(),
                rejected: result.rejected_count(),
                discovered: result.arena.discovered_count(),
                skipped_nodes: result.skipped_nodes.len(),
            },
            iterations: result.iterations.clone(),
            packets: result.reports(),
            network: result.summary(),
        }
    }
}

/// Ground truth of a synthetic scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioTruth<'a> {
    pub hidden: &'a [Node],
    pub routes: Vec<TrueRoute<'a>>,
}

/// The repeaters a synthetic packet actually took.
#[derive(Debug, Clone, Serialize)]
pub struct TrueRoute<'a> {
    pub packet: PacketId,
    pub nodes: &'a [NodeId],
}

impl<'a> ScenarioTruth<'a> {
    pub fn new(scenario: &'a Scenario) -> Self {
        Self {
            hidden: &scenario.hidden,
            routes: scenario
                .packets
                .iter()
                .zip(&scenario.routes)
                .map(|(packet, nodes)| TrueRoute {
                    packet: packet.id,
                    nodes,
                })
                .collect(),
        }
    }
}

/// Writes any serializable value as pretty JSON.
pub fn write_json<W: Write, T: Serialize + ?Sized>(writer: W, value: &T) -> Result<(), RunnerError> {
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Writes a node list in the CSV input format.
pub fn write_nodes<W: Write>(writer: W, nodes: &[Node]) -> Result<(), RunnerError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for node in nodes {
        wtr.serialize(NodeRecord::from(node))?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes a packet list in the JSON input format.
pub fn write_packets<W: Write>(writer: W, packets: &[Packet]) -> Result<(), RunnerError> {
    write_json(writer, packets)
}

/// Creates `path` and hands a buffered writer to `f`.
pub fn write_file<F>(path: &Path, f: F) -> Result<(), RunnerError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), RunnerError>,
{
    let file = File::create(path).map_err(|e| RunnerError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    f(&mut writer)?;
    writer.flush().map_err(|e| RunnerError::io(path, e))
}
