//! Input files: node lists, packet lists and configuration.
//!
//! Node lists are CSV with an `ID,Name,Lat,Lon` header. Packet lists are a
//! JSON array of objects with `id`, `start`, `end` and a hex `path` string:
//!
//! ```json
//! [{"id": 1, "start": {"lat": 51.5, "lon": -0.12}, "end": {"lat": 51.6, "lon": -0.1}, "path": "AA42CC"}]
//! ```

use crate::RunnerError;
use meshtrace_common::{Node, Packet, Position};
use meshtrace_core::ReconstructionConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// One row of a node list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Lat")]
    pub lat: f64,
    #[serde(rename = "Lon")]
    pub lon: f64,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.to_string(),
            name: node.name.clone(),
            lat: node.position.lat,
            lon: node.position.lon,
        }
    }
}

/// Parses a CSV node list. Rows are numbered from 1 in errors.
pub fn read_nodes<R: Read>(reader: R) -> Result<Vec<Node>, RunnerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut nodes = Vec::new();
    for (i, result) in rdr.deserialize::<NodeRecord>().enumerate() {
        let record = result?;
        let id = record.id.parse().map_err(|source| RunnerError::NodeId {
            row: i + 1,
            id: record.id.clone(),
            source,
        })?;
        nodes.push(Node::known(
            id,
            record.name,
            Position::new(record.lat, record.lon),
        ));
    }
    Ok(nodes)
}

/// Reads a CSV node list from disk.
pub fn read_nodes_file(path: &Path) -> Result<Vec<Node>, RunnerError> {
    let file = File::open(path).map_err(|e| RunnerError::io(path, e))?;
    read_nodes(BufReader::new(file))
}

/// Parses a JSON packet list.
///
/// Packets are not validated here; malformed ones are rejected individually
/// by the reconstructor.
pub fn read_packets<R: Read>(reader: R) -> Result<Vec<Packet>, RunnerError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Reads a JSON packet list from disk.
pub fn read_packets_file(path: &Path) -> Result<Vec<Packet>, RunnerError> {
    let file = File::open(path).map_err(|e| RunnerError::io(path, e))?;
    read_packets(BufReader::new(file))
}

/// Parses a YAML configuration. An empty document yields the defaults.
pub fn parse_config(text: &str) -> Result<ReconstructionConfig, RunnerError> {
    if text.trim().is_empty() {
        return Ok(ReconstructionConfig::default());
    }
    Ok(serde_yaml::from_str(text)?)
}

/// Reads a YAML configuration from disk.
pub fn load_config(path: &Path) -> Result<ReconstructionConfig, RunnerError> {
    let text = std::fs::read_to_string(path).map_err(|e| RunnerError::io(path, e))?;
    parse_config(&text)
}
