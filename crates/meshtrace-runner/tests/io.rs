//! File format and command tests.

use meshtrace_runner::input::{parse_config, read_nodes, read_nodes_file, read_packets, read_packets_file};
use meshtrace_runner::output::ReconstructionReport;
use meshtrace_runner::{reconstruct, synth, ReconstructArgs, RunnerError, SynthArgs};
use std::path::PathBuf;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("meshtrace-runner-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_read_nodes() {
    let csv = "ID,Name,Lat,Lon\nAA01, Hilltop ,45.0,7.0\nbb02,Valley,45.1,7.1\n";
    let nodes = read_nodes(csv.as_bytes()).unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].id.to_string(), "AA01");
    assert_eq!(nodes[0].name, "Hilltop");
    assert_eq!(nodes[1].prefix(), 0xBB);
    assert_eq!(nodes[1].position.lon, 7.1);
}

#[test]
fn test_read_nodes_rejects_bad_id() {
    let csv = "ID,Name,Lat,Lon\nAA01,One,45.0,7.0\nZZ,Two,45.1,7.1\n";
    let err = read_nodes(csv.as_bytes()).unwrap_err();
    assert!(matches!(err, RunnerError::NodeId { row: 2, ref id, .. } if id == "ZZ"));
}

#[test]
fn test_read_packets() {
    let json = r#"[
        {"id": 7, "start": {"lat": 45.0, "lon": 7.0}, "end": {"lat": 45.3, "lon": 7.0}, "path": "AA42CC"}
    ]"#;
    let packets = read_packets(json.as_bytes()).unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].id.0, 7);
    assert_eq!(packets[0].path, vec![0xAA, 0x42, 0xCC]);
}

#[test]
fn test_parse_config() {
    let config = parse_config("").unwrap();
    assert_eq!(config.max_iterations, meshtrace_core::ReconstructionConfig::default().max_iterations);

    let config = parse_config("max_iterations: 2\nclustering:\n  min_points: 5\n").unwrap();
    assert_eq!(config.max_iterations, 2);
    assert_eq!(config.clustering.min_points, 5);

    assert!(matches!(parse_config("max_iterations: [1"), Err(RunnerError::Yaml(_))));
}

#[test]
fn test_missing_file_names_path() {
    let path = PathBuf::from("/nonexistent/meshtrace/nodes.csv");
    match read_nodes_file(&path) {
        Err(RunnerError::Io { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected IO error, got {:?}", other.map(|n| n.len())),
    }
}

#[test]
fn test_synth_then_reconstruct() {
    let dir = scratch_dir("roundtrip");
    synth(&SynthArgs {
        out_dir: dir.clone(),
        seed: 3,
        nodes: 30,
        hidden: 2,
        packets: 40,
        spread_km: 30.0,
    })
    .unwrap();

    let nodes = read_nodes_file(&dir.join("nodes.csv")).unwrap();
    let packets = read_packets_file(&dir.join("packets.json")).unwrap();
    assert_eq!(nodes.len(), 30);
    assert!(!packets.is_empty());
    let count = packets.len();
    assert!(dir.join("truth.json").exists());

    let output = dir.join("report.json");
    let report: ReconstructionReport = reconstruct(&ReconstructArgs {
        nodes: dir.join("nodes.csv"),
        packets: dir.join("packets.json"),
        config: None,
        dem_dir: None,
        output: Some(output.clone()),
        workers: Some(2),
        max_iterations: None,
    })
    .unwrap();

    let totals = report.totals;
    assert_eq!(totals.decoded + totals.failed + totals.rejected, count);
    assert_eq!(totals.rejected, 0);
    assert_eq!(totals.skipped_nodes, 0);
    assert_eq!(report.packets.len(), count);

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["packets"].as_array().map(Vec::len), Some(count));
    assert!(written["network"]["nodes"].is_array());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_invalid_config_fails_before_reading_inputs() {
    let dir = scratch_dir("badconfig");
    let config = dir.join("config.yaml");
    std::fs::write(&config, "max_iterations: 0\n").unwrap();

    let err = reconstruct(&ReconstructArgs {
        nodes: dir.join("missing.csv"),
        packets: dir.join("missing.json"),
        config: Some(config),
        dem_dir: None,
        output: None,
        workers: None,
        max_iterations: None,
    })
    .unwrap_err();
    assert!(matches!(err, RunnerError::Reconstruct(_)));

    std::fs::remove_dir_all(&dir).unwrap();
}
