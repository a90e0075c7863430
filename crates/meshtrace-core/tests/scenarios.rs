//! End-to-end decoding scenarios.

use meshtrace_common::{haversine_m, Node, NodeKind, Packet, PacketId, Position};
use meshtrace_core::{
    AdjacencyGraph, DecodeError, Decoder, NodeArena, PacketOutcome, ReconstructionConfig,
    Reconstructor, SpatialIndex,
};
use meshtrace_dem::{DemTile, TileCache, TileKey};
use meshtrace_link::{db_to_cost, LinkCostParams, LinkModel};
use std::sync::Arc;

/// One degree of latitude on the 6371 km sphere.
const KM_PER_DEG: f64 = 111.194_926_644_558_73;

fn known(id: &str, position: Position) -> Node {
    Node::known(id.parse().unwrap(), id, position)
}

fn tall_masts() -> LinkCostParams {
    LinkCostParams {
        antenna_height_m: 150.0,
        ..Default::default()
    }
}

fn node_ids(arena: &NodeArena, outcome: &PacketOutcome) -> Vec<Option<String>> {
    outcome
        .path()
        .expect("decoded")
        .hops
        .iter()
        .map(|hop| hop.node.map(|n| arena[n].id.to_string()))
        .collect()
}

#[test]
fn test_two_nodes_80km_apart() {
    let a = Position::new(45.0, 7.0);
    let b = Position::new(45.0 + 80.0 / KM_PER_DEG, 7.0);
    let arena = NodeArena::from_nodes([known("A1", a), known("B2", b)]).unwrap();
    let model = LinkModel::new(tall_masts());
    let graph = AdjacencyGraph::build(&arena, &SpatialIndex::build(&arena), &model);

    let decoder = Decoder::new(&arena, &graph, &model, Some(db_to_cost(42.0)));
    let path = decoder.decode(&Packet::new(1, a, b, [0xA1, 0xB2])).unwrap();

    let ids: Vec<_> = path.hops.iter().map(|h| h.node.map(|n| arena[n].id.to_string())).collect();
    assert_eq!(ids, vec![Some("A1".to_string()), Some("B2".to_string())]);
    assert!(path.hops.iter().all(|h| h.kind == NodeKind::Known));
    // Bulge (~125.6 m) is under the 150 m masts: base cost only
    assert!((path.total_cost - db_to_cost(6.0)).abs() < 1e-9);
}

/// A 500 m ridge running north-south at lon 20.24..20.26, lat 10.45..10.55.
fn ridge_loader(key: TileKey) -> meshtrace_dem::Result<Option<DemTile>> {
    if key != TileKey::new(10, 20) {
        return Ok(None);
    }
    let side = 201u32;
    let bounds = key.bounds();
    let step = 1.0 / (side - 1) as f64;
    let mut data = Vec::with_capacity((side * side) as usize);
    for row in 0..side {
        let lat = bounds.max_lat - row as f64 * step;
        for col in 0..side {
            let lon = bounds.min_lon + col as f64 * step;
            let on_ridge = (10.45..=10.55).contains(&lat) && (20.24..=20.26).contains(&lon);
            data.push(if on_ridge { 500.0 } else { 0.0 });
        }
    }
    DemTile::from_grid(bounds, side, side, data, None).map(Some)
}

/// A west of the ridge, B east of it, C north of the ridge's end. B and C
/// share prefix BB; the packet is heard at B.
fn ridge_case(params: LinkCostParams) -> (NodeArena, Option<String>, f64) {
    let a = Position::new(10.5, 20.0);
    let b = Position::new(10.5, 20.5);
    let c = Position::new(10.8, 20.25);
    let arena =
        NodeArena::from_nodes([known("AA01", a), known("BB01", b), known("BB02", c)]).unwrap();

    let terrain = Arc::new(TileCache::new(ridge_loader));
    let model = LinkModel::new(params).with_terrain(terrain);
    let graph = AdjacencyGraph::build(&arena, &SpatialIndex::build(&arena), &model);
    let decoder = Decoder::new(&arena, &graph, &model, Some(db_to_cost(42.0)));

    let path = decoder.decode(&Packet::new(1, a, b, [0xAA, 0xBB])).unwrap();
    let relay = path.hops[1].node.map(|n| arena[n].id.to_string());
    let cost = path.total_cost;
    (arena, relay, cost)
}

#[test]
fn test_detour_beats_blocked_direct_link() {
    // direct: 6 + 30 dB; via C: 6 dB to C, 6 dB from C to the receiver
    let (_, relay, cost) = ridge_case(tall_masts());
    assert_eq!(relay.as_deref(), Some("BB02"));
    assert!((cost - db_to_cost(12.0)).abs() < 1e-9);
}

#[test]
fn test_direct_link_wins_when_penalty_is_small() {
    let params = LinkCostParams {
        terrain_penalty_db: 3.0,
        ..tall_masts()
    };
    let (_, relay, cost) = ridge_case(params);
    assert_eq!(relay.as_deref(), Some("BB01"));
    assert!((cost - db_to_cost(9.0)).abs() < 1e-9);
}

/// L and R are known; the repeater between them (prefix 42) is not.
fn hidden_repeater_case(packets: u64) -> (Vec<Node>, Vec<Packet>) {
    let left = Position::new(45.0, 7.0);
    let right = Position::new(45.3, 7.0);
    let nodes = vec![known("AA01", left), known("CC01", right)];
    let packets = (1..=packets)
        .map(|id| Packet::new(id, left, right, [0xAA, 0x42, 0xCC]))
        .collect();
    (nodes, packets)
}

#[test]
fn test_five_packets_promote_one_node() {
    let (nodes, packets) = hidden_repeater_case(5);
    let result = Reconstructor::new(ReconstructionConfig::default())
        .unwrap()
        .run(nodes, &packets)
        .unwrap();

    assert_eq!(result.promoted.len(), 1);
    assert_eq!(result.arena.discovered_count(), 1);
    let node = &result.promoted[0].node;
    assert_eq!(node.prefix(), 0x42);
    assert_eq!(node.provenance, (1..=5).map(PacketId).collect::<Vec<_>>());

    let midpoint = Position::new(45.0, 7.0).interpolate(&Position::new(45.3, 7.0), 0.5);
    assert!(node.position.distance_m(&midpoint) < 200.0);

    // The second pass decodes through the discovered node and stops
    assert_eq!(result.iterations.len(), 2);
    assert_eq!(result.iterations[1].promoted, 0);
    for outcome in &result.outcomes {
        let path = outcome.path().expect("decoded");
        assert_eq!(path.hops[1].kind, NodeKind::Discovered);
        assert_eq!(path.ghost_hops(), 0);
    }
}

#[test]
fn test_too_few_packets_promote_nothing() {
    let (nodes, packets) = hidden_repeater_case(2);
    let result = Reconstructor::new(ReconstructionConfig::default())
        .unwrap()
        .run(nodes, &packets)
        .unwrap();

    assert!(result.promoted.is_empty());
    assert_eq!(result.iterations.len(), 1);
    for outcome in &result.outcomes {
        assert_eq!(outcome.path().unwrap().ghost_hops(), 1);
    }
}

#[test]
fn test_iteration_cap_is_respected() {
    let (nodes, packets) = hidden_repeater_case(5);
    let config = ReconstructionConfig {
        max_iterations: 1,
        ..Default::default()
    };
    let result = Reconstructor::new(config).unwrap().run(nodes, &packets).unwrap();

    assert_eq!(result.iterations.len(), 1);
    // promoted by the only pass, but never decoded against
    assert_eq!(result.arena.discovered_count(), 1);
    assert!(result.outcomes.iter().all(|o| o.path().unwrap().ghost_hops() == 1));
}

#[test]
fn test_strict_decoding_reports_failing_hop() {
    let (nodes, packets) = hidden_repeater_case(3);
    let mut config = ReconstructionConfig::default();
    config.decoder.ghost_quality_dbm = None;
    let result = Reconstructor::new(config).unwrap().run(nodes, &packets).unwrap();

    assert_eq!(result.failed_count(), 3);
    for outcome in &result.outcomes {
        assert!(matches!(outcome, PacketOutcome::Failed { hop: 1, .. }));
    }
    let report = &result.reports()[0];
    assert_eq!(report.failed_hop, Some(1));
}

#[test]
fn test_prefix_alias_resolved_by_geography() {
    // Two nodes share prefix BB, one of them far beyond the horizon
    let nodes = vec![
        known("AA01", Position::new(45.0, 7.0)),
        known("BB01", Position::new(45.1, 7.0)),
        known("BB02", Position::new(47.5, 7.0)),
        known("CC01", Position::new(45.2, 7.0)),
    ];
    let packets = vec![Packet::new(
        1,
        Position::new(45.0, 7.0),
        Position::new(45.2, 7.0),
        [0xAA, 0xBB, 0xCC],
    )];
    let result = Reconstructor::new(ReconstructionConfig::default())
        .unwrap()
        .run(nodes, &packets)
        .unwrap();

    assert_eq!(
        node_ids(&result.arena, &result.outcomes[0]),
        vec![Some("AA01".into()), Some("BB01".into()), Some("CC01".into())]
    );
    // AA01-CC01 is feasible but unused; BB02 is out of range of everyone
    let summary = result.summary();
    let edges: Vec<_> = summary
        .edges
        .iter()
        .map(|e| (e.from.to_string(), e.to.to_string(), e.traversals))
        .collect();
    assert_eq!(
        edges,
        vec![
            ("AA01".into(), "BB01".into(), 1),
            ("AA01".into(), "CC01".into(), 0),
            ("BB01".into(), "CC01".into(), 1),
        ]
    );
    assert_eq!(summary.edges[1].confidence, 0.0);
}

#[test]
fn test_ghost_when_matching_nodes_are_out_of_range() {
    // The only BB node is ~280 km from both neighbors
    let nodes = vec![
        known("AA01", Position::new(45.0, 7.0)),
        known("BB01", Position::new(47.5, 7.0)),
        known("CC01", Position::new(45.2, 7.0)),
    ];
    let packets = vec![Packet::new(
        1,
        Position::new(45.0, 7.0),
        Position::new(45.2, 7.0),
        [0xAA, 0xBB, 0xCC],
    )];
    let result = Reconstructor::new(ReconstructionConfig::default())
        .unwrap()
        .run(nodes, &packets)
        .unwrap();

    let path = result.outcomes[0].path().expect("decoded");
    let kinds: Vec<_> = path.hops.iter().map(|h| h.kind).collect();
    assert_eq!(kinds, vec![NodeKind::Known, NodeKind::Ghost, NodeKind::Known]);
    assert_eq!(
        node_ids(&result.arena, &result.outcomes[0]),
        vec![Some("AA01".into()), None, Some("CC01".into())]
    );
}

#[test]
fn test_unreachable_receiver() {
    let a = Position::new(45.0, 7.0);
    let arena = NodeArena::from_nodes([known("AA01", a)]).unwrap();
    let model = LinkModel::new(LinkCostParams::default());
    let graph = AdjacencyGraph::build(&arena, &SpatialIndex::build(&arena), &model);
    let decoder = Decoder::new(&arena, &graph, &model, None);

    let far = Position::new(47.0, 7.0);
    assert!(haversine_m(&a, &far) > 100_000.0);
    assert_eq!(
        decoder.decode(&Packet::new(9, a, far, [0xAA])),
        Err(DecodeError::Infeasible {
            packet: PacketId(9),
            hop: 1
        })
    );
}
