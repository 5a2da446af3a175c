//! Property-style tests of the public transfer API on seeded random grids.

use glam::DVec3;
use grid_transfer::geometry::{KdTreeIndex, LinearScanIndex};
use grid_transfer::{
    CorrespondenceBuilder, CorrespondenceOptions, Grid, NodeId, Registry, TransferError,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Random points inside `[lo, hi]^3`, ids starting at `first_id`.
fn random_grid(n: usize, lo: f64, hi: f64, first_id: NodeId, seed: u64) -> Grid {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Grid::from_nodes((0..n as NodeId).map(|i| {
        let p = DVec3::new(
            rng.gen_range(lo..hi),
            rng.gen_range(lo..hi),
            rng.gen_range(lo..hi),
        );
        (first_id + i, p)
    }))
    .unwrap()
}

/// Smooth analytic field evaluated at each node.
fn with_field(mut grid: Grid, name: &str) -> Grid {
    let values: Vec<(NodeId, f64)> = grid
        .node_ids()
        .iter()
        .zip(grid.coordinates())
        .map(|(&id, p)| (id, 3.0 * p.x - 2.0 * p.y + p.z * p.z + 100.0))
        .collect();
    grid.set_field(name, values).unwrap();
    grid
}

/// Structured lattice with unit spacing, shifted by `offset`.
fn lattice_grid(nx: u32, ny: u32, nz: u32, offset: DVec3, first_id: NodeId) -> Grid {
    let mut nodes = Vec::new();
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                let p = DVec3::new(x as f64, y as f64, z as f64) + offset;
                nodes.push((first_id + nodes.len() as NodeId, p));
            }
        }
    }
    Grid::from_nodes(nodes).unwrap()
}

/// Build with both backends and require identical tables.
fn assert_backends_agree(source: &Grid, target: &Grid, options: CorrespondenceOptions) {
    let builder = CorrespondenceBuilder::new(options);
    let kd = builder
        .build_with::<KdTreeIndex>("s", source, "t", target)
        .unwrap();
    let brute = builder
        .build_with::<LinearScanIndex>("s", source, "t", target)
        .unwrap();
    assert_eq!(kd.lonely_count(), brute.lonely_count());
    for ((ida, a), (idb, b)) in kd.iter().zip(brute.iter()) {
        assert_eq!(ida, idb);
        let sa: Option<Vec<NodeId>> = a.map(|l| l.iter().map(|n| n.source).collect());
        let sb: Option<Vec<NodeId>> = b.map(|l| l.iter().map(|n| n.source).collect());
        assert_eq!(sa, sb, "target {}", ida);
    }
}

#[test]
fn test_convexity_property() {
    let source = with_field(random_grid(800, 0.0, 10.0, 1, 11), "t");
    let mut target = random_grid(300, 0.5, 9.5, 5_000, 22);

    let options = CorrespondenceOptions::default().with_neighbors(6);
    let table = CorrespondenceBuilder::new(options)
        .build("src", &source, "dst", &target)
        .unwrap();
    grid_transfer::transition::transfer(&source, "t", &mut target, &table).unwrap();

    let values = source.get_field("t").unwrap();
    for (id, entry) in table.iter() {
        let neighbors = entry.expect("no cutoff, every node has neighbors");
        let got = target.value(id, "t").unwrap();
        let nv: Vec<f64> = neighbors.iter().map(|n| values.get(n.source).unwrap()).collect();
        let lo = nv.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = nv.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(
            got >= lo - 1e-9 && got <= hi + 1e-9,
            "node {}: {} outside [{}, {}]",
            id,
            got,
            lo,
            hi
        );
    }
}

#[test]
fn test_exact_match_property() {
    let source = with_field(random_grid(200, 0.0, 1.0, 0, 5), "t");

    // Target shares every other source position, plus some new points.
    let mut target = Grid::new();
    for (i, (&id, &p)) in source.node_ids().iter().zip(source.coordinates()).enumerate() {
        if i % 2 == 0 {
            target.insert_node(10_000 + id, p).unwrap();
        }
    }
    let extra = random_grid(50, 0.0, 1.0, 20_000, 6);
    for (&id, &p) in extra.node_ids().iter().zip(extra.coordinates()) {
        target.insert_node(id, p).unwrap();
    }

    let table = CorrespondenceBuilder::new(CorrespondenceOptions::default().with_neighbors(5))
        .build("s", &source, "t", &target)
        .unwrap();
    let summary = grid_transfer::transition::transfer(&source, "t", &mut target, &table).unwrap();
    assert_eq!(summary.exact_matches, 100);
    assert_eq!(summary.total(), target.len());

    for (i, &id) in source.node_ids().iter().enumerate() {
        if i % 2 == 0 {
            assert_eq!(
                target.value(10_000 + id, "t"),
                source.value(id, "t"),
                "coincident node {} must copy its source value exactly",
                id
            );
        }
    }
}

#[test]
fn test_lonely_nodes_tallied_consistently() {
    let source = with_field(random_grid(100, 0.0, 1.0, 0, 7), "t");
    // Target extends far past the source along x.
    let mut target = random_grid(60, 0.0, 1.0, 1_000, 8);
    for i in 0..10 {
        target
            .insert_node(2_000 + i, [50.0 + i as f64, 0.5, 0.5])
            .unwrap();
    }

    let mut registry = Registry::new();
    registry.add_grid("s", source).unwrap();
    registry.add_grid("t", target).unwrap();
    let options = CorrespondenceOptions::default()
        .with_neighbors(4)
        .with_max_distance(2.0);
    let lonely = registry
        .build_correspondence("s", "t", &options)
        .unwrap()
        .lonely_count();
    assert_eq!(lonely, 10);

    let summary = registry.transfer("s", "t", "t").unwrap();
    assert_eq!(summary.lonely, 10);
    let stats = registry.statistics("s", "t").unwrap();
    assert_eq!(stats.lonely, 10);

    let target = registry.grid("t").unwrap();
    for i in 0..10 {
        assert!(target.value(2_000 + i, "t").unwrap().is_nan());
    }
    assert_eq!(target.get_field("t").unwrap().missing_count(), 10);
}

#[test]
fn test_overlap_rejection_never_caches() {
    let a = random_grid(50, 0.0, 1.0, 0, 1);
    let b = random_grid(50, 1.5, 2.5, 0, 2);
    let mut registry = Registry::new();
    registry.add_grid("a", a).unwrap();
    registry.add_grid("b", b).unwrap();

    for (s, t) in [("a", "b"), ("b", "a")] {
        let err = registry
            .build_correspondence(s, t, &CorrespondenceOptions::default())
            .unwrap_err();
        assert!(matches!(err, TransferError::NonOverlappingGrids { .. }), "{:?}", err);
        assert!(!registry.has_correspondence(s, t));
    }
}

#[test]
fn test_chunk_invariance_of_tables() {
    let source = random_grid(1_000, -5.0, 5.0, 0, 31);
    let target = random_grid(333, -5.0, 5.0, 0, 32);

    let reference = CorrespondenceBuilder::new(
        CorrespondenceOptions::default().with_neighbors(8).with_chunks(1),
    )
    .build("s", &source, "t", &target)
    .unwrap();

    for chunks in [2, 3, 10, 64, 333, 1_000] {
        let table = CorrespondenceBuilder::new(
            CorrespondenceOptions::default().with_neighbors(8).with_chunks(chunks),
        )
        .build("s", &source, "t", &target)
        .unwrap();
        assert!(
            table.iter().eq(reference.iter()),
            "chunks={} produced a different table",
            chunks
        );
    }
}

#[test]
fn test_kdtree_and_linear_scan_tables_agree() {
    let source = random_grid(400, 0.0, 3.0, 0, 41);
    let target = random_grid(120, 0.0, 3.0, 0, 42);
    assert_backends_agree(
        &source,
        &target,
        CorrespondenceOptions::default()
            .with_neighbors(5)
            .with_max_distance(0.6),
    );
}

#[test]
fn test_round_trip_full_overlap_has_no_missing_values() {
    let a = with_field(random_grid(500, 0.0, 10.0, 0, 51), "t");
    let b = random_grid(200, 0.0, 10.0, 0, 52);
    let mut registry = Registry::new();
    registry.add_grid("fine", a).unwrap();
    registry.add_grid("coarse", b).unwrap();

    let options = CorrespondenceOptions::default().with_neighbors(4);
    registry.build_correspondence("fine", "coarse", &options).unwrap();
    registry.build_correspondence("coarse", "fine", &options).unwrap();

    let report = registry.validate_round_trip("fine", "t", "coarse").unwrap();
    assert_eq!(report.missing, 0);
    assert_eq!(report.source_nodes, 500);
    let diff = report.abs_difference.unwrap();
    assert!(diff.mean.is_finite());
    assert!(diff.std_dev.is_finite());
    let ratio = report.ratio.unwrap();
    // Field range is [80, 230]; convex weights keep every ratio inside its span.
    assert!(ratio.min > 80.0 / 230.0 - 1e-9, "{:?}", ratio);
    assert!(ratio.max < 230.0 / 80.0 + 1e-9, "{:?}", ratio);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["missing"], 0);
    assert_eq!(json["field"], "t");
}

#[test]
fn test_replacing_grid_requires_rebuild() {
    let a = with_field(random_grid(100, 0.0, 1.0, 0, 61), "t");
    let b = random_grid(40, 0.0, 1.0, 0, 62);
    let mut registry = Registry::new();
    registry.add_grid("a", a).unwrap();
    registry.add_grid("b", b).unwrap();
    registry
        .build_correspondence("a", "b", &CorrespondenceOptions::default())
        .unwrap();
    registry.transfer("a", "t", "b").unwrap();

    registry
        .update_grid("b", random_grid(70, 0.0, 1.0, 0, 63))
        .unwrap();
    assert!(matches!(
        registry.transfer("a", "t", "b"),
        Err(TransferError::MissingCorrespondence { .. })
    ));

    registry
        .build_correspondence("a", "b", &CorrespondenceOptions::default())
        .unwrap();
    let summary = registry.transfer("a", "t", "b").unwrap();
    assert_eq!(summary.total(), 70);
    assert!(registry.grid("b").unwrap().check_completeness("t").is_ok());
}

#[test]
fn test_planar_mesh_transfer() {
    // Two 2D meshes at z = 0, the second staggered by half a cell.
    let source = with_field(lattice_grid(60, 60, 1, DVec3::ZERO, 0), "t");
    let mut target = lattice_grid(59, 59, 1, DVec3::new(0.5, 0.5, 0.0), 100_000);

    let options = CorrespondenceOptions::default().with_neighbors(4);
    assert_backends_agree(&source, &target, options);

    let table = CorrespondenceBuilder::new(options)
        .build("s", &source, "t", &target)
        .unwrap();
    let summary = grid_transfer::transition::transfer(&source, "t", &mut target, &table).unwrap();
    assert_eq!(summary.weighted, 59 * 59);

    // Four equidistant corners: the plain average of the cell.
    let values = source.get_field("t").unwrap();
    let corners = [0, 1, 60, 61].map(|id| values.get(id).unwrap());
    let expected = corners.iter().sum::<f64>() / 4.0;
    assert!((target.value(100_000, "t").unwrap() - expected).abs() < 1e-9);
}

#[test]
fn test_structured_lattice_backends_agree() {
    let source = lattice_grid(20, 20, 20, DVec3::ZERO, 0);
    let target = lattice_grid(7, 7, 7, DVec3::splat(2.5), 0);
    assert_backends_agree(&source, &target, CorrespondenceOptions::default());
    assert_backends_agree(
        &source,
        &target,
        CorrespondenceOptions::default()
            .with_neighbors(7)
            .with_max_distance(1.0),
    );
}

#[test]
fn test_coincident_interface_nodes() {
    // 300 nodes stacked on one interface point, plus one free node.
    let mut source = Grid::from_nodes((0..300).map(|id| (id, [0.0, 0.0, 0.0]))).unwrap();
    source.insert_node(300, [1.0, 1.0, 1.0]).unwrap();
    source
        .set_field("t", (0..=300).map(|id| (id, if id == 300 { 50.0 } else { 7.0 })))
        .unwrap();
    let target = Grid::from_nodes(vec![(0, [0.0, 0.0, 0.0]), (1, [1.0, 1.0, 1.0]), (2, [0.5, 0.5, 0.5])])
        .unwrap();

    let options = CorrespondenceOptions::default().with_neighbors(5);
    assert_backends_agree(&source, &target, options);

    let mut registry = Registry::new();
    registry.add_grid("s", source).unwrap();
    registry.add_grid("t", target).unwrap();
    let table = registry.build_correspondence("s", "t", &options).unwrap();
    let first: Vec<NodeId> = table.get(0).unwrap().unwrap().iter().map(|n| n.source).collect();
    assert_eq!(first, vec![0, 1, 2, 3, 4]);

    registry.transfer("s", "t", "t").unwrap();
    let t = registry.grid("t").unwrap();
    assert_eq!(t.value(0, "t"), Some(7.0));
    assert_eq!(t.value(1, "t"), Some(50.0));
    // All 301 nodes are equidistant from the center; ties go to the lowest
    // index, so only stacked nodes contribute.
    let center = t.value(2, "t").unwrap();
    assert!((center - 7.0).abs() < 1e-9, "{}", center);
    let center_sources: Vec<NodeId> = registry
        .correspondence("s", "t")
        .unwrap()
        .get(2)
        .unwrap()
        .unwrap()
        .iter()
        .map(|n| n.source)
        .collect();
    assert_eq!(center_sources, vec![0, 1, 2, 3, 4]);
}
