//! Feature history scenarios against the mock kernel.
//!
//! Each scenario runs through ModelBuilder and checks the naming properties
//! that must hold after every recompute.

use file_format::LoadOutcome;
use naming_ops::make_element_map;
use naming_types::{HasherRef, IndexedName, ShapeKind, DEFAULT_MAX_DEPTH};
use proptest::prelude::*;
use shape_kernel::{Geometry, Location, MockKernel, NoMapping};
use test_harness::helpers::*;
use test_harness::oracle;
use test_harness::ModelBuilder;

const TOP: &str = ";Face1;:H1;:GP;Extrude;:H2";

fn pad(height: f64) -> ModelBuilder {
    init_tracing();
    let mut m = ModelBuilder::new().with_auto_check();
    m.rect_sketch("sk", 0., 0., 4., 4.).unwrap();
    m.extrude("pad", "sk", height).unwrap();
    m
}

fn vertex_z(shape: &shape_kernel::TopoShape) -> f64 {
    let vertex = shape.element(IndexedName::new(ShapeKind::Vertex, 1)).unwrap();
    match shape.geometry(&vertex) {
        Some(Geometry::Point(p)) => p.z,
        other => panic!("expected a point, got {other:?}"),
    }
}

// ── Scenario 1: Pad ─────────────────────────────────────────────────────

#[test]
fn test_pad_names_every_element() {
    let mut m = pad(2.0);
    m.assert_no_warnings().unwrap();

    let solid = m.shape("pad").unwrap();
    assert_eq!(solid.count_of(ShapeKind::Face), 6);
    for verdict in m.verify("pad").unwrap() {
        assert!(verdict.passed, "{verdict:?}");
    }

    let top = m.element("pad", TOP).unwrap();
    assert_eq!(top.root().map(|r| r.kind), Some(ShapeKind::Face));
    assert!((vertex_z(&top) - 2.0).abs() < 1e-12);
}

#[test]
fn test_rebuild_is_deterministic() {
    let mut first = pad(2.0);
    let mut second = pad(2.0);
    let expected = first.names("pad").unwrap();
    let verdict = oracle::check_same_names(&expected, &second.shape("pad").unwrap());
    assert!(verdict.passed, "{verdict:?}");

    // Recomputing in place gives the same names as well.
    first.extrude("pad", "sk", 2.0).unwrap();
    let verdict = oracle::check_same_names(&expected, &first.shape("pad").unwrap());
    assert!(verdict.passed, "{verdict:?}");
}

// ── Scenario 2: Profile edit ────────────────────────────────────────────

#[test]
fn test_face_names_survive_an_added_hole() {
    let mut m = pad(2.0);
    let before = m.shape("pad").unwrap();

    m.sketch(
        "sk",
        &rect_points(0., 0., 4., 4., 0.),
        &[square_hole(2., 2., 0.5, 0.)],
    )
    .unwrap();
    m.extrude("pad", "sk", 2.0).unwrap();
    let after = m.shape("pad").unwrap();

    assert_eq!(after.count_of(ShapeKind::Face), 10);
    let verdict = oracle::check_names_stable(&before, &after, ShapeKind::Face);
    assert!(verdict.passed, "{verdict:?}");
    assert!(m.element("pad", TOP).is_ok());
}

// ── Scenario 3: Fuse ────────────────────────────────────────────────────

#[test]
fn test_fuse_names_modified_halves() {
    init_tracing();
    let mut m = ModelBuilder::new().with_auto_check();
    m.rect_sketch("a", 0., 0., 1., 1.).unwrap();
    m.rect_sketch("b", 2., 0., 2., 1.).unwrap();
    let report = m.fuse("fuse", "a", "b", 3.0).unwrap();
    assert_eq!(report.unnamed, 0);

    let low = m.element("fuse", ";Face1;:H2;:M1;Fuse;:H3").unwrap();
    let high = m.element("fuse", ";Face1;:H2;:M2;Fuse;:H3").unwrap();
    assert_eq!(low.root().map(|r| r.kind), Some(ShapeKind::Face));
    assert_eq!(high.root().map(|r| r.kind), Some(ShapeKind::Face));

    let fused = m.shape("fuse").unwrap();
    let index = fused.find_sub_shape(";Face1;:H2;:M1;Fuse;:H3").unwrap();
    let history = m.history_of("fuse", index).unwrap().unwrap();
    assert_eq!(history.original.as_str(), "Face1");
    assert_eq!(history.origin_tag, Some(2));
    assert_eq!(history.ops(), vec!["Fuse"]);
    assert_eq!(history.tags(), vec![3]);
}

// ── Scenario 4: References through links ────────────────────────────────

#[test]
fn test_linked_reference_follows_recompute() {
    let mut m = pad(2.0);
    m.link("copy", "pad", None).unwrap();
    m.link("moved", "pad", Some(Location::translation(0., 0., 10.)))
        .unwrap();

    assert!((vertex_z(&m.element("copy", TOP).unwrap()) - 2.0).abs() < 1e-12);
    assert!((vertex_z(&m.element("moved", TOP).unwrap()) - 12.0).abs() < 1e-12);

    m.extrude("pad", "sk", 5.0).unwrap();
    assert!((vertex_z(&m.element("copy", TOP).unwrap()) - 5.0).abs() < 1e-12);
    assert!((vertex_z(&m.element("moved", TOP).unwrap()) - 15.0).abs() < 1e-12);
    assert_eq!(
        m.history().last(),
        Some(&("Extrude".to_string(), "pad".to_string()))
    );
}

#[test]
fn test_duplicate_link_label_is_rejected() {
    let mut m = pad(1.0);
    m.link("copy", "pad", None).unwrap();
    assert!(matches!(
        m.link("copy", "pad", None),
        Err(test_harness::HarnessError::DuplicateName { .. })
    ));
    assert!(matches!(
        m.link("other", "missing", None),
        Err(test_harness::HarnessError::FeatureNotFound { .. })
    ));
}

// ── Scenario 5: Persistence ─────────────────────────────────────────────

#[test]
fn test_saved_names_reload_unchanged() {
    let mut m = pad(2.0);
    let original = m.shape("pad").unwrap();
    let (fresh, outcome) = m.reload("pad").unwrap();

    assert!(matches!(outcome, LoadOutcome::Loaded { .. }));
    let verdict = oracle::check_same_names(&name_table(&original), &fresh);
    assert!(verdict.passed, "{verdict:?}");
    assert_eq!(
        fresh.find_sub_shape(TOP),
        original.find_sub_shape(TOP)
    );
    assert_eq!(primary_names(&fresh), primary_names(&original));
}

#[test]
fn test_reload_into_fresh_document_hasher() {
    let mut m = ModelBuilder::new().with_auto_check();
    m.rect_sketch("a", 0., 0., 1., 1.).unwrap();
    m.rect_sketch("b", 2., 0., 2., 1.).unwrap();
    m.fuse("fuse", "a", "b", 3.0).unwrap();
    let original = m.shape("fuse").unwrap();

    let document = HasherRef::new();
    let (fresh, outcome) = m.reload_into("fuse", Some(document.clone())).unwrap();
    match outcome {
        LoadOutcome::Loaded { warnings, .. } => assert!(warnings.is_empty(), "{warnings:?}"),
        other => panic!("expected a loaded map, got {other:?}"),
    }
    assert!(fresh.hasher().unwrap().same_as(&document));
    let verdict = oracle::check_same_names(&name_table(&original), &fresh);
    assert!(verdict.passed, "{verdict:?}");
    let verdict = oracle::check_histories_decode(&fresh, DEFAULT_MAX_DEPTH);
    assert!(verdict.passed, "{verdict:?}");
}

// ── Scenario 6: Disambiguated inputs ────────────────────────────────────

#[test]
fn test_duplicate_names_survive_a_further_operation() {
    init_tracing();
    let mut kernel = MockKernel::new();
    let mut parts = Vec::new();
    for x in [0., 2.] {
        let mut face = kernel
            .polygon_face(&rect_points(x, 0., 1., 1., 0.), &[])
            .unwrap()
            .with_tag(4);
        face.name_elements_by_index();
        parts.push(face);
    }
    let mut both = kernel.compound(&parts).unwrap();
    make_element_map(&mut both, &NoMapping, &parts, "Compound").unwrap();
    assert_eq!(
        name_of(&both, IndexedName::new(ShapeKind::Face, 2)).as_deref(),
        Some("Face1;:H4;:D1")
    );
    for verdict in [
        oracle::check_all_named(&both),
        oracle::check_names_injective(&both),
        oracle::check_histories_decode(&both, DEFAULT_MAX_DEPTH),
    ] {
        assert!(verdict.passed, "{verdict:?}");
    }

    let face = both.sub_shape(IndexedName::new(ShapeKind::Face, 2)).unwrap();
    let (solid, mapper) = kernel.prism(&face, [0., 0., 1.]).unwrap();
    let mut solid = solid.with_tag(9);
    make_element_map(&mut solid, &mapper, &[face], "Extrude").unwrap();
    for verdict in [
        oracle::check_all_named(&solid),
        oracle::check_names_injective(&solid),
        oracle::check_histories_decode(&solid, DEFAULT_MAX_DEPTH),
    ] {
        assert!(verdict.passed, "{verdict:?}");
    }
    assert!(solid
        .find_sub_shape(";Face1;:H4;:D1;:GP;Extrude;:H9")
        .is_some());
}

// ── Property Tests ──────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_box_is_fully_and_uniquely_named(
        w in 0.5f64..10.0,
        h in 0.5f64..10.0,
        height in 0.5f64..10.0,
    ) {
        let mut m = ModelBuilder::new();
        m.rect_sketch("sk", 0., 0., w, h).unwrap();
        m.extrude("pad", "sk", height).unwrap();
        for verdict in m.verify("pad").unwrap() {
            prop_assert!(verdict.passed, "{:?}", verdict);
        }
        prop_assert!(m.element("pad", TOP).is_ok());
    }
}
