use feature_engine::*;
use naming_ops::NamingError;
use proptest::prelude::*;
use shape_kernel::*;

fn square(kernel: &mut MockKernel) -> TopoShape {
    let mut face = kernel
        .polygon_face(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            &[],
        )
        .unwrap();
    face.name_elements_by_index();
    face
}

fn idx(kind: ShapeKind, index: u32) -> IndexedName {
    IndexedName::new(kind, index)
}

// ── Resolution ─────────────────────────────────────────────────────────────

#[test]
fn test_own_shape_takes_owner_tag_and_hasher() {
    let mut kernel = MockKernel::new();
    let mut engine = Engine::new();
    let pad = engine.add_feature("Pad", Some(square(&mut kernel)));

    let shape = engine.get_shape(pad, "").unwrap();
    assert_eq!(shape.tag(), pad.0);
    assert!(shape
        .hasher()
        .unwrap()
        .same_as(&engine.document.string_hasher()));
    assert_eq!(shape.count_of(ShapeKind::Edge), 4);
}

#[test]
fn test_element_subpaths() {
    let mut kernel = MockKernel::new();
    let mut engine = Engine::new();
    let pad = engine.add_feature("Pad", Some(square(&mut kernel)));

    let edge = engine.get_shape(pad, "Edge2").unwrap();
    assert_eq!(edge.root().map(|r| r.kind), Some(ShapeKind::Edge));
    assert_eq!(
        edge.element_name(idx(ShapeKind::Edge, 1)).map(MappedName::as_str),
        Some("Edge2")
    );
    let by_name = engine.get_shape(pad, ";Vertex3").unwrap();
    assert_eq!(by_name.root().map(|r| r.kind), Some(ShapeKind::Vertex));

    match engine.get_shape(pad, "Face7") {
        Err(EngineError::ElementNotFound { id, element }) => {
            assert_eq!(id, pad);
            assert_eq!(element, "Face7");
        }
        other => panic!("expected ElementNotFound, got {other:?}"),
    }
    assert!(matches!(
        engine.get_shape(ObjectId(99), ""),
        Err(EngineError::ObjectNotFound { .. })
    ));
    let empty = engine.add_feature("Empty", None);
    assert!(matches!(
        engine.get_shape(empty, ""),
        Err(EngineError::NoShape { .. })
    ));
}

#[test]
fn test_results_are_cached() {
    let mut kernel = MockKernel::new();
    let mut engine = Engine::new();
    let pad = engine.add_feature("Pad", Some(square(&mut kernel)));
    let link = engine.add_link("Copy", pad, None);

    let first = engine.get_shape(link, "Face1").unwrap();
    assert_eq!(engine.resolver().cache().len(), 2);
    assert!(engine.resolver().cache().get(pad, "Face1").is_some());
    let second = engine.get_shape(link, "Face1").unwrap();
    assert!(first.shares_element_map(&second));
    assert_eq!(engine.resolver().cache().len(), 2);
}

#[test]
fn test_link_placement_moves_geometry_and_keeps_names() {
    let mut kernel = MockKernel::new();
    let mut engine = Engine::new();
    let pad = engine.add_feature("Pad", Some(square(&mut kernel)));
    let moved = engine.add_link("Moved", pad, Some(Location::translation(0.0, 0.0, 5.0)));

    let original = engine.get_shape(pad, "").unwrap();
    let shape = engine.get_shape(moved, "").unwrap();
    assert!(shape.shares_element_map(&original));

    let vertex = shape.element(idx(ShapeKind::Vertex, 1)).unwrap();
    match shape.geometry(&vertex) {
        Some(Geometry::Point(p)) => assert!((p.z - 5.0).abs() < 1e-12),
        other => panic!("expected a point, got {other:?}"),
    }
    assert_eq!(
        shape.find_sub_shape(";Edge4"),
        Some(idx(ShapeKind::Edge, 4))
    );
}

#[test]
fn test_hidden_group_member_has_no_shape() {
    let mut kernel = MockKernel::new();
    let mut engine = Engine::new();
    let pad = engine.add_feature("Pad", Some(square(&mut kernel)));
    let body = engine.add_group("Body", &[pad]).unwrap();

    let face = engine.get_shape(body, "Pad.Face1").unwrap();
    assert_eq!(face.tag(), pad.0);
    // Visibility dependent: only the member's own entry is stored.
    assert!(engine.resolver().cache().get(body, "Pad.Face1").is_none());
    assert!(engine.resolver().cache().get(pad, "Face1").is_some());

    engine.set_visible(pad, false).unwrap();
    assert!(engine.resolver().cache().is_empty());
    assert!(matches!(
        engine.get_shape(body, "Pad.Face1"),
        Err(EngineError::NoShape { id }) if id == pad
    ));
}

#[test]
fn test_group_membership_change_is_seen() {
    let mut kernel = MockKernel::new();
    let mut engine = Engine::new();
    let pad = engine.add_feature("Pad", Some(square(&mut kernel)));
    let body = engine.add_group("Body", &[]).unwrap();
    assert!(engine.get_shape(body, "Pad").is_err());

    engine.add_to_group(body, pad).unwrap();
    let shape = engine.get_shape(body, "Pad").unwrap();
    assert_eq!(shape.count_of(ShapeKind::Face), 1);
}

#[test]
fn test_reference_cycle_reports_chain() {
    let mut engine = Engine::with_config(ResolverConfig { max_depth: 4 }, Default::default());
    let a = engine.add_link("A", ObjectId(2), None);
    let b = engine.add_link("B", a, None);
    assert_eq!(b, ObjectId(2));

    match engine.get_shape(a, "Face1") {
        Err(EngineError::DepthExceeded { limit, chain }) => {
            assert_eq!(limit, 4);
            assert_eq!(chain, "A -> B -> A -> B -> A");
        }
        other => panic!("expected DepthExceeded, got {other:?}"),
    }
}

// ── Recompute ──────────────────────────────────────────────────────────────

#[test]
fn test_commit_names_output_and_drops_stale_entries() {
    let mut kernel = MockKernel::new();
    let mut engine = Engine::new();
    let sketch = engine.add_feature("Sketch", Some(square(&mut kernel)));
    let pad = engine.add_feature("Pad", None);
    let link = engine.add_link("Copy", pad, None);

    let profile = engine.get_shape(sketch, "").unwrap();
    let (solid, mapper) = kernel.prism(&profile, [0.0, 0.0, 1.0]).unwrap();
    let report = engine
        .commit(pad, solid, &mapper, &[profile.clone()], "Pad")
        .unwrap();
    assert_eq!(report.unnamed, 0);
    assert!(engine.warnings.is_empty());

    let top = engine.get_shape(link, ";Face1;:H1;:GP;Pad;:H2").unwrap();
    assert_eq!(top.root().map(|r| r.kind), Some(ShapeKind::Face));
    assert!(engine.resolver().cache().get(link, ";Face1;:H1;:GP;Pad;:H2").is_some());

    // Recompute with a taller prism: the cached face must not survive.
    let (taller, mapper) = kernel.prism(&profile, [0.0, 0.0, 3.0]).unwrap();
    engine
        .commit(pad, taller, &mapper, &[profile], "Pad")
        .unwrap();
    assert!(engine.resolver().cache().get(link, ";Face1;:H1;:GP;Pad;:H2").is_none());
    let top = engine.get_shape(link, ";Face1;:H1;:GP;Pad;:H2").unwrap();
    let vertex = top.element(idx(ShapeKind::Vertex, 1)).unwrap();
    match top.geometry(&vertex) {
        Some(Geometry::Point(p)) => assert!((p.z - 3.0).abs() < 1e-12),
        other => panic!("expected a point, got {other:?}"),
    }
}

#[test]
fn test_commit_rejects_null_output() {
    let mut engine = Engine::new();
    let pad = engine.add_feature("Pad", None);
    match engine.commit(pad, TopoShape::null(), &NoMapping, &[], "Pad") {
        Err(EngineError::Naming(NamingError::NullShape { .. })) => {}
        other => panic!("expected a null shape error, got {other:?}"),
    }
    assert!(matches!(
        engine.commit(ObjectId(42), TopoShape::null(), &NoMapping, &[], "Pad"),
        Err(EngineError::ObjectNotFound { .. })
    ));
}

// ── Invalidation along link chains ─────────────────────────────────────────

proptest! {
    #[test]
    fn touching_any_hop_drops_the_reference(hops in 1usize..6, pick in 0usize..6) {
        let mut kernel = MockKernel::new();
        let mut engine = Engine::new();
        let mut ids = vec![engine.add_feature("Base", Some(square(&mut kernel)))];
        for i in 0..hops {
            let previous = *ids.last().unwrap();
            ids.push(engine.add_link(&format!("L{i}"), previous, None));
        }
        let last = *ids.last().unwrap();
        engine.get_shape(last, "Face1").unwrap();
        prop_assert!(engine.resolver().cache().get(last, "Face1").is_some());

        let touched = ids[pick % ids.len()];
        engine.touch(touched).unwrap();
        prop_assert!(engine.resolver().cache().get(last, "Face1").is_none());
    }
}
