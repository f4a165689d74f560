//! Property-based checks for element map invariants and history decoding.

use std::collections::HashSet;

use naming_types::{
    decode_history, ElementIdRefs, ElementMap, IndexedName, MappedName, Marker, NameStep,
    ShapeKind, SourceGroup, StepIndex, DEFAULT_MAX_DEPTH,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_kind() -> impl Strategy<Value = ShapeKind> {
    prop_oneof![
        Just(ShapeKind::Vertex),
        Just(ShapeKind::Edge),
        Just(ShapeKind::Face),
    ]
}

fn arb_index() -> impl Strategy<Value = IndexedName> {
    (arb_kind(), 1u32..6).prop_map(|(kind, i)| IndexedName::new(kind, i))
}

/// Small alphabet so collisions between elements actually happen.
fn arb_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Face1".to_string()),
        Just("Edge1".to_string()),
        Just("Edge1;:H7".to_string()),
        "[A-Z][a-z]{0,3}[0-9]{1,2}",
    ]
}

fn arb_marker() -> impl Strategy<Value = Marker> {
    prop_oneof![
        Just(Marker::Generated),
        Just(Marker::Modified),
        Just(Marker::ModGen),
        Just(Marker::Lower),
    ]
}

fn arb_step_index() -> impl Strategy<Value = StepIndex> {
    prop_oneof![
        Just(StepIndex::None),
        Just(StepIndex::Coplanar),
        Just(StepIndex::Parallel),
        (1u32..40).prop_map(StepIndex::Counter),
    ]
}

// ---------------------------------------------------------------------------
// 1. No two elements share a name, and every name resolves to its owner.
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn names_are_injective(ops in prop::collection::vec((arb_index(), arb_name()), 1..60)) {
        let mut map = ElementMap::new("mock");
        for (index, name) in &ops {
            map.set_name(*index, MappedName::new(name), ElementIdRefs::new());
        }

        let mut primaries = HashSet::new();
        for (index, entries) in map.iter() {
            prop_assert!(!entries.is_empty());
            prop_assert!(primaries.insert(entries[0].name.clone()),
                "primary {} shared", entries[0].name);
            for entry in entries {
                prop_assert_eq!(map.get_index(entry.name.as_str()), Some(index));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Chains of any depth decode back to their tags, newest first.
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn chained_history_round_trips(
        origin_tag in 1i64..500,
        steps in prop::collection::vec(
            (arb_marker(), arb_step_index(), "[A-Z][a-z]{2,6}", 1i64..10_000),
            1..12,
        ),
    ) {
        let mut name = MappedName::new("Edge4").with_tag(origin_tag);
        for (marker, index, op, tag) in &steps {
            name = name.with_step(&NameStep {
                marker: *marker,
                index: *index,
                group: SourceGroup::None,
                op: Some(op),
                tag: *tag,
            });
        }

        let history = decode_history(&name, None, DEFAULT_MAX_DEPTH).unwrap();
        prop_assert_eq!(history.original.as_str(), "Edge4");
        prop_assert_eq!(history.origin_tag, Some(origin_tag));
        let expected: Vec<i64> = steps.iter().rev().map(|s| s.3).collect();
        prop_assert_eq!(history.tags(), expected);
        let expected_ops: Vec<&str> = steps.iter().rev().map(|s| s.2.as_str()).collect();
        prop_assert_eq!(history.ops(), expected_ops);
        let expected_idx: Vec<StepIndex> = steps.iter().rev().map(|s| s.1).collect();
        let decoded_idx: Vec<StepIndex> = history.steps.iter().map(|s| s.index).collect();
        prop_assert_eq!(decoded_idx, expected_idx);
    }
}
