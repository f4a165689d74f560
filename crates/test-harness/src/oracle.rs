//! Naming oracles: pure functions returning pass/fail verdicts.
//!
//! Each oracle returns an `OracleVerdict` with diagnostic detail, not panics,
//! so a scenario can collect all failures in one pass.

use std::collections::HashMap;

use naming_types::{decode_history, IndexedName, ShapeKind};
use shape_kernel::TopoShape;

use crate::helpers::{name_table, NameTable};

/// The result of a single oracle check.
#[derive(Debug, Clone)]
pub struct OracleVerdict {
    pub oracle_name: String,
    pub passed: bool,
    pub detail: String,
}

impl OracleVerdict {
    fn pass(name: &str, detail: String) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: true,
            detail,
        }
    }

    fn fail(name: &str, detail: String) -> Self {
        Self {
            oracle_name: name.to_string(),
            passed: false,
            detail,
        }
    }

    fn from_failures(name: &str, checked: usize, failures: &[String]) -> Self {
        if failures.is_empty() {
            Self::pass(name, format!("{checked} checked"))
        } else {
            Self::fail(
                name,
                format!(
                    "{} of {checked} failed: {:?}",
                    failures.len(),
                    &failures[..failures.len().min(5)]
                ),
            )
        }
    }
}

// ── Coverage ────────────────────────────────────────────────────────────────

/// Every vertex, edge and face of `shape` has at least one name.
pub fn check_all_named(shape: &TopoShape) -> OracleVerdict {
    let mut checked = 0;
    let mut missing = Vec::new();
    for kind in ShapeKind::ELEMENTS {
        for i in 1..=shape.count_of(kind) as u32 {
            checked += 1;
            let index = IndexedName::new(kind, i);
            if shape.element_name(index).is_none() {
                missing.push(index.to_string());
            }
        }
    }
    OracleVerdict::from_failures("all_named", checked, &missing)
}

// ── Map Consistency ─────────────────────────────────────────────────────────

/// Every name resolves back to the element that owns it, and no two
/// elements share a name.
pub fn check_names_injective(shape: &TopoShape) -> OracleVerdict {
    let map = shape.element_map();
    let mut owners: HashMap<&str, IndexedName> = HashMap::new();
    let mut failures = Vec::new();
    for (index, entries) in map.iter() {
        for entry in entries {
            let name = entry.name.as_str();
            if let Some(other) = owners.insert(name, index) {
                failures.push(format!("{name} owned by {other} and {index}"));
            }
            match map.get_index(name) {
                Some(owner) if owner == index => {}
                owner => failures.push(format!("{name} of {index} resolves to {owner:?}")),
            }
        }
    }
    OracleVerdict::from_failures("names_injective", owners.len(), &failures)
}

/// Every primary name decodes into a history within `max_depth` levels.
pub fn check_histories_decode(shape: &TopoShape, max_depth: usize) -> OracleVerdict {
    let map = shape.element_map();
    let hasher = map.hasher().or(shape.hasher());
    let mut checked = 0;
    let mut failures = Vec::new();
    for (index, _) in map.iter() {
        let Some(name) = map.get_name(index) else {
            continue;
        };
        checked += 1;
        if let Err(e) = decode_history(name, hasher, max_depth) {
            failures.push(format!("{index}: {e}"));
        }
    }
    OracleVerdict::from_failures("histories_decode", checked, &failures)
}

// ── Stability ───────────────────────────────────────────────────────────────

/// Every primary name of a `kind` element of `before` still resolves in `after`.
pub fn check_names_stable(before: &TopoShape, after: &TopoShape, kind: ShapeKind) -> OracleVerdict {
    let mut checked = 0;
    let mut lost = Vec::new();
    for i in 1..=before.count_of(kind) as u32 {
        let Some(name) = before.element_name(IndexedName::new(kind, i)) else {
            continue;
        };
        checked += 1;
        if after.element_map().get_index(name.as_str()).is_none() {
            lost.push(name.to_string());
        }
    }
    OracleVerdict::from_failures("names_stable", checked, &lost)
}

/// Two name tables are identical.
pub fn check_same_names(expected: &NameTable, actual: &TopoShape) -> OracleVerdict {
    let actual = name_table(actual);
    let mut failures = Vec::new();
    if expected.len() != actual.len() {
        failures.push(format!(
            "{} named elements, expected {}",
            actual.len(),
            expected.len()
        ));
    }
    for (want, got) in expected.iter().zip(&actual) {
        if want != got {
            failures.push(format!("{want:?} != {got:?}"));
        }
    }
    OracleVerdict::from_failures("same_names", expected.len(), &failures)
}
