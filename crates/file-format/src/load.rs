use std::collections::HashSet;

use naming_types::{
    ElementIdRefs, ElementMap, HasherRef, IndexedName, StringHasher, StringId, HASH_PREFIX,
};
use shape_kernel::TopoShape;
use tracing::{debug, instrument, warn};

use crate::errors::LoadError;
use crate::save::{ElementMapBlock, NameRecord, FORMAT_ID, FORMAT_VERSION};

/// Result of loading an element-map block.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded {
        map: ElementMap,
        warnings: Vec<String>,
    },
    /// The block was written for another naming or kernel version; the
    /// caller should regenerate the names instead.
    RecomputeNeeded { found: String, expected: String },
}

/// Deserialize an element-map block.
///
/// `hasher` is the document's interning table. Saved entries it lacks are
/// interned into it when they land on the same id. Names whose hashed
/// fragments it resolves differently than the table saved with the block
/// lose those fragments. Without a `hasher` the saved table is adopted.
#[instrument(skip(json, hasher))]
pub fn load_element_map(
    json: &str,
    expected_version: &str,
    hasher: Option<&HasherRef>,
) -> Result<LoadOutcome, LoadError> {
    let block: ElementMapBlock =
        serde_json::from_str(json).map_err(|e| LoadError::ParseError(e.to_string()))?;

    if block.format != FORMAT_ID {
        return Err(LoadError::UnknownFormat(block.format));
    }
    if block.format_version > FORMAT_VERSION {
        return Err(LoadError::FutureVersion {
            file_version: block.format_version,
            supported_version: FORMAT_VERSION,
        });
    }
    if block.version != expected_version {
        debug!(found = %block.version, "element map version mismatch");
        return Ok(LoadOutcome::RecomputeNeeded {
            found: block.version,
            expected: expected_version.to_string(),
        });
    }

    let mut warnings = Vec::new();
    let (map_hasher, conflicting) = match (hasher, block.hasher) {
        (Some(ours), Some(saved)) => {
            let conflicting = reconcile_hasher(ours, &saved);
            (Some(ours.clone()), conflicting)
        }
        (Some(ours), None) => (Some(ours.clone()), HashSet::new()),
        (None, Some(saved)) => (Some(HasherRef::from_hasher(saved)), HashSet::new()),
        (None, None) => (None, HashSet::new()),
    };

    let mut map = ElementMap::with_version(block.version);
    map.set_hasher(map_hasher);
    let mut seen = HashSet::new();
    for record in block.records {
        check_record(&record, &mut seen)?;
        let index = record.index;
        for (name, refs) in record.names.into_iter().zip(record.refs) {
            let degraded = refs.iter().any(|id| conflicting.contains(&id.0));
            let (name, refs) = if degraded {
                let msg = format!("{index}: dropping hashed fragments of {name}: string hasher differs");
                warn!("{msg}");
                warnings.push(msg);
                (name.strip_hashed(), ElementIdRefs::new())
            } else {
                (name, refs)
            };
            // Degraded names may collide and get a duplicate counter.
            let stored = map.set_name(index, name.clone(), refs);
            if stored != name && !degraded {
                return Err(LoadError::CorruptRecord {
                    index,
                    reason: format!("name {name} is owned by another element"),
                });
            }
        }
    }

    debug!(elements = map.len(), warnings = warnings.len(), "loaded element map");
    Ok(LoadOutcome::Loaded { map, warnings })
}

/// Load a block into `shape`, checking that every record exists in it.
///
/// The expected version and hasher are the shape's own.
pub fn restore_element_map(shape: &mut TopoShape, json: &str) -> Result<LoadOutcome, LoadError> {
    let expected = ElementMap::new(shape.kernel_version()).version().to_string();
    let outcome = load_element_map(json, &expected, shape.hasher())?;
    if let LoadOutcome::Loaded { map, .. } = &outcome {
        for (index, _) in map.iter() {
            if index.index as usize > shape.count_of(index.kind) {
                return Err(LoadError::CorruptRecord {
                    index,
                    reason: format!("shape has only {} {}s", shape.count_of(index.kind), index.kind),
                });
            }
        }
        shape.set_element_map(map.clone());
    }
    Ok(outcome)
}

fn check_record(record: &NameRecord, seen: &mut HashSet<IndexedName>) -> Result<(), LoadError> {
    let corrupt = |reason: String| LoadError::CorruptRecord {
        index: record.index,
        reason,
    };
    if !seen.insert(record.index) {
        return Err(corrupt("duplicate record".into()));
    }
    if record.count == 0 {
        return Err(corrupt("empty record".into()));
    }
    if record.names.len() != record.count || record.refs.len() != record.count {
        return Err(corrupt(format!(
            "count {} but {} names and {} refs",
            record.count,
            record.names.len(),
            record.refs.len()
        )));
    }
    if record.names.iter().any(|n| n.is_empty()) {
        return Err(corrupt("empty name".into()));
    }
    Ok(())
}

// Bring `ours` in line with `saved` where possible and return the ids that
// still resolve differently. Missing entries are appended only while the
// ids line up, so no existing name is renumbered.
fn reconcile_hasher(ours: &HasherRef, saved: &StringHasher) -> HashSet<u32> {
    let mut conflicting = HashSet::new();
    for id in 1..=saved.len() as u32 {
        let Some(text) = saved.get(StringId(id)) else {
            continue;
        };
        // A group expanding to a conflicting id conflicts too.
        let nested = conflicting
            .iter()
            .any(|inner: &u32| text.contains(&format!("{HASH_PREFIX}{}", StringId(*inner))));
        let same = !nested
            && match ours.lookup(StringId(id)) {
                Some(existing) => existing == text,
                None if ours.len() + 1 == id as usize => ours.intern(text) == StringId(id),
                None => false,
            };
        if !same {
            conflicting.insert(id);
        }
    }
    if !conflicting.is_empty() {
        debug!(conflicting = conflicting.len(), "string hasher ids differ");
    }
    conflicting
}
