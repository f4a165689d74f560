//! Name transfer between structurally identical shapes, and name queries.

use naming_types::{decode_history, ElementMap, IndexedName, NameHistory};
use shape_kernel::TopoShape;
use tracing::{debug, instrument};

use crate::types::{Diagnostics, NamingError, ShapeRole};

/// Give `output` the names of `input`, which must have the same structure
/// (e.g. `output` is `input` after a rigid transform).
///
/// Untagged names from an input with a different, non-zero tag record the
/// input's tag. Count mismatches are reported and the common count copied.
#[instrument(skip(output, input), fields(tag = output.tag(), from = input.tag()))]
pub fn copy_names(output: &mut TopoShape, input: &TopoShape) -> Result<Diagnostics, NamingError> {
    if output.is_null() {
        return Err(NamingError::NullShape {
            role: ShapeRole::Output,
        });
    }
    if input.is_null() {
        return Err(NamingError::NullShape {
            role: ShapeRole::Input { position: 0 },
        });
    }

    let tag = input.tag();
    let mut source = input.clone();
    if tag != 0 && tag != output.tag() {
        let mut tagged = ElementMap::with_version(input.element_map().version());
        tagged.set_hasher(input.element_map().hasher().cloned());
        for (index, entries) in input.element_map().iter() {
            for entry in entries {
                let name = if entry.name.has_tag() {
                    entry.name.clone()
                } else {
                    entry.name.with_tag(tag)
                };
                tagged.set_name(index, name, entry.refs.clone());
            }
        }
        source.set_element_map(tagged);
    }

    let mut diagnostics = Diagnostics::default();
    diagnostics.extend(output.copy_element_map(&source, None));
    debug!(names = output.element_map().name_count(), "copied element names");
    Ok(diagnostics)
}

/// Decoded history of the primary name of `index`, if it has one.
pub fn element_history(
    shape: &TopoShape,
    index: IndexedName,
    max_depth: usize,
) -> Result<Option<NameHistory>, NamingError> {
    let Some(name) = shape.element_name(index) else {
        return Ok(None);
    };
    let hasher = shape.element_map().hasher().or(shape.hasher());
    Ok(Some(decode_history(name, hasher, max_depth)?))
}
