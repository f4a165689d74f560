use naming_types::{ElementIdRefs, ElementMap, IndexedName, MappedName, StringHasher};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::SaveError;

/// Format identifier of the element-map block.
pub const FORMAT_ID: &str = "element-map";

/// Current block format version.
pub const FORMAT_VERSION: u32 = 1;

/// The persisted element-map block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementMapBlock {
    /// Format identifier.
    pub format: String,
    /// Block format version number.
    pub format_version: u32,
    /// Version of the map itself (naming algorithm + kernel).
    pub version: String,
    /// Interning table the names' hashed fragments refer to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hasher: Option<StringHasher>,
    /// One record per named element, in index order.
    pub records: Vec<NameRecord>,
}

/// All names of one element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRecord {
    pub index: IndexedName,
    pub count: usize,
    pub names: Vec<MappedName>,
    pub refs: Vec<ElementIdRefs>,
}

/// Serialize `map` to a pretty-printed JSON block.
///
/// Unnamed elements have no record. The hasher table is included when any
/// name references it.
#[instrument(skip(map), fields(version = map.version()))]
pub fn save_element_map(map: &ElementMap) -> Result<String, SaveError> {
    let records: Vec<NameRecord> = map
        .iter()
        .map(|(index, entries)| NameRecord {
            index,
            count: entries.len(),
            names: entries.iter().map(|e| e.name.clone()).collect(),
            refs: entries.iter().map(|e| e.refs.clone()).collect(),
        })
        .collect();
    let referenced = records
        .iter()
        .any(|r| r.refs.iter().any(|refs| !refs.is_empty()));
    let hasher = match map.hasher() {
        Some(hasher) if referenced => Some(hasher.snapshot()),
        _ => None,
    };

    debug!(records = records.len(), with_hasher = hasher.is_some(), "saving element map");
    let block = ElementMapBlock {
        format: FORMAT_ID.to_string(),
        format_version: FORMAT_VERSION,
        version: map.version().to_string(),
        hasher,
        records,
    };
    serde_json::to_string_pretty(&block).map_err(|e| SaveError::Serialize(e.to_string()))
}
