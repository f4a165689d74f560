use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::hasher::HasherRef;
use crate::indexed::{IndexedName, ShapeKind};
use crate::mapped::{ElementIdRefs, MappedName, DUPLICATE_POSTFIX};

/// Version of the naming algorithm, combined with the kernel version into
/// the map's version string.
pub const ALGO_VERSION: &str = "4";

/// One name registered for an element, with the hasher ids it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    pub name: MappedName,
    pub refs: ElementIdRefs,
}

/// Bidirectional map between the elements of one shape and their persistent names.
///
/// An element may own several names; the first one registered is its primary
/// name. Every name resolves back to exactly one element.
#[derive(Debug, Clone, Default)]
pub struct ElementMap {
    forward: BTreeMap<IndexedName, Vec<NameEntry>>,
    reverse: HashMap<MappedName, IndexedName>,
    version: String,
    hasher: Option<HasherRef>,
}

impl ElementMap {
    pub fn new(kernel_version: &str) -> Self {
        Self {
            version: format!("{ALGO_VERSION}.{kernel_version}"),
            ..Self::default()
        }
    }

    /// Build a map carrying an explicit, already combined version string.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn check_version(&self, version: &str) -> bool {
        self.version == version
    }

    pub fn hasher(&self) -> Option<&HasherRef> {
        self.hasher.as_ref()
    }

    pub fn set_hasher(&mut self, hasher: Option<HasherRef>) {
        self.hasher = hasher;
    }

    /// Register `name` for `index` and return the name actually stored.
    ///
    /// Names are appended, never replaced. An empty name is a no-op. A name
    /// already owned by another element gets a `;:D<n>` counter so the
    /// reverse mapping stays unique.
    pub fn set_name(
        &mut self,
        index: IndexedName,
        name: MappedName,
        refs: ElementIdRefs,
    ) -> MappedName {
        if name.is_empty() {
            return name;
        }
        let stored = match self.reverse.get(&name) {
            Some(owner) if *owner == index => return name,
            Some(owner) => {
                let unique = self.next_free(&name, index);
                debug!(%name, %owner, %index, ?unique, "element name already taken");
                match unique {
                    Some(unique) => unique,
                    None => return MappedName::empty(),
                }
            }
            None => name,
        };
        self.reverse.insert(stored.clone(), index);
        self.forward.entry(index).or_default().push(NameEntry {
            name: stored.clone(),
            refs,
        });
        stored
    }

    // Smallest `;:D<n>` variant that is free or already owned by `index`.
    // Returns None when `index` already owns one of the variants.
    fn next_free(&self, name: &MappedName, index: IndexedName) -> Option<MappedName> {
        let mut n = 1u32;
        loop {
            let candidate = name.append(&format!("{DUPLICATE_POSTFIX}{n}"));
            match self.reverse.get(&candidate) {
                None => return Some(candidate),
                Some(owner) if *owner == index => return None,
                Some(_) => n += 1,
            }
        }
    }

    /// Primary name of `index`.
    pub fn get_name(&self, index: IndexedName) -> Option<&MappedName> {
        self.forward
            .get(&index)
            .and_then(|entries| entries.first())
            .map(|entry| &entry.name)
    }

    /// All names of `index`, primary first.
    pub fn names(&self, index: IndexedName) -> &[NameEntry] {
        self.forward.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_index(&self, name: &str) -> Option<IndexedName> {
        self.reverse.get(name).copied()
    }

    pub fn is_named(&self, index: IndexedName) -> bool {
        self.forward.contains_key(&index)
    }

    /// Number of named elements.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Total number of names across all elements.
    pub fn name_count(&self) -> usize {
        self.reverse.len()
    }

    pub fn count_of(&self, kind: ShapeKind) -> usize {
        self.forward.keys().filter(|idx| idx.kind == kind).count()
    }

    /// Named elements in index order.
    pub fn iter(&self) -> impl Iterator<Item = (IndexedName, &[NameEntry])> + '_ {
        self.forward
            .iter()
            .map(|(index, entries)| (*index, entries.as_slice()))
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }

    /// Copy every name of `other` into this map, optionally appending `postfix`.
    ///
    /// If the two maps intern through different hashers the incoming hasher is
    /// adopted when this map has none; otherwise names referencing foreign ids
    /// lose their hashed fragments.
    pub fn merge(&mut self, other: &ElementMap, postfix: Option<&str>) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut foreign = false;
        match (&self.hasher, &other.hasher) {
            (None, Some(theirs)) => self.hasher = Some(theirs.clone()),
            (Some(ours), Some(theirs)) if !ours.same_as(theirs) => {
                foreign = true;
                let msg = "merging element maps with different string hashers".to_string();
                warn!("{msg}");
                warnings.push(msg);
            }
            _ => {}
        }

        for (index, entries) in other.iter() {
            for entry in entries {
                let (mut name, refs) = if foreign && !entry.refs.is_empty() {
                    (entry.name.strip_hashed(), ElementIdRefs::new())
                } else {
                    (entry.name.clone(), entry.refs.clone())
                };
                if let Some(postfix) = postfix {
                    name = name.append(postfix);
                }
                self.set_name(index, name, refs);
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::StringId;

    fn face(i: u32) -> IndexedName {
        IndexedName::new(ShapeKind::Face, i)
    }

    #[test]
    fn first_name_is_primary() {
        let mut map = ElementMap::new("mock");
        map.set_name(face(1), "Face1".into(), ElementIdRefs::new());
        map.set_name(face(1), "Face1;:H2".into(), ElementIdRefs::new());
        assert_eq!(map.get_name(face(1)).map(MappedName::as_str), Some("Face1"));
        assert_eq!(map.names(face(1)).len(), 2);
        assert_eq!(map.get_index("Face1;:H2"), Some(face(1)));
        assert_eq!(map.len(), 1);
        assert_eq!(map.name_count(), 2);
    }

    #[test]
    fn empty_name_is_ignored() {
        let mut map = ElementMap::new("mock");
        let stored = map.set_name(face(1), MappedName::empty(), ElementIdRefs::new());
        assert!(stored.is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn taken_name_is_normalized() {
        let mut map = ElementMap::new("mock");
        map.set_name(face(1), "Face1".into(), ElementIdRefs::new());
        let stored = map.set_name(face(2), "Face1".into(), ElementIdRefs::new());
        assert_eq!(stored.as_str(), "Face1;:D1");
        assert_eq!(map.get_index("Face1"), Some(face(1)));
        assert_eq!(map.get_index("Face1;:D1"), Some(face(2)));

        // Re-registering for the same element does not mint another counter.
        let again = map.set_name(face(2), "Face1".into(), ElementIdRefs::new());
        assert!(again.is_empty());
        assert_eq!(map.names(face(2)).len(), 1);
    }

    #[test]
    fn version_combines_algorithm_and_kernel() {
        let map = ElementMap::new("occ-7.8");
        assert_eq!(map.version(), "4.occ-7.8");
        assert!(map.check_version("4.occ-7.8"));
        assert!(!map.check_version("3.occ-7.8"));
    }

    #[test]
    fn merge_appends_postfix() {
        let mut source = ElementMap::new("mock");
        source.set_name(face(1), "Face1".into(), ElementIdRefs::new());
        source.set_name(IndexedName::new(ShapeKind::Edge, 2), "Edge2".into(), ElementIdRefs::new());

        let mut target = ElementMap::new("mock");
        let warnings = target.merge(&source, Some(";:H5"));
        assert!(warnings.is_empty());
        assert_eq!(target.get_index("Face1;:H5"), Some(face(1)));
        assert_eq!(target.count_of(ShapeKind::Edge), 1);
    }

    #[test]
    fn merge_adopts_or_degrades_hasher() {
        let theirs = HasherRef::new();
        let id = theirs.intern("(1:Edge2)");
        let mut refs = ElementIdRefs::new();
        refs.insert(id);
        let mut source = ElementMap::new("mock");
        source.set_hasher(Some(theirs.clone()));
        source.set_name(face(1), format!("Face1;:M#{id};Fuse").into(), refs);

        let mut adopting = ElementMap::new("mock");
        assert!(adopting.merge(&source, None).is_empty());
        assert!(adopting.hasher().is_some_and(|h| h.same_as(&theirs)));
        assert_eq!(adopting.names(face(1))[0].refs.len(), 1);

        let mut degrading = ElementMap::new("mock");
        degrading.set_hasher(Some(HasherRef::new()));
        let warnings = degrading.merge(&source, None);
        assert_eq!(warnings.len(), 1);
        let entry = &degrading.names(face(1))[0];
        assert_eq!(entry.name.as_str(), "Face1;:M;Fuse");
        assert!(entry.refs.is_empty());
        assert!(!entry.refs.contains(StringId(1)));
    }
}
