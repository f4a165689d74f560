//! Memoized sub-path shapes, keyed by (owner, sub-path).
//!
//! Every entry records the objects its resolution went through. A change
//! notification for any of them drops the entry, so a cached value never
//! outlives the state it was computed from.

use std::collections::{BTreeSet, HashMap};

use shape_kernel::TopoShape;
use slotmap::{new_key_type, SlotMap};
use tracing::debug;

use crate::types::{ChangeKind, ObjectId};

new_key_type! {
    pub struct EntryKey;
}

#[derive(Debug, Clone)]
struct Entry {
    owner: ObjectId,
    subpath: String,
    shape: TopoShape,
    depends_on: BTreeSet<ObjectId>,
    generation: u64,
}

/// Owned, invalidate-on-write cache of resolved shapes.
#[derive(Debug, Default)]
pub struct ShapeValueCache {
    entries: SlotMap<EntryKey, Entry>,
    lookup: HashMap<(ObjectId, String), EntryKey>,
    /// Object -> entries whose resolution went through it.
    dependents: HashMap<ObjectId, Vec<EntryKey>>,
    generation: u64,
}

impl ShapeValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: ObjectId, subpath: &str) -> Option<&TopoShape> {
        let key = self.lookup.get(&(owner, subpath.to_string()))?;
        self.entries.get(*key).map(|e| &e.shape)
    }

    /// Objects the cached resolution of (owner, subpath) went through.
    pub fn dependencies(&self, owner: ObjectId, subpath: &str) -> Vec<ObjectId> {
        self.lookup
            .get(&(owner, subpath.to_string()))
            .and_then(|key| self.entries.get(*key))
            .map(|e| e.depends_on.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Entry by key. None once the entry was invalidated.
    pub fn get_by_key(&self, key: EntryKey) -> Option<&TopoShape> {
        self.entries.get(key).map(|e| &e.shape)
    }

    /// Generation at which the entry was stored.
    pub fn generation_of(&self, key: EntryKey) -> Option<u64> {
        self.entries.get(key).map(|e| e.generation)
    }

    /// Store `shape` for (owner, subpath).
    ///
    /// Refused (None) unless `cacheable`. `depends_on` lists the objects the
    /// resolution went through; the owner is always included.
    pub fn put(
        &mut self,
        owner: ObjectId,
        subpath: &str,
        shape: TopoShape,
        cacheable: bool,
        depends_on: &[ObjectId],
    ) -> Option<EntryKey> {
        if !cacheable {
            debug!(%owner, subpath, "refusing to cache visibility dependent shape");
            return None;
        }
        if let Some(old) = self.lookup.get(&(owner, subpath.to_string())).copied() {
            self.remove(old);
        }

        self.generation += 1;
        let mut deps: BTreeSet<ObjectId> = depends_on.iter().copied().collect();
        deps.insert(owner);
        let key = self.entries.insert(Entry {
            owner,
            subpath: subpath.to_string(),
            shape,
            depends_on: deps.clone(),
            generation: self.generation,
        });
        self.lookup.insert((owner, subpath.to_string()), key);
        for object in deps {
            self.dependents.entry(object).or_default().push(key);
        }
        Some(key)
    }

    /// Drop every entry whose resolution went through `object`. Returns the
    /// number of entries dropped.
    pub fn invalidate_all(&mut self, object: ObjectId) -> usize {
        let Some(keys) = self.dependents.remove(&object) else {
            return 0;
        };
        let dropped = keys.into_iter().filter(|&key| self.remove(key)).count();
        if dropped > 0 {
            debug!(%object, dropped, "invalidated cached shapes");
        }
        dropped
    }

    /// React to a change of `object`.
    pub fn notify_changed(&mut self, object: ObjectId, change: ChangeKind) -> usize {
        if change.invalidates() {
            self.invalidate_all(object)
        } else {
            0
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.lookup.clear();
        self.dependents.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove(&mut self, key: EntryKey) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        self.lookup.remove(&(entry.owner, entry.subpath));
        for object in &entry.depends_on {
            if let Some(keys) = self.dependents.get_mut(object) {
                keys.retain(|k| *k != key);
                if keys.is_empty() {
                    self.dependents.remove(object);
                }
            }
        }
        true
    }
}
