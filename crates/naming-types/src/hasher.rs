use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Small integer id handed out by a [`StringHasher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StringId(pub u32);

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Per-document interning table that keeps composite element names compact.
///
/// Ids start at 1 and are never reused, so a name that embeds an id can always
/// be expanded again as long as the same table is available.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StringHasher {
    strings: Vec<String>,
    #[serde(skip)]
    lookup: HashMap<String, StringId>,
}

impl StringHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text`, returning the existing id if it was seen before.
    pub fn intern(&mut self, text: &str) -> StringId {
        if self.lookup.len() != self.strings.len() {
            self.rebuild_lookup();
        }
        if let Some(id) = self.lookup.get(text) {
            return *id;
        }
        self.strings.push(text.to_string());
        let id = StringId(self.strings.len() as u32);
        self.lookup.insert(text.to_string(), id);
        id
    }

    pub fn get(&self, id: StringId) -> Option<&str> {
        let slot = (id.0 as usize).checked_sub(1)?;
        self.strings.get(slot).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    // The lookup table is not serialized; it is rebuilt lazily after load.
    fn rebuild_lookup(&mut self) {
        self.lookup = self
            .strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), StringId(i as u32 + 1)))
            .collect();
    }
}

/// Shared handle to a document's [`StringHasher`].
///
/// Two handles are the same hasher only if they point at the same table.
#[derive(Clone, Default)]
pub struct HasherRef(Rc<RefCell<StringHasher>>);

impl HasherRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_hasher(hasher: StringHasher) -> Self {
        Self(Rc::new(RefCell::new(hasher)))
    }

    pub fn intern(&self, text: &str) -> StringId {
        self.0.borrow_mut().intern(text)
    }

    pub fn lookup(&self, id: StringId) -> Option<String> {
        self.0.borrow().get(id).map(str::to_string)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn same_as(&self, other: &HasherRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Snapshot of the table, for persisting alongside a document.
    pub fn snapshot(&self) -> StringHasher {
        self.0.borrow().clone()
    }
}

impl fmt::Debug for HasherRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HasherRef")
            .field("ptr", &Rc::as_ptr(&self.0))
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut hasher = StringHasher::new();
        let a = hasher.intern("(1:Edge1,2:Edge2)");
        let b = hasher.intern("(1:Edge1,2:Edge2)");
        assert_eq!(a, b);
        assert_eq!(a, StringId(1));
        assert_eq!(hasher.get(a), Some("(1:Edge1,2:Edge2)"));
        assert_eq!(hasher.get(StringId(0)), None);
    }

    #[test]
    fn lookup_survives_serde() {
        let mut hasher = StringHasher::new();
        hasher.intern("alpha");
        hasher.intern("beta");
        let json = serde_json::to_string(&hasher).unwrap();
        let mut restored: StringHasher = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.intern("beta"), StringId(2));
        assert_eq!(restored.intern("gamma"), StringId(3));
    }

    #[test]
    fn handles_compare_by_identity() {
        let a = HasherRef::new();
        let b = a.clone();
        let c = HasherRef::new();
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        let id = b.intern("shared");
        assert_eq!(a.lookup(id).as_deref(), Some("shared"));
    }
}
