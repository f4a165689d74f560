use std::collections::BTreeMap;
use std::fmt;

use shape_kernel::{HasherRef, Location, TopoShape};

use crate::types::{EngineError, ObjectId};

/// Separator between the object part and the rest of a sub-path.
pub const SUBPATH_SEPARATOR: char = '.';

/// One hop of a cross-object reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Object the reference continues in.
    pub target: ObjectId,
    /// Sub-path left to resolve inside `target`.
    pub remainder: String,
    /// Placement applied to whatever `target` yields.
    pub placement: Option<Location>,
    /// The hop exists only while `target` is visible.
    pub visibility_dependent: bool,
}

/// A document object as seen by the resolver.
pub trait FeatureObject: fmt::Debug {
    fn id(&self) -> ObjectId;

    fn label(&self) -> &str;

    /// The object's own shape, if it computes one.
    fn shape(&self) -> Option<TopoShape>;

    /// Follow `subpath` into another object, or None if the sub-path is
    /// local to this object.
    fn resolve(&self, subpath: &str) -> Option<Link>;

    fn is_visible(&self) -> bool;
}

/// The document collaborator: object lookup and the shared string hasher.
pub trait Document {
    fn object(&self, id: ObjectId) -> Option<&dyn FeatureObject>;

    fn string_hasher(&self) -> HasherRef;
}

/// What a [`DocObject`] is.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// Computes a shape of its own.
    Feature { shape: Option<TopoShape> },
    /// Shows another object, optionally moved.
    Link {
        target: ObjectId,
        placement: Option<Location>,
    },
    /// Exposes its visible members by label.
    Group { members: Vec<(String, ObjectId)> },
}

#[derive(Debug, Clone)]
pub struct DocObject {
    pub id: ObjectId,
    pub label: String,
    pub kind: ObjectKind,
    pub visible: bool,
}

impl FeatureObject for DocObject {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn shape(&self) -> Option<TopoShape> {
        match &self.kind {
            ObjectKind::Feature { shape } => shape.clone(),
            _ => None,
        }
    }

    fn resolve(&self, subpath: &str) -> Option<Link> {
        match &self.kind {
            ObjectKind::Feature { .. } => None,
            ObjectKind::Link { target, placement } => Some(Link {
                target: *target,
                remainder: subpath.to_string(),
                placement: *placement,
                visibility_dependent: false,
            }),
            ObjectKind::Group { members } => {
                let (head, rest) = subpath
                    .split_once(SUBPATH_SEPARATOR)
                    .unwrap_or((subpath, ""));
                let (_, member) = members.iter().find(|(label, _)| label == head)?;
                Some(Link {
                    target: *member,
                    remainder: rest.to_string(),
                    placement: None,
                    visibility_dependent: true,
                })
            }
        }
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

/// A plain in-memory document.
#[derive(Debug)]
pub struct InMemoryDocument {
    objects: BTreeMap<ObjectId, DocObject>,
    next_id: i64,
    hasher: HasherRef,
}

impl InMemoryDocument {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: 1,
            hasher: HasherRef::new(),
        }
    }

    fn insert(&mut self, label: &str, kind: ObjectKind) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(
            id,
            DocObject {
                id,
                label: label.to_string(),
                kind,
                visible: true,
            },
        );
        id
    }

    /// Add a feature owning `shape`, which takes the feature's id as tag and
    /// the document hasher.
    pub fn add_feature(&mut self, label: &str, shape: Option<TopoShape>) -> ObjectId {
        let id = self.insert(label, ObjectKind::Feature { shape: None });
        if let Some(shape) = shape {
            // Freshly inserted, cannot fail.
            let _ = self.set_shape(id, shape);
        }
        id
    }

    pub fn add_link(&mut self, label: &str, target: ObjectId, placement: Option<Location>) -> ObjectId {
        self.insert(label, ObjectKind::Link { target, placement })
    }

    pub fn add_group(&mut self, label: &str, members: &[ObjectId]) -> Result<ObjectId, EngineError> {
        let mut labelled = Vec::with_capacity(members.len());
        for &member in members {
            let object = self.get(member)?;
            labelled.push((object.label.clone(), member));
        }
        Ok(self.insert(label, ObjectKind::Group { members: labelled }))
    }

    pub fn get(&self, id: ObjectId) -> Result<&DocObject, EngineError> {
        self.objects.get(&id).ok_or(EngineError::ObjectNotFound { id })
    }

    fn get_mut(&mut self, id: ObjectId) -> Result<&mut DocObject, EngineError> {
        self.objects.get_mut(&id).ok_or(EngineError::ObjectNotFound { id })
    }

    /// Replace a feature's shape.
    pub fn set_shape(&mut self, id: ObjectId, mut shape: TopoShape) -> Result<(), EngineError> {
        shape.set_tag(id.0);
        if shape.hasher().is_none() {
            shape.set_hasher(Some(self.hasher.clone()));
        }
        match &mut self.get_mut(id)?.kind {
            ObjectKind::Feature { shape: slot } => {
                *slot = Some(shape);
                Ok(())
            }
            _ => Err(EngineError::NoShape { id }),
        }
    }

    pub fn set_visible(&mut self, id: ObjectId, visible: bool) -> Result<(), EngineError> {
        self.get_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn add_to_group(&mut self, group: ObjectId, member: ObjectId) -> Result<(), EngineError> {
        let label = self.get(member)?.label.clone();
        match &mut self.get_mut(group)?.kind {
            ObjectKind::Group { members } => {
                members.push((label, member));
                Ok(())
            }
            _ => Err(EngineError::ObjectNotFound { id: group }),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for InMemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for InMemoryDocument {
    fn object(&self, id: ObjectId) -> Option<&dyn FeatureObject> {
        self.objects.get(&id).map(|o| o as &dyn FeatureObject)
    }

    fn string_hasher(&self) -> HasherRef {
        self.hasher.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_resolves_members_by_label() {
        let mut doc = InMemoryDocument::new();
        let a = doc.add_feature("Pad", None);
        let group = doc.add_group("Body", &[a]).unwrap();

        let object = doc.object(group).unwrap();
        let link = object.resolve("Pad.Face2").unwrap();
        assert_eq!(link.target, a);
        assert_eq!(link.remainder, "Face2");
        assert!(link.visibility_dependent);
        assert!(object.resolve("Nope.Face2").is_none());
    }

    #[test]
    fn links_forward_the_whole_subpath() {
        let mut doc = InMemoryDocument::new();
        let a = doc.add_feature("Pad", None);
        let link = doc.add_link("Copy", a, Some(Location::translation(1.0, 0.0, 0.0)));
        let hop = doc.object(link).unwrap().resolve("Edge3").unwrap();
        assert_eq!(hop.target, a);
        assert_eq!(hop.remainder, "Edge3");
        assert!(!hop.visibility_dependent);
        assert!(hop.placement.is_some());
    }

    #[test]
    fn ids_are_sequential() {
        let mut doc = InMemoryDocument::new();
        assert_eq!(doc.add_feature("A", None), ObjectId(1));
        assert_eq!(doc.add_feature("B", None), ObjectId(2));
        assert_eq!(doc.len(), 2);
        assert!(matches!(
            doc.set_visible(ObjectId(9), false),
            Err(EngineError::ObjectNotFound { .. })
        ));
    }
}
