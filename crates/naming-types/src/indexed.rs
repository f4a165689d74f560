use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The kind of a topological sub-entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Vertex,
    Edge,
    Face,
    Wire,
    Shell,
    Solid,
    CompSolid,
    Compound,
}

impl ShapeKind {
    /// Kinds that carry element names, lowest first.
    pub const ELEMENTS: [ShapeKind; 3] = [ShapeKind::Vertex, ShapeKind::Edge, ShapeKind::Face];

    pub const ALL: [ShapeKind; 8] = [
        ShapeKind::Vertex,
        ShapeKind::Edge,
        ShapeKind::Face,
        ShapeKind::Wire,
        ShapeKind::Shell,
        ShapeKind::Solid,
        ShapeKind::CompSolid,
        ShapeKind::Compound,
    ];

    /// Sort rank used when ordering correspondence sources: Vertex < Edge < Face < other.
    pub fn rank(self) -> u8 {
        match self {
            ShapeKind::Vertex => 0,
            ShapeKind::Edge => 1,
            ShapeKind::Face => 2,
            ShapeKind::Wire
            | ShapeKind::Shell
            | ShapeKind::Solid
            | ShapeKind::CompSolid
            | ShapeKind::Compound => 3,
        }
    }

    /// Containment level: a kind only contains kinds of a lower level
    /// (compounds may also nest).
    pub fn level(self) -> u8 {
        match self {
            ShapeKind::Vertex => 0,
            ShapeKind::Edge => 1,
            ShapeKind::Wire => 2,
            ShapeKind::Face => 3,
            ShapeKind::Shell => 4,
            ShapeKind::Solid => 5,
            ShapeKind::CompSolid => 6,
            ShapeKind::Compound => 7,
        }
    }

    pub fn is_element(self) -> bool {
        matches!(self, ShapeKind::Vertex | ShapeKind::Edge | ShapeKind::Face)
    }

    /// The element kind directly bounding this one (Face -> Edge -> Vertex).
    pub fn lower(self) -> Option<ShapeKind> {
        match self {
            ShapeKind::Face => Some(ShapeKind::Edge),
            ShapeKind::Edge => Some(ShapeKind::Vertex),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Vertex => "Vertex",
            ShapeKind::Edge => "Edge",
            ShapeKind::Face => "Face",
            ShapeKind::Wire => "Wire",
            ShapeKind::Shell => "Shell",
            ShapeKind::Solid => "Solid",
            ShapeKind::CompSolid => "CompSolid",
            ShapeKind::Compound => "Compound",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShapeKind {
    type Err = NameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShapeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| NameParseError::UnknownKind(s.to_string()))
    }
}

/// Errors from parsing textual element references.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameParseError {
    #[error("unknown shape kind: {0}")]
    UnknownKind(String),

    #[error("invalid element index in {0:?}")]
    InvalidIndex(String),
}

/// Ephemeral reference to a sub-entity: kind plus 1-based index.
///
/// Only meaningful against the shape snapshot it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexedName {
    pub kind: ShapeKind,
    pub index: u32,
}

impl IndexedName {
    pub fn new(kind: ShapeKind, index: u32) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for IndexedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.index)
    }
}

impl FromStr for IndexedName {
    type Err = NameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| NameParseError::InvalidIndex(s.to_string()))?;
        let (kind, digits) = s.split_at(split);
        let kind: ShapeKind = kind.parse()?;
        let index: u32 = digits
            .parse()
            .map_err(|_| NameParseError::InvalidIndex(s.to_string()))?;
        if index == 0 {
            return Err(NameParseError::InvalidIndex(s.to_string()));
        }
        Ok(IndexedName { kind, index })
    }
}

impl Serialize for IndexedName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IndexedName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_name_text_form() {
        let name = IndexedName::new(ShapeKind::Face, 12);
        assert_eq!(name.to_string(), "Face12");
        assert_eq!("Face12".parse::<IndexedName>().unwrap(), name);
        assert_eq!(
            "CompSolid3".parse::<IndexedName>().unwrap(),
            IndexedName::new(ShapeKind::CompSolid, 3)
        );
    }

    #[test]
    fn indexed_name_rejects_garbage() {
        assert!("Face".parse::<IndexedName>().is_err());
        assert!("Face0".parse::<IndexedName>().is_err());
        assert!("Blob3".parse::<IndexedName>().is_err());
    }

    #[test]
    fn rank_orders_elements_before_aggregates() {
        assert!(ShapeKind::Vertex.rank() < ShapeKind::Edge.rank());
        assert!(ShapeKind::Edge.rank() < ShapeKind::Face.rank());
        assert_eq!(ShapeKind::Solid.rank(), ShapeKind::Wire.rank());
        assert_eq!(ShapeKind::Face.lower(), Some(ShapeKind::Edge));
        assert_eq!(ShapeKind::Vertex.lower(), None);
    }
}
