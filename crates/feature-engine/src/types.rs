use std::fmt;

use naming_ops::NamingError;
use serde::{Deserialize, Serialize};

/// Stable integer identity of a document object. Doubles as the tag of the
/// shapes the object owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub i64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What changed on an object, as reported to the value cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// The object's own shape was recomputed or replaced.
    Shape,
    /// Objects were added to or removed from the object's group.
    GroupMembership,
    /// The object was marked for recompute.
    Touched,
    /// Visibility toggled.
    Visibility,
    /// Anything that cannot affect a shape, such as the label.
    Cosmetic,
}

impl ChangeKind {
    /// True if cached shapes that went through the object must be dropped.
    pub fn invalidates(self) -> bool {
        !matches!(self, ChangeKind::Cosmetic)
    }
}

/// Errors from the feature engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("object not found: {id}")]
    ObjectNotFound { id: ObjectId },

    #[error("object {id} has no shape")]
    NoShape { id: ObjectId },

    #[error("element {element:?} not found in the shape of {id}")]
    ElementNotFound { id: ObjectId, element: String },

    #[error("reference chain exceeds depth limit {limit}: {chain}")]
    DepthExceeded { limit: usize, chain: String },

    #[error("naming error: {0}")]
    Naming(#[from] NamingError),
}
