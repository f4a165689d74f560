use nalgebra::{Isometry3, Point3, Translation3, Unit, UnitQuaternion, Vector3};

// Re-export shared types from naming-types
pub use naming_types::{ElementIdRefs, ElementMap, HasherRef, IndexedName, MappedName, ShapeKind};

/// Identity of an underlying kernel entity.
///
/// Every located or reoriented use of the same entity shares its partner id.
/// Allocated by the kernel; NEVER persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartnerId(pub u64);

/// Rigid placement of a sub-entity relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location(pub Isometry3<f64>);

impl Location {
    pub fn identity() -> Self {
        Self(Isometry3::identity())
    }

    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self(Isometry3::from_parts(
            Translation3::new(dx, dy, dz),
            UnitQuaternion::identity(),
        ))
    }

    /// Rotation of `angle` radians about `axis` through the origin.
    pub fn rotation(axis: [f64; 3], angle: f64) -> Self {
        let axis = Unit::new_normalize(Vector3::from(axis));
        Self(Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_axis_angle(&axis, angle),
        ))
    }

    /// `self` applied after `inner`.
    pub fn compose(&self, inner: &Location) -> Location {
        Location(self.0 * inner.0)
    }

    pub fn inverse(&self) -> Location {
        Location(self.0.inverse())
    }

    pub fn is_identity(&self) -> bool {
        self.0 == Isometry3::identity()
    }

    pub fn apply_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.0.transform_point(p)
    }

    pub fn apply_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.0.transform_vector(v)
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::identity()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    #[default]
    Forward,
    Reversed,
}

impl Orientation {
    pub fn reversed(self) -> Self {
        match self {
            Orientation::Forward => Orientation::Reversed,
            Orientation::Reversed => Orientation::Forward,
        }
    }

    /// Orientation of a child seen through a parent with orientation `self`.
    pub fn compose(self, child: Orientation) -> Orientation {
        match self {
            Orientation::Forward => child,
            Orientation::Reversed => child.reversed(),
        }
    }
}

/// Handle to one use of a kernel entity inside a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct SubShape {
    pub kind: ShapeKind,
    pub partner: PartnerId,
    pub location: Location,
    pub orientation: Orientation,
}

impl SubShape {
    pub fn new(kind: ShapeKind, partner: PartnerId) -> Self {
        Self {
            kind,
            partner,
            location: Location::identity(),
            orientation: Orientation::Forward,
        }
    }

    /// Same underlying entity, whatever its placement or orientation.
    pub fn is_partner(&self, other: &SubShape) -> bool {
        self.kind == other.kind && self.partner == other.partner
    }

    /// Same entity at the same placement.
    pub fn is_same(&self, other: &SubShape) -> bool {
        self.is_partner(other) && self.location == other.location
    }

    /// Same entity, placement and orientation.
    pub fn is_equal(&self, other: &SubShape) -> bool {
        self.is_same(other) && self.orientation == other.orientation
    }

    /// This handle moved by `location` (applied on top of its own).
    pub fn located(&self, location: &Location) -> SubShape {
        SubShape {
            location: location.compose(&self.location),
            ..self.clone()
        }
    }

    pub fn reversed(&self) -> SubShape {
        SubShape {
            orientation: self.orientation.reversed(),
            ..self.clone()
        }
    }

    /// A child handle stored relative to this one, expressed in this handle's frame.
    pub fn child(&self, local: &SubShape) -> SubShape {
        SubShape {
            kind: local.kind,
            partner: local.partner,
            location: self.location.compose(&local.location),
            orientation: self.orientation.compose(local.orientation),
        }
    }
}

/// Errors from kernel operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KernelError {
    #[error("entity not found: {name}")]
    EntityNotFound { name: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("operation not supported: {operation}")]
    NotSupported { operation: String },
}
