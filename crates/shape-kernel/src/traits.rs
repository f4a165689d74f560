use std::fmt;

use crate::geometry::Geometry;
use crate::types::SubShape;

/// Raw structure of one shape value, supplied by the geometry kernel.
///
/// Implemented by MockTopology (deterministic test double) and by adapters
/// over a real kernel. The engine never mutates a topology; a structural
/// change always arrives as a new `Topology` value.
pub trait Topology: fmt::Debug {
    /// The shape itself. None for a null shape.
    fn root(&self) -> Option<SubShape>;

    /// Direct sub-entities of `shape`, placed in `shape`'s frame.
    fn children(&self, shape: &SubShape) -> Vec<SubShape>;

    /// Carrier geometry of `shape` in world coordinates, if it has one.
    fn geometry(&self, shape: &SubShape) -> Option<Geometry>;

    /// Kernel version folded into element map versions.
    fn kernel_version(&self) -> &str;
}

/// Correspondence report of one kernel operation.
///
/// Lists, for an input sub-entity, the output sub-entities it was generated
/// from or modified into. Inputs without correspondence return nothing.
pub trait Mapper {
    fn generated(&self, input: &SubShape) -> Vec<SubShape>;

    fn modified(&self, input: &SubShape) -> Vec<SubShape>;
}
