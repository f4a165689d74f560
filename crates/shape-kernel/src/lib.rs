//! Shape values and the kernel capabilities the naming engine consumes:
//! raw topology, per-operation correspondence reports, element geometry and
//! the per-shape index cache.

pub mod geometry;
pub mod index_cache;
pub mod mapper;
pub mod mock_kernel;
pub mod shape;
pub mod traits;
pub mod types;

pub use geometry::{relation, Geometry, Relation};
pub use index_cache::ShapeIndexCache;
pub use mapper::{NoMapping, RecordedMapper};
pub use mock_kernel::{MockKernel, MockTopology, MOCK_KERNEL_VERSION};
pub use shape::TopoShape;
pub use traits::*;
pub use types::*;
