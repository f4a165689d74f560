//! Persistent element naming primitives: the string hasher, ephemeral
//! indexed names, persistent mapped names and the per-shape element map.

pub mod element_map;
pub mod hasher;
pub mod history;
pub mod indexed;
pub mod mapped;

pub use element_map::*;
pub use hasher::*;
pub use history::*;
pub use indexed::*;
pub use mapped::*;
