//! Naming operations: the element map builder that names an operation's
//! output from its inputs, and name transfer between identical shapes.

pub mod builder;
pub mod config;
pub mod copy;
pub mod types;

pub use builder::{make_element_map, validate_op, ElementMapBuilder};
pub use config::BuilderConfig;
pub use copy::{copy_names, element_history};
pub use types::*;
