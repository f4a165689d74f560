//! Test harness for scripted naming scenarios.
//!
//! Builds small feature histories over the mock kernel and checks the
//! naming properties that must hold after every recompute.
//!
//! # Key Components
//!
//! - [`ModelBuilder`]: fluent API over the engine with features addressed by label
//! - [`oracle`]: checks returning pass/fail verdicts instead of panicking
//! - [`helpers`]: error type, profile builders, name tables, tracing setup

pub mod helpers;
pub mod oracle;
pub mod workflow;

pub use helpers::HarnessError;
pub use oracle::OracleVerdict;
pub use workflow::ModelBuilder;
