//! Helper functions: error type, profile builders, name tables.

use feature_engine::EngineError;
use file_format::{LoadError, SaveError};
use naming_types::{IndexedName, MappedName};
use shape_kernel::{KernelError, TopoShape};
use tracing_subscriber::EnvFilter;

// ── Error Type ──────────────────────────────────────────────────────────────

/// Unified error type for the test harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("feature not found: {name}")]
    FeatureNotFound { name: String },

    #[error("duplicate name: {name}")]
    DuplicateName { name: String },

    #[error("assertion failed: {detail}")]
    AssertionFailed { detail: String },

    #[error("oracle failure ({oracle}): {detail}")]
    OracleFailure { oracle: String, detail: String },

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("save error: {0}")]
    Save(#[from] SaveError),

    #[error("load error: {0}")]
    Load(#[from] LoadError),
}

// ── Tracing ─────────────────────────────────────────────────────────────────

/// Route engine logs to the test output, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Profile Builders ────────────────────────────────────────────────────────

/// Corner points of an axis-aligned rectangle at height `z`, counter-clockwise.
pub fn rect_points(x: f64, y: f64, w: f64, h: f64, z: f64) -> Vec<[f64; 3]> {
    vec![[x, y, z], [x + w, y, z], [x + w, y + h, z], [x, y + h, z]]
}

/// A square hole loop of side `2 * half` centred at (`cx`, `cy`), clockwise.
pub fn square_hole(cx: f64, cy: f64, half: f64, z: f64) -> Vec<[f64; 3]> {
    vec![
        [cx - half, cy - half, z],
        [cx - half, cy + half, z],
        [cx + half, cy + half, z],
        [cx + half, cy - half, z],
    ]
}

// ── Name Tables ─────────────────────────────────────────────────────────────

/// Every name of every named element, primary first, in index order.
pub type NameTable = Vec<(IndexedName, Vec<String>)>;

pub fn name_table(shape: &TopoShape) -> NameTable {
    shape
        .element_map()
        .iter()
        .map(|(index, entries)| {
            (
                index,
                entries.iter().map(|e| e.name.as_str().to_string()).collect(),
            )
        })
        .collect()
}

/// Primary names, in index order.
pub fn primary_names(shape: &TopoShape) -> Vec<String> {
    shape
        .element_map()
        .iter()
        .filter_map(|(_, entries)| entries.first())
        .map(|e| e.name.as_str().to_string())
        .collect()
}

pub fn name_of(shape: &TopoShape, index: IndexedName) -> Option<String> {
    shape.element_name(index).map(MappedName::to_string)
}
