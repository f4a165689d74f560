use std::fmt;

use naming_types::HistoryError;

/// Which shape of an operation was null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeRole {
    Output,
    /// Input at `position` in the operation's input list.
    Input { position: usize },
}

impl fmt::Display for ShapeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeRole::Output => f.write_str("output"),
            ShapeRole::Input { position } => write!(f, "input {position}"),
        }
    }
}

/// Non-fatal diagnostics collected while naming.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// Warning messages.
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn extend(&mut self, warnings: Vec<String>) {
        self.warnings.extend(warnings);
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Outcome of one element map build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Elements of the output that received at least one name.
    pub named: usize,
    /// Elements left with only their indexed name.
    pub unnamed: usize,
    /// Naming passes run, the correspondence pass included.
    pub passes: usize,
    pub diagnostics: Diagnostics,
}

/// Errors from naming operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NamingError {
    #[error("{role} shape is null")]
    NullShape { role: ShapeRole },

    #[error("name nesting exceeds depth limit {limit}: {chain}")]
    DepthExceeded { limit: usize, chain: String },

    #[error("invalid op code {op:?}: {reason}")]
    InvalidOpCode { op: String, reason: String },

    #[error("history error: {0}")]
    History(#[from] HistoryError),
}
