use naming_types::IndexedName;

/// Errors while loading a persisted element-map block.
///
/// A version mismatch is not among them: it is reported as
/// [`LoadOutcome::RecomputeNeeded`](crate::LoadOutcome::RecomputeNeeded).
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    #[error("failed to parse element map block: {0}")]
    ParseError(String),

    #[error("unknown block format: {0}")]
    UnknownFormat(String),

    #[error("block format version {file_version} is newer than supported version {supported_version}")]
    FutureVersion {
        file_version: u32,
        supported_version: u32,
    },

    #[error("corrupt record for {index}: {reason}")]
    CorruptRecord { index: IndexedName, reason: String },
}

/// Errors while saving an element-map block.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SaveError {
    #[error("failed to serialize element map block: {0}")]
    Serialize(String),
}
