use scene_types::{ElementId, SceneId, TypeError};

/// Errors from element store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested element was not found.
    #[error("element not found: {0}")]
    ElementNotFound(ElementId),

    /// The requested scene was not found.
    #[error("scene not found: {0}")]
    SceneNotFound(SceneId),

    /// An element with this id already exists.
    #[error("element already exists: {0}")]
    AlreadyExists(ElementId),

    /// Compare-and-swap failed: the stored version moved on.
    #[error("element was modified by another process: {id} (expected version {expected}, found {actual})")]
    VersionConflict {
        id: ElementId,
        expected: u64,
        actual: u64,
    },

    /// The request is malformed or violates a store invariant.
    #[error("invalid element: {0}")]
    Invalid(String),

    /// Content could not be hashed or encoded.
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// Storage backend is unavailable (lock poisoned, connection lost).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns `true` for optimistic-concurrency failures.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. } | Self::AlreadyExists(_))
    }

    /// Returns `true` when the addressed row or scene does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ElementNotFound(_) | Self::SceneNotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
