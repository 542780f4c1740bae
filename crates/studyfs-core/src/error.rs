use studyfs_storage::StorageError;

/// Errors surfaced by the node tree and dependency layer.
///
/// Navigation misses never land here; they are `Ok(None)`. Backend failures
/// pass through unchanged via [`AfsError::Storage`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AfsError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Ordered-dependency index outside the current list.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A sibling with the requested name already exists.
    #[error("a sibling named {0:?} already exists")]
    NameTaken(String),
}
