use crate::types::NodeId;

/// Errors reported by a storage backend.
///
/// Navigation misses are *not* errors: `get_child_node` and friends return
/// `Ok(None)` for absence. An error here means the backend itself failed or
/// was asked to operate on a node it does not hold.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The referenced node does not exist in this backend.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// The parent already has a child with the requested name.
    #[error("node {parent} already has a child named {name:?}")]
    NameTaken { parent: NodeId, name: String },

    /// The storage has been closed; no further calls are possible.
    #[error("storage is closed")]
    Closed,

    /// Opaque backend failure (I/O, remote transport, ...).
    #[error("storage backend failure: {0}")]
    Backend(String),
}
