use crate::error::StorageError;
use crate::types::{DependencyInfo, NodeGenesis, NodeId, NodeInfo};

/// The storage port consumed by the node tree.
///
/// A backend stores nodes with parent/child edges, string attributes and flat
/// named dependencies. Dependency names are opaque to the backend: an ordered
/// list layered on top of this port is encoded by the caller as several
/// independently named edges.
///
/// Implementations must be thread-safe; the core calls into the port from
/// whatever thread holds a node handle and never wraps calls in its own lock
/// (except the in-memory mutex of its dependency caches).
pub trait AppStorage: Send + Sync {
    /// Returns the root node id for the named filesystem, creating it with
    /// the given pseudo-class if it does not exist yet.
    fn create_root_node(&self, fs_name: &str, pseudo_class: &str) -> Result<NodeId, StorageError>;

    /// Creates a child node under `parent` and returns its id.
    fn create_node(&self, parent: NodeId, genesis: &NodeGenesis) -> Result<NodeId, StorageError>;

    fn get_node_info(&self, id: NodeId) -> Result<NodeInfo, StorageError>;

    /// Resolves a child by name. Absence is `Ok(None)`.
    fn get_child_node(&self, parent: NodeId, name: &str) -> Result<Option<NodeId>, StorageError>;

    fn get_child_nodes(&self, parent: NodeId) -> Result<Vec<NodeId>, StorageError>;

    /// Resolves the parent. A root node yields `Ok(None)`.
    fn get_parent_node(&self, id: NodeId) -> Result<Option<NodeId>, StorageError>;

    fn set_parent_node(&self, id: NodeId, new_parent: NodeId) -> Result<(), StorageError>;

    /// Removes the node and its subtree edges. The caller is responsible for
    /// running any invalidation logic *before* issuing the delete.
    fn delete_node(&self, id: NodeId) -> Result<(), StorageError>;

    fn rename_node(&self, id: NodeId, name: &str) -> Result<(), StorageError>;

    fn set_description(&self, id: NodeId, description: &str) -> Result<(), StorageError>;

    fn set_string_attribute(&self, id: NodeId, key: &str, value: &str)
        -> Result<(), StorageError>;

    fn get_string_attribute(&self, id: NodeId, key: &str)
        -> Result<Option<String>, StorageError>;

    /// All named dependency edges going out of `id`.
    fn get_dependencies_info(&self, id: NodeId) -> Result<Vec<DependencyInfo>, StorageError>;

    /// Targets of the edges named exactly `name`.
    fn get_dependencies(&self, id: NodeId, name: &str) -> Result<Vec<NodeId>, StorageError>;

    /// Sources of every dependency edge pointing at `id`.
    fn get_backward_dependencies(&self, id: NodeId) -> Result<Vec<NodeId>, StorageError>;

    /// Replaces all edges named exactly `name` with edges to `targets`.
    fn set_dependencies(
        &self,
        id: NodeId,
        name: &str,
        targets: &[NodeId],
    ) -> Result<(), StorageError>;

    /// Removes all edges named exactly `name`.
    fn remove_dependencies(&self, id: NodeId, name: &str) -> Result<(), StorageError>;

    fn flush(&self) -> Result<(), StorageError>;

    fn is_writable(&self, id: NodeId) -> Result<bool, StorageError>;

    /// Whether this backend lives in another process or host.
    fn is_remote(&self) -> bool;

    fn close(&self);
}
