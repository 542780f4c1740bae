use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Utc;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::StorageError;
use crate::port::AppStorage;
use crate::types::{DependencyInfo, NodeGenesis, NodeId, NodeInfo};

/// In-memory reference backend.
///
/// Holds the whole forest behind one `RwLock`. This is the backend used by
/// the test suites and the smallest possible model of the port semantics:
/// child names are unique per parent, deleting a node drops its subtree but
/// leaves other nodes' dependency edges dangling, and `close` makes every
/// subsequent call fail with [`StorageError::Closed`].
pub struct MemStorage {
    state: RwLock<MemState>,
}

struct MemState {
    nodes: HashMap<NodeId, StoredNode>,
    roots: HashMap<String, NodeId>,
    closed: bool,
    writable: bool,
}

struct StoredNode {
    info: NodeInfo,
    parent: Option<NodeId>,
    children: BTreeMap<String, NodeId>,
    attributes: BTreeMap<String, String>,
    dependencies: Vec<DependencyInfo>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemState {
                nodes: HashMap::new(),
                roots: HashMap::new(),
                closed: false,
                writable: true,
            }),
        }
    }

    /// Toggles writability, for tests exercising read-only filesystems.
    pub fn set_writable(&self, writable: bool) {
        self.state.write().writable = writable;
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemState {
    fn check_open(&self) -> Result<(), StorageError> {
        if self.closed {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    fn node(&self, id: NodeId) -> Result<&StoredNode, StorageError> {
        self.nodes.get(&id).ok_or(StorageError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut StoredNode, StorageError> {
        self.nodes
            .get_mut(&id)
            .ok_or(StorageError::NodeNotFound(id))
    }

    fn touch(&mut self, id: NodeId) -> Result<(), StorageError> {
        self.node_mut(id)?.info.modified = Utc::now();
        Ok(())
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children.values() {
                self.remove_subtree(*child);
            }
        }
    }
}

impl AppStorage for MemStorage {
    fn create_root_node(&self, fs_name: &str, pseudo_class: &str) -> Result<NodeId, StorageError> {
        let mut state = self.state.write();
        state.check_open()?;
        if let Some(id) = state.roots.get(fs_name) {
            return Ok(*id);
        }
        let id = NodeId::new();
        let now = Utc::now();
        state.nodes.insert(
            id,
            StoredNode {
                info: NodeInfo {
                    id,
                    name: fs_name.to_string(),
                    pseudo_class: pseudo_class.to_string(),
                    description: String::new(),
                    created: now,
                    modified: now,
                    version: 0,
                },
                parent: None,
                children: BTreeMap::new(),
                attributes: BTreeMap::new(),
                dependencies: Vec::new(),
            },
        );
        state.roots.insert(fs_name.to_string(), id);
        trace!(%id, fs_name, "created root node");
        Ok(id)
    }

    fn create_node(&self, parent: NodeId, genesis: &NodeGenesis) -> Result<NodeId, StorageError> {
        let mut state = self.state.write();
        state.check_open()?;
        if state.node(parent)?.children.contains_key(&genesis.name) {
            return Err(StorageError::NameTaken {
                parent,
                name: genesis.name.clone(),
            });
        }
        for dep in &genesis.dependencies {
            state.node(dep.target)?;
        }
        let id = NodeId::new();
        let now = Utc::now();
        state.nodes.insert(
            id,
            StoredNode {
                info: NodeInfo {
                    id,
                    name: genesis.name.clone(),
                    pseudo_class: genesis.pseudo_class.clone(),
                    description: genesis.description.clone(),
                    created: now,
                    modified: now,
                    version: genesis.version,
                },
                parent: Some(parent),
                children: BTreeMap::new(),
                attributes: genesis.attributes.clone(),
                dependencies: genesis.dependencies.clone(),
            },
        );
        state
            .node_mut(parent)?
            .children
            .insert(genesis.name.clone(), id);
        trace!(%id, %parent, name = %genesis.name, pseudo_class = %genesis.pseudo_class, "created node");
        Ok(id)
    }

    fn get_node_info(&self, id: NodeId) -> Result<NodeInfo, StorageError> {
        let state = self.state.read();
        state.check_open()?;
        Ok(state.node(id)?.info.clone())
    }

    fn get_child_node(&self, parent: NodeId, name: &str) -> Result<Option<NodeId>, StorageError> {
        let state = self.state.read();
        state.check_open()?;
        Ok(state.node(parent)?.children.get(name).copied())
    }

    fn get_child_nodes(&self, parent: NodeId) -> Result<Vec<NodeId>, StorageError> {
        let state = self.state.read();
        state.check_open()?;
        Ok(state.node(parent)?.children.values().copied().collect())
    }

    fn get_parent_node(&self, id: NodeId) -> Result<Option<NodeId>, StorageError> {
        let state = self.state.read();
        state.check_open()?;
        Ok(state.node(id)?.parent)
    }

    fn set_parent_node(&self, id: NodeId, new_parent: NodeId) -> Result<(), StorageError> {
        let mut state = self.state.write();
        state.check_open()?;
        let name = state.node(id)?.info.name.clone();
        state.node(new_parent)?;
        if state.node(new_parent)?.children.contains_key(&name) {
            return Err(StorageError::NameTaken {
                parent: new_parent,
                name,
            });
        }
        if let Some(old_parent) = state.node(id)?.parent {
            state.node_mut(old_parent)?.children.remove(&name);
        }
        state.node_mut(new_parent)?.children.insert(name, id);
        state.node_mut(id)?.parent = Some(new_parent);
        state.touch(id)
    }

    fn delete_node(&self, id: NodeId) -> Result<(), StorageError> {
        let mut state = self.state.write();
        state.check_open()?;
        let node = state.node(id)?;
        let parent = node.parent;
        let name = node.info.name.clone();
        if let Some(parent) = parent {
            state.node_mut(parent)?.children.remove(&name);
        }
        state.roots.retain(|_, root| *root != id);
        // Dependency edges from other nodes pointing into the deleted subtree
        // are left dangling on purpose; resolving them later fails with
        // NodeNotFound. Invalidation must therefore run before the delete.
        state.remove_subtree(id);
        trace!(%id, "deleted node");
        Ok(())
    }

    fn rename_node(&self, id: NodeId, name: &str) -> Result<(), StorageError> {
        let mut state = self.state.write();
        state.check_open()?;
        let node = state.node(id)?;
        let old_name = node.info.name.clone();
        if let Some(parent) = node.parent {
            if state.node(parent)?.children.contains_key(name) {
                return Err(StorageError::NameTaken {
                    parent,
                    name: name.to_string(),
                });
            }
            state.node_mut(parent)?.children.remove(&old_name);
            state
                .node_mut(parent)?
                .children
                .insert(name.to_string(), id);
        }
        state.node_mut(id)?.info.name = name.to_string();
        state.touch(id)
    }

    fn set_description(&self, id: NodeId, description: &str) -> Result<(), StorageError> {
        let mut state = self.state.write();
        state.check_open()?;
        state.node_mut(id)?.info.description = description.to_string();
        state.touch(id)
    }

    fn set_string_attribute(
        &self,
        id: NodeId,
        key: &str,
        value: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write();
        state.check_open()?;
        state
            .node_mut(id)?
            .attributes
            .insert(key.to_string(), value.to_string());
        state.touch(id)
    }

    fn get_string_attribute(&self, id: NodeId, key: &str) -> Result<Option<String>, StorageError> {
        let state = self.state.read();
        state.check_open()?;
        Ok(state.node(id)?.attributes.get(key).cloned())
    }

    fn get_dependencies_info(&self, id: NodeId) -> Result<Vec<DependencyInfo>, StorageError> {
        let state = self.state.read();
        state.check_open()?;
        Ok(state.node(id)?.dependencies.clone())
    }

    fn get_dependencies(&self, id: NodeId, name: &str) -> Result<Vec<NodeId>, StorageError> {
        let state = self.state.read();
        state.check_open()?;
        Ok(state
            .node(id)?
            .dependencies
            .iter()
            .filter(|dep| dep.name == name)
            .map(|dep| dep.target)
            .collect())
    }

    fn get_backward_dependencies(&self, id: NodeId) -> Result<Vec<NodeId>, StorageError> {
        let state = self.state.read();
        state.check_open()?;
        state.node(id)?;
        let sources: BTreeSet<NodeId> = state
            .nodes
            .values()
            .filter(|node| node.dependencies.iter().any(|dep| dep.target == id))
            .map(|node| node.info.id)
            .collect();
        Ok(sources.into_iter().collect())
    }

    fn set_dependencies(
        &self,
        id: NodeId,
        name: &str,
        targets: &[NodeId],
    ) -> Result<(), StorageError> {
        let mut state = self.state.write();
        state.check_open()?;
        for target in targets {
            state.node(*target)?;
        }
        let node = state.node_mut(id)?;
        node.dependencies.retain(|dep| dep.name != name);
        node.dependencies
            .extend(targets.iter().map(|target| DependencyInfo::new(name, *target)));
        state.touch(id)
    }

    fn remove_dependencies(&self, id: NodeId, name: &str) -> Result<(), StorageError> {
        let mut state = self.state.write();
        state.check_open()?;
        state
            .node_mut(id)?
            .dependencies
            .retain(|dep| dep.name != name);
        state.touch(id)
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.state.read().check_open()
    }

    fn is_writable(&self, id: NodeId) -> Result<bool, StorageError> {
        let state = self.state.read();
        state.check_open()?;
        state.node(id)?;
        Ok(state.writable)
    }

    fn is_remote(&self) -> bool {
        false
    }

    fn close(&self) {
        self.state.write().closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn folder(name: &str) -> NodeGenesis {
        NodeGenesis::new(name, "folder")
    }

    #[test]
    fn root_node_is_created_once() {
        let storage = MemStorage::new();
        let a = storage.create_root_node("fs", "folder").unwrap();
        let b = storage.create_root_node("fs", "folder").unwrap();
        assert_eq!(a, b);
        assert_eq!(storage.get_parent_node(a).unwrap(), None);
    }

    #[test]
    fn child_names_are_unique_per_parent() {
        let storage = MemStorage::new();
        let root = storage.create_root_node("fs", "folder").unwrap();
        storage.create_node(root, &folder("a")).unwrap();
        let err = storage.create_node(root, &folder("a")).unwrap_err();
        assert!(matches!(err, StorageError::NameTaken { .. }));
    }

    #[test]
    fn navigation_absence_is_none() {
        let storage = MemStorage::new();
        let root = storage.create_root_node("fs", "folder").unwrap();
        assert_eq!(storage.get_child_node(root, "missing").unwrap(), None);
    }

    #[test]
    fn delete_removes_subtree_and_leaves_edges_dangling() {
        let storage = MemStorage::new();
        let root = storage.create_root_node("fs", "folder").unwrap();
        let a = storage.create_node(root, &folder("a")).unwrap();
        let b = storage.create_node(a, &folder("b")).unwrap();
        let other = storage.create_node(root, &folder("other")).unwrap();
        storage.set_dependencies(other, "dep", &[b]).unwrap();

        storage.delete_node(a).unwrap();

        assert!(matches!(
            storage.get_node_info(b),
            Err(StorageError::NodeNotFound(_))
        ));
        // The edge survives, resolution of its target does not.
        assert_eq!(storage.get_dependencies(other, "dep").unwrap(), vec![b]);
    }

    #[test]
    fn set_dependencies_replaces_exact_name_only() {
        let storage = MemStorage::new();
        let root = storage.create_root_node("fs", "folder").unwrap();
        let src = storage.create_node(root, &folder("src")).unwrap();
        let t1 = storage.create_node(root, &folder("t1")).unwrap();
        let t2 = storage.create_node(root, &folder("t2")).unwrap();
        storage.set_dependencies(src, "x_0", &[t1]).unwrap();
        storage.set_dependencies(src, "x_1", &[t2]).unwrap();
        storage.set_dependencies(src, "x_0", &[t2]).unwrap();

        assert_eq!(storage.get_dependencies(src, "x_0").unwrap(), vec![t2]);
        assert_eq!(storage.get_dependencies(src, "x_1").unwrap(), vec![t2]);
        assert_eq!(storage.get_backward_dependencies(t2).unwrap(), vec![src]);
        assert_eq!(storage.get_backward_dependencies(t1).unwrap(), vec![]);
    }

    #[test]
    fn attributes_and_genesis_dependencies() {
        let storage = MemStorage::new();
        let root = storage.create_root_node("fs", "folder").unwrap();
        let target = storage.create_node(root, &folder("target")).unwrap();
        let node = storage
            .create_node(
                root,
                &NodeGenesis::new("case", "importedCase")
                    .attribute("format", "XIIDM")
                    .dependency("network", target),
            )
            .unwrap();

        assert_eq!(
            storage.get_string_attribute(node, "format").unwrap().as_deref(),
            Some("XIIDM")
        );
        assert_eq!(storage.get_string_attribute(node, "missing").unwrap(), None);
        storage.set_string_attribute(node, "format", "CGMES").unwrap();
        assert_eq!(
            storage.get_string_attribute(node, "format").unwrap().as_deref(),
            Some("CGMES")
        );

        assert_eq!(storage.get_dependencies(node, "network").unwrap(), vec![target]);
        // A genesis pointing at an unknown target is rejected up front.
        let err = storage
            .create_node(
                root,
                &NodeGenesis::new("broken", "importedCase").dependency("network", NodeId::new()),
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::NodeNotFound(_)));
    }

    #[test]
    fn closed_storage_rejects_calls() {
        let storage = MemStorage::new();
        let root = storage.create_root_node("fs", "folder").unwrap();
        storage.close();
        assert_eq!(storage.get_node_info(root), Err(StorageError::Closed));
        assert_eq!(storage.flush(), Err(StorageError::Closed));
    }

    #[test]
    fn writability_flag() {
        let storage = MemStorage::new();
        let root = storage.create_root_node("fs", "folder").unwrap();
        assert!(storage.is_writable(root).unwrap());
        storage.set_writable(false);
        assert!(!storage.is_writable(root).unwrap());
        assert!(!storage.is_remote());
    }
}
