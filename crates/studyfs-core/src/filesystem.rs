//! Filesystem tree: typed navigation over the storage port.
//!
//! An [`AppFileSystem`] wraps one named root in a backend. Handles are cheap
//! clones carrying a point-in-time [`NodeInfo`] snapshot; re-resolve a handle
//! to observe renames or description changes made through another handle.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tracing::debug;

use studyfs_storage::{AppStorage, NodeGenesis, NodeId, NodeInfo, StorageError};

use crate::deps::DependencyBus;
use crate::error::AfsError;
use crate::path::{format_fs_path, NodePath, PathNode};
use crate::project::{ProjectCtx, ProjectFolder, ProjectNode};
use crate::registry::{
    FileTypeRegistry, FOLDER_PSEUDO_CLASS, PROJECT_FOLDER_PSEUDO_CLASS, PROJECT_PSEUDO_CLASS,
};

/// Name of the folder sitting directly under a project node, acting as the
/// root of the project tree.
pub(crate) const PROJECT_ROOT_NAME: &str = "root";

/// Shared state behind every handle of one filesystem.
pub(crate) struct FsInner {
    pub(crate) name: String,
    pub(crate) storage: Arc<dyn AppStorage>,
    pub(crate) root_id: NodeId,
    pub(crate) registry: FileTypeRegistry,
    pub(crate) bus: DependencyBus,
}

/// One named filesystem rooted in a storage backend.
#[derive(Clone)]
pub struct AppFileSystem {
    inner: Arc<FsInner>,
}

impl AppFileSystem {
    /// Opens (or creates) the filesystem `name` in `storage`, with the
    /// built-in pseudo-class registry.
    pub fn new(name: impl Into<String>, storage: Arc<dyn AppStorage>) -> Result<Self, AfsError> {
        Self::with_registry(name, storage, FileTypeRegistry::builtin())
    }

    pub fn with_registry(
        name: impl Into<String>,
        storage: Arc<dyn AppStorage>,
        registry: FileTypeRegistry,
    ) -> Result<Self, AfsError> {
        let name = name.into();
        let root_id = storage.create_root_node(&name, FOLDER_PSEUDO_CLASS)?;
        debug!(fs = %name, %root_id, "opened filesystem");
        Ok(Self {
            inner: Arc::new(FsInner {
                name,
                storage,
                root_id,
                registry,
                bus: DependencyBus::default(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn root(&self) -> Result<Folder, AfsError> {
        Ok(Folder(Node::from_id(self.inner.clone(), self.inner.root_id)?))
    }

    pub fn is_remote(&self) -> bool {
        self.inner.storage.is_remote()
    }

    pub fn flush(&self) -> Result<(), AfsError> {
        Ok(self.inner.storage.flush()?)
    }

    pub fn close(&self) {
        self.inner.storage.close();
    }
}

/// Kind of a filesystem-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    File,
    /// A project: a leaf of the filesystem tree holding its own node tree.
    Project,
}

/// Handle on a filesystem-tree node.
#[derive(Clone)]
pub struct Node {
    pub(crate) fs: Arc<FsInner>,
    pub(crate) info: NodeInfo,
    kind: NodeKind,
}

impl Node {
    pub(crate) fn from_id(fs: Arc<FsInner>, id: NodeId) -> Result<Self, AfsError> {
        let info = fs.storage.get_node_info(id)?;
        let kind = match info.pseudo_class.as_str() {
            FOLDER_PSEUDO_CLASS => NodeKind::Folder,
            PROJECT_PSEUDO_CLASS => NodeKind::Project,
            _ => NodeKind::File,
        };
        Ok(Self { fs, info, kind })
    }

    pub fn id(&self) -> NodeId {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn description(&self) -> &str {
        &self.info.description
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// True when the persisted node was written by a newer implementation
    /// than this build registers for its pseudo-class.
    pub fn is_ahead_of_version(&self) -> bool {
        self.fs
            .registry
            .code_version(&self.info.pseudo_class)
            .is_some_and(|code_version| self.info.version > code_version)
    }

    /// Parent folder, or `Ok(None)` for the filesystem root.
    pub fn parent(&self) -> Result<Option<Folder>, AfsError> {
        match self.fs.storage.get_parent_node(self.id())? {
            None => Ok(None),
            Some(parent_id) => {
                Ok(Node::from_id(self.fs.clone(), parent_id)?.into_folder())
            }
        }
    }

    /// Path rendered as `fsName:seg1/seg2`.
    pub fn path(&self) -> Result<String, AfsError> {
        let root_id = self.fs.root_id;
        let path = NodePath::find(self, |node| node.id() == root_id)?;
        Ok(path.format(|segments| format_fs_path(&self.fs.name, segments)))
    }

    pub fn into_folder(self) -> Option<Folder> {
        (self.kind == NodeKind::Folder).then(|| Folder(self))
    }

    pub fn into_project(self) -> Option<Project> {
        (self.kind == NodeKind::Project).then(|| Project(self))
    }

    pub fn set_description(&self, description: &str) -> Result<(), AfsError> {
        Ok(self.fs.storage.set_description(self.id(), description)?)
    }

    /// Renames the node, refusing to shadow an existing sibling.
    pub fn rename(&self, name: &str) -> Result<(), AfsError> {
        if let Some(parent) = self.parent()? {
            if parent.child(name)?.is_some() {
                return Err(AfsError::NameTaken(name.to_string()));
            }
        }
        Ok(self.fs.storage.rename_node(self.id(), name)?)
    }

    /// Re-parents the node under `folder`.
    pub fn move_to(&self, folder: &Folder) -> Result<(), AfsError> {
        if folder.child(self.name())?.is_some() {
            return Err(AfsError::NameTaken(self.name().to_string()));
        }
        Ok(self.fs.storage.set_parent_node(self.id(), folder.id())?)
    }

    pub fn is_writable(&self) -> Result<bool, AfsError> {
        Ok(self.fs.storage.is_writable(self.id())?)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.info.id)
            .field("name", &self.info.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl PathNode for Node {
    fn node_name(&self) -> &str {
        &self.info.name
    }

    fn path_parent(&self) -> Result<Option<Self>, AfsError> {
        Ok(self.parent()?.map(|folder| folder.0))
    }
}

/// Handle on a filesystem folder.
#[derive(Debug, Clone)]
pub struct Folder(pub(crate) Node);

impl Deref for Folder {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0
    }
}

impl Folder {
    /// Resolves one child by name. Absence is `Ok(None)`.
    pub fn child(&self, name: &str) -> Result<Option<Node>, AfsError> {
        match self.fs.storage.get_child_node(self.id(), name)? {
            None => Ok(None),
            Some(id) => Ok(Some(Node::from_id(self.fs.clone(), id)?)),
        }
    }

    /// Resolves a chain of segments through repeated single-level lookups.
    /// Any unresolved or non-folder intermediate segment yields `Ok(None)`.
    pub fn child_path<'a, I>(&self, segments: I) -> Result<Option<Node>, AfsError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut current = self.clone();
        let mut resolved: Option<Node> = None;
        for segment in segments {
            if let Some(node) = resolved.take() {
                match node.into_folder() {
                    Some(folder) => current = folder,
                    None => return Ok(None),
                }
            }
            match current.child(segment)? {
                Some(node) => resolved = Some(node),
                None => return Ok(None),
            }
        }
        Ok(resolved)
    }

    /// All children, name-sorted for deterministic listing.
    pub fn children(&self) -> Result<Vec<Node>, AfsError> {
        let mut children = self
            .fs
            .storage
            .get_child_nodes(self.id())?
            .into_iter()
            .map(|id| Node::from_id(self.fs.clone(), id))
            .collect::<Result<Vec<_>, _>>()?;
        children.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(children)
    }

    /// Creates a child folder. Unlike the project tree, this always issues a
    /// create call; an existing child of that name is a backend error, not a
    /// value to return.
    pub fn create_folder(&self, name: &str) -> Result<Folder, AfsError> {
        let genesis = NodeGenesis::new(name, FOLDER_PSEUDO_CLASS);
        let id = self.fs.storage.create_node(self.id(), &genesis)?;
        debug!(%id, name, "created folder");
        Ok(Folder(Node::from_id(self.fs.clone(), id)?))
    }

    /// Creates a project node together with its own root folder one level
    /// below it.
    pub fn create_project(&self, name: &str, description: &str) -> Result<Project, AfsError> {
        let genesis = NodeGenesis::new(name, PROJECT_PSEUDO_CLASS).description(description);
        let id = self.fs.storage.create_node(self.id(), &genesis)?;
        self.fs.storage.create_node(
            id,
            &NodeGenesis::new(PROJECT_ROOT_NAME, PROJECT_FOLDER_PSEUDO_CLASS),
        )?;
        debug!(%id, name, "created project");
        Ok(Project(Node::from_id(self.fs.clone(), id)?))
    }
}

/// Handle on a project: a filesystem leaf holding an independent node tree.
#[derive(Debug, Clone)]
pub struct Project(pub(crate) Node);

impl Deref for Project {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0
    }
}

impl Project {
    /// Root folder of the project tree (one level below the project node).
    pub fn root_folder(&self) -> Result<ProjectFolder, AfsError> {
        let node = &self.0;
        let root_id = node
            .fs
            .storage
            .get_child_node(node.id(), PROJECT_ROOT_NAME)?
            .ok_or_else(|| {
                StorageError::Backend(format!("project {} has no root folder", node.id()))
            })?;
        let ctx = Arc::new(ProjectCtx {
            fs: node.fs.clone(),
            project_id: node.id(),
            root_id,
        });
        ProjectNode::from_id(ctx, root_id)?.into_folder().ok_or_else(|| {
            StorageError::Backend(format!("project {} root is not a folder", node.id())).into()
        })
    }
}
