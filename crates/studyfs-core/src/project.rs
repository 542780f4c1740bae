//! Project tree: nodes living under a project's own root folder.
//!
//! Project files may depend on other project nodes through named edges; the
//! dependency caches in [`crate::deps`] subscribe to the change notifications
//! published here. Deleting a node runs the invalidation cascade over its
//! backward dependents *before* the storage delete, so invalidation code can
//! still resolve the doomed node.

use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tracing::debug;

use studyfs_storage::{NodeGenesis, NodeId, NodeInfo, StorageError};

use crate::deps::{DependencyBus, DependencyListener};
use crate::error::AfsError;
use crate::filesystem::FsInner;
use crate::path::{format_project_path, NodePath, PathNode};
use crate::registry::PROJECT_FOLDER_PSEUDO_CLASS;

/// Shared state behind every handle of one project tree.
pub(crate) struct ProjectCtx {
    pub(crate) fs: Arc<FsInner>,
    pub(crate) project_id: NodeId,
    pub(crate) root_id: NodeId,
}

/// Kind of a project-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectNodeKind {
    Folder,
    File,
}

/// Handle on a project-tree node.
#[derive(Clone)]
pub struct ProjectNode {
    pub(crate) ctx: Arc<ProjectCtx>,
    pub(crate) info: NodeInfo,
    kind: ProjectNodeKind,
}

impl ProjectNode {
    pub(crate) fn from_id(ctx: Arc<ProjectCtx>, id: NodeId) -> Result<Self, AfsError> {
        let info = ctx.fs.storage.get_node_info(id)?;
        let kind = if info.pseudo_class == PROJECT_FOLDER_PSEUDO_CLASS {
            ProjectNodeKind::Folder
        } else {
            ProjectNodeKind::File
        };
        Ok(Self { ctx, info, kind })
    }

    pub(crate) fn bus(&self) -> &DependencyBus {
        &self.ctx.fs.bus
    }

    pub fn id(&self) -> NodeId {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn pseudo_class(&self) -> &str {
        &self.info.pseudo_class
    }

    pub fn kind(&self) -> ProjectNodeKind {
        self.kind
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ProjectNodeKind::Folder
    }

    /// Id of the project this node belongs to.
    pub fn project_id(&self) -> NodeId {
        self.ctx.project_id
    }

    pub fn is_root_folder(&self) -> bool {
        self.info.id == self.ctx.root_id
    }

    /// True when the persisted node was written by a newer implementation
    /// than this build registers for its pseudo-class.
    pub fn is_ahead_of_version(&self) -> bool {
        self.ctx
            .fs
            .registry
            .code_version(&self.info.pseudo_class)
            .is_some_and(|code_version| self.info.version > code_version)
    }

    /// Parent folder, or `Ok(None)` for the project root folder.
    pub fn parent(&self) -> Result<Option<ProjectFolder>, AfsError> {
        if self.is_root_folder() {
            return Ok(None);
        }
        match self.ctx.fs.storage.get_parent_node(self.id())? {
            None => Ok(None),
            Some(parent_id) => {
                Ok(ProjectNode::from_id(self.ctx.clone(), parent_id)?.into_folder())
            }
        }
    }

    /// Path rendered as `seg1/seg2`, relative to the project root (the
    /// project's own name does not appear).
    pub fn path(&self) -> Result<String, AfsError> {
        let root_id = self.ctx.root_id;
        let path = NodePath::find(self, |node| node.id() == root_id)?;
        Ok(path.format(format_project_path))
    }

    pub fn into_folder(self) -> Option<ProjectFolder> {
        (self.kind == ProjectNodeKind::Folder).then(|| ProjectFolder(self))
    }

    pub fn into_file(self) -> Option<ProjectFile> {
        (self.kind == ProjectNodeKind::File).then(|| ProjectFile(self))
    }

    pub fn set_description(&self, description: &str) -> Result<(), AfsError> {
        Ok(self.ctx.fs.storage.set_description(self.id(), description)?)
    }

    /// Renames the node, refusing to shadow an existing sibling.
    pub fn rename(&self, name: &str) -> Result<(), AfsError> {
        if let Some(parent) = self.parent()? {
            if parent.child(name)?.is_some() {
                return Err(AfsError::NameTaken(name.to_string()));
            }
        }
        Ok(self.ctx.fs.storage.rename_node(self.id(), name)?)
    }

    /// Re-parents the node under `folder`.
    pub fn move_to(&self, folder: &ProjectFolder) -> Result<(), AfsError> {
        if folder.child(self.name())?.is_some() {
            return Err(AfsError::NameTaken(self.name().to_string()));
        }
        Ok(self.ctx.fs.storage.set_parent_node(self.id(), folder.id())?)
    }

    /// Registers a dependency-change listener for this node. Only a weak
    /// reference is kept; the caller owns the listener's lifetime.
    pub fn add_dependency_listener(&self, listener: &Arc<dyn DependencyListener>) {
        self.bus().subscribe(self.id(), Arc::downgrade(listener));
    }

    /// Sources of every dependency edge pointing at this node.
    pub fn backward_dependencies(&self) -> Result<Vec<ProjectFile>, AfsError> {
        self.ctx
            .fs
            .storage
            .get_backward_dependencies(self.id())?
            .into_iter()
            .map(|id| ProjectNode::from_id(self.ctx.clone(), id))
            .filter_map(|node| match node {
                Ok(node) => node.into_file().map(Ok),
                Err(err) => Some(Err(err)),
            })
            .collect()
    }

    /// Marks every transitive backward dependent of this node stale by
    /// publishing dependency-changed notifications to their listeners.
    pub fn invalidate(&self) -> Result<(), AfsError> {
        let mut visited = HashSet::new();
        visited.insert(self.id());
        self.invalidate_dependents(&mut visited)
    }

    fn invalidate_dependents(&self, visited: &mut HashSet<NodeId>) -> Result<(), AfsError> {
        for source_id in self.ctx.fs.storage.get_backward_dependencies(self.id())? {
            if !visited.insert(source_id) {
                continue;
            }
            let dependent = ProjectNode::from_id(self.ctx.clone(), source_id)?;
            // Name hints: every outgoing edge of the dependent. Caches do not
            // filter on the hint, so this is deliberately coarse.
            for dep in self.ctx.fs.storage.get_dependencies_info(source_id)? {
                self.bus().dependency_changed(source_id, &dep.name);
            }
            dependent.invalidate_dependents(visited)?;
        }
        Ok(())
    }

    /// Deletes this node. Every transitive backward dependent is invalidated
    /// first, while this node is still resolvable; only then is the storage
    /// record removed.
    pub fn delete(self) -> Result<(), AfsError> {
        let forward = self.ctx.fs.storage.get_dependencies_info(self.id())?;
        self.invalidate()?;
        self.ctx.fs.storage.delete_node(self.id())?;
        for dep in forward {
            self.bus().backward_dependency_changed(dep.target, &dep.name);
        }
        debug!(id = %self.id(), name = %self.name(), "deleted project node");
        Ok(())
    }
}

impl fmt::Debug for ProjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectNode")
            .field("id", &self.info.id)
            .field("name", &self.info.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl PathNode for ProjectNode {
    fn node_name(&self) -> &str {
        &self.info.name
    }

    fn path_parent(&self) -> Result<Option<Self>, AfsError> {
        Ok(self.parent()?.map(|folder| folder.0))
    }
}

/// Handle on a project folder.
#[derive(Debug, Clone)]
pub struct ProjectFolder(pub(crate) ProjectNode);

impl Deref for ProjectFolder {
    type Target = ProjectNode;

    fn deref(&self) -> &ProjectNode {
        &self.0
    }
}

impl ProjectFolder {
    /// Resolves one child by name. Absence is `Ok(None)`.
    pub fn child(&self, name: &str) -> Result<Option<ProjectNode>, AfsError> {
        match self.ctx.fs.storage.get_child_node(self.id(), name)? {
            None => Ok(None),
            Some(id) => Ok(Some(ProjectNode::from_id(self.ctx.clone(), id)?)),
        }
    }

    /// Resolves a chain of segments through repeated single-level lookups.
    /// Any unresolved or non-folder intermediate segment yields `Ok(None)`.
    pub fn child_path<'a, I>(&self, segments: I) -> Result<Option<ProjectNode>, AfsError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut current = self.clone();
        let mut resolved: Option<ProjectNode> = None;
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
    pub fn children(&self) -> Result<Vec<ProjectNode>, AfsError> {
        let mut children = self
            .ctx
            .fs
            .storage
            .get_child_nodes(self.id())?
            .into_iter()
            .map(|id| ProjectNode::from_id(self.ctx.clone(), id))
            .collect::<Result<Vec<_>, _>>()?;
        children.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(children)
    }

    /// Returns the existing child folder of that name if present, creating
    /// one otherwise. Note the asymmetry with the filesystem tree, where
    /// `create_folder` always issues a create call.
    pub fn create_folder(&self, name: &str) -> Result<ProjectFolder, AfsError> {
        if let Some(existing) = self.child(name)? {
            return existing
                .into_folder()
                .ok_or_else(|| AfsError::NameTaken(name.to_string()));
        }
        let genesis = NodeGenesis::new(name, PROJECT_FOLDER_PSEUDO_CLASS);
        let id = self.ctx.fs.storage.create_node(self.id(), &genesis)?;
        debug!(%id, name, "created project folder");
        Ok(ProjectFolder(ProjectNode::from_id(self.ctx.clone(), id)?))
    }

    /// Creates a leaf file from a genesis description (pseudo-class, version,
    /// attributes and initial dependencies).
    pub fn create_file(&self, genesis: &NodeGenesis) -> Result<ProjectFile, AfsError> {
        if genesis.pseudo_class == PROJECT_FOLDER_PSEUDO_CLASS {
            return Err(
                StorageError::Backend("folders are created through create_folder".into()).into(),
            );
        }
        let id = self.ctx.fs.storage.create_node(self.id(), genesis)?;
        debug!(%id, name = %genesis.name, pseudo_class = %genesis.pseudo_class, "created project file");
        Ok(ProjectFile(ProjectNode::from_id(self.ctx.clone(), id)?))
    }
}

/// Handle on a project file: the only node kind that owns dependencies.
#[derive(Debug, Clone)]
pub struct ProjectFile(pub(crate) ProjectNode);

impl Deref for ProjectFile {
    type Target = ProjectNode;

    fn deref(&self) -> &ProjectNode {
        &self.0
    }
}

impl ProjectFile {
    pub fn as_node(&self) -> &ProjectNode {
        &self.0
    }

    pub fn into_node(self) -> ProjectNode {
        self.0
    }

    /// Replaces the single dependency named `name` with an edge to `target`.
    pub fn set_dependency(&self, name: &str, target: &ProjectNode) -> Result<(), AfsError> {
        self.ctx
            .fs
            .storage
            .set_dependencies(self.id(), name, &[target.id()])?;
        self.bus().dependency_changed(self.id(), name);
        self.bus().backward_dependency_changed(target.id(), name);
        Ok(())
    }

    /// Removes every edge named exactly `name`.
    pub fn remove_dependency(&self, name: &str) -> Result<(), AfsError> {
        let targets = self.ctx.fs.storage.get_dependencies(self.id(), name)?;
        self.ctx.fs.storage.remove_dependencies(self.id(), name)?;
        self.bus().dependency_changed(self.id(), name);
        for target in targets {
            self.bus().backward_dependency_changed(target, name);
        }
        Ok(())
    }

    /// Targets of the edges named exactly `name`.
    pub fn dependency(&self, name: &str) -> Result<Vec<ProjectNode>, AfsError> {
        self.ctx
            .fs
            .storage
            .get_dependencies(self.id(), name)?
            .into_iter()
            .map(|id| ProjectNode::from_id(self.ctx.clone(), id))
            .collect()
    }

    /// All outgoing edges, with their resolved targets.
    pub fn dependencies(&self) -> Result<Vec<(String, ProjectNode)>, AfsError> {
        self.ctx
            .fs
            .storage
            .get_dependencies_info(self.id())?
            .into_iter()
            .map(|dep| {
                ProjectNode::from_id(self.ctx.clone(), dep.target).map(|node| (dep.name, node))
            })
            .collect()
    }
}
