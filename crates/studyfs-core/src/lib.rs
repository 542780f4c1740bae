//! studyfs core: a hierarchical metadata store for engineering-study
//! artifacts over a pluggable storage backend.
//!
//! Two parallel trees live in one backend: a filesystem tree of folders,
//! files and projects, and — inside each project — an independent project
//! tree rooted at the project's own root folder. Project files carry named
//! dependency edges to other project nodes; this crate layers cached scalar
//! lookups ([`DependencyCache`]) and ordered lists
//! ([`OrderedDependencyManager`]) over that flat primitive and owns the
//! invalidation cascade that runs before a node is deleted.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use studyfs_core::AppFileSystem;
//! use studyfs_storage::MemStorage;
//!
//! let fs = AppFileSystem::new("work", Arc::new(MemStorage::new()))?;
//! let folder = fs.root()?.create_folder("studies")?;
//! let project = folder.create_project("lf-2026", "load flow study")?;
//! assert_eq!(project.path()?, "work:studies/lf-2026");
//! # Ok::<(), studyfs_core::AfsError>(())
//! ```

mod deps;
mod error;
mod filesystem;
mod path;
mod project;
mod registry;

pub use deps::{DependencyCache, DependencyListener, OrderedDependencyManager, Select};
pub use error::AfsError;
pub use filesystem::{AppFileSystem, Folder, Node, NodeKind, Project};
pub use path::{format_fs_path, format_project_path, NodePath, PathNode};
pub use project::{ProjectFile, ProjectFolder, ProjectNode, ProjectNodeKind};
pub use registry::{
    FileTypeRegistry, ProjectFileType, FOLDER_PSEUDO_CLASS, PROJECT_FOLDER_PSEUDO_CLASS,
    PROJECT_PSEUDO_CLASS,
};

// Re-exported so callers can name port types without a direct dependency.
pub use studyfs_storage as storage;
