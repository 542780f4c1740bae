//! Pseudo-class registry.
//!
//! Every node carries a *pseudo-class*: a string discriminator identifying
//! its logical type. The registry is populated explicitly at construction
//! from a static table (plus whatever the embedding application registers);
//! there is no runtime discovery.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Pseudo-class of plain filesystem folders and filesystem roots.
pub const FOLDER_PSEUDO_CLASS: &str = "folder";
/// Pseudo-class of project nodes in the filesystem tree.
pub const PROJECT_PSEUDO_CLASS: &str = "project";
/// Pseudo-class of folders inside a project tree.
pub const PROJECT_FOLDER_PSEUDO_CLASS: &str = "projectFolder";

/// One registered node type: its discriminator and the highest persisted
/// version this build understands for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectFileType {
    pub pseudo_class: &'static str,
    pub code_version: u64,
}

impl ProjectFileType {
    pub const fn new(pseudo_class: &'static str, code_version: u64) -> Self {
        Self {
            pseudo_class,
            code_version,
        }
    }
}

static BUILTIN_TYPES: Lazy<Vec<ProjectFileType>> = Lazy::new(|| {
    vec![
        ProjectFileType::new(FOLDER_PSEUDO_CLASS, 0),
        ProjectFileType::new(PROJECT_PSEUDO_CLASS, 0),
        ProjectFileType::new(PROJECT_FOLDER_PSEUDO_CLASS, 0),
    ]
});

/// Maps pseudo-class discriminators to registered node types.
///
/// Unregistered pseudo-classes are still representable as untyped handles;
/// typed lookups on them yield absence and their version is never considered
/// ahead of this build.
#[derive(Debug, Clone)]
pub struct FileTypeRegistry {
    types: HashMap<&'static str, ProjectFileType>,
}

impl FileTypeRegistry {
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Registry with the built-in folder/project types only.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for file_type in BUILTIN_TYPES.iter() {
            registry.register(*file_type);
        }
        registry
    }

    /// Registers a type, replacing any previous entry for the same
    /// pseudo-class.
    pub fn register(&mut self, file_type: ProjectFileType) {
        self.types.insert(file_type.pseudo_class, file_type);
    }

    pub fn get(&self, pseudo_class: &str) -> Option<&ProjectFileType> {
        self.types.get(pseudo_class)
    }

    pub fn code_version(&self, pseudo_class: &str) -> Option<u64> {
        self.get(pseudo_class).map(|file_type| file_type.code_version)
    }
}

impl Default for FileTypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_core_types() {
        let registry = FileTypeRegistry::builtin();
        assert_eq!(registry.code_version(FOLDER_PSEUDO_CLASS), Some(0));
        assert_eq!(registry.code_version(PROJECT_PSEUDO_CLASS), Some(0));
        assert_eq!(registry.code_version("contingencyStore"), None);
    }

    #[test]
    fn register_replaces_existing_entry() {
        let mut registry = FileTypeRegistry::builtin();
        registry.register(ProjectFileType::new("loadFlow", 2));
        registry.register(ProjectFileType::new("loadFlow", 3));
        assert_eq!(registry.code_version("loadFlow"), Some(3));
    }
}
