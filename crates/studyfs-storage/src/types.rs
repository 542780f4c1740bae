use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Backend-assigned node identifier, unique within one backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted node metadata.
///
/// `version` is the code version of the implementation that wrote the node,
/// recorded at creation time. A build reading a node with a higher version
/// than it understands treats the node as ahead of itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub pseudo_class: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub version: u64,
}

/// One named dependency edge: `(source, name) -> target`.
///
/// The source is implicit (the node the edge was queried from).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInfo {
    pub name: String,
    pub target: NodeId,
}

impl DependencyInfo {
    pub fn new(name: impl Into<String>, target: NodeId) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }
}

/// Everything needed to create a node in a single backend call.
#[derive(Debug, Clone)]
pub struct NodeGenesis {
    pub name: String,
    pub pseudo_class: String,
    pub description: String,
    pub version: u64,
    pub attributes: BTreeMap<String, String>,
    pub dependencies: Vec<DependencyInfo>,
}

impl NodeGenesis {
    pub fn new(name: impl Into<String>, pseudo_class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pseudo_class: pseudo_class.into(),
            description: String::new(),
            version: 0,
            attributes: BTreeMap::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn dependency(mut self, name: impl Into<String>, target: NodeId) -> Self {
        self.dependencies.push(DependencyInfo::new(name, target));
        self
    }
}
