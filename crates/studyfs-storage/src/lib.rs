//! Storage port for the studyfs node tree.
//!
//! The node tree in `studyfs-core` never talks to a database directly; it goes
//! through the [`AppStorage`] trait defined here. A backend stores a forest of
//! named nodes (parent/child edges, string attributes) plus flat *named
//! dependencies* between nodes, and reports whether it is remote and writable.
//!
//! # Core types
//!
//! - [`AppStorage`]: the port every backend implements
//! - [`NodeId`] / [`NodeInfo`]: node identity and persisted metadata
//! - [`DependencyInfo`]: one named dependency edge
//! - [`NodeGenesis`]: everything needed to create a node in one call
//! - [`MemStorage`]: in-memory reference backend, also used as the test double
//!
//! Backends are fallible, remote collaborators: callers get every backend
//! failure unchanged, and nothing here retries.

mod error;
mod mem;
mod port;
mod types;

pub use error::StorageError;
pub use mem::MemStorage;
pub use port::AppStorage;
pub use types::{DependencyInfo, NodeGenesis, NodeId, NodeInfo};
