//! Cached and orderable views over the flat named-dependency primitive.
//!
//! Both views memoize under a single mutex and subscribe to the owner's
//! generic dependency-changed notification: *any* change to *any* of the
//! owner's dependencies clears the whole cached entry or list. The
//! notification carries a name hint which the caches do not filter on;
//! the coarse granularity is intentional and relied upon.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use regex::Regex;
use tracing::trace;

use studyfs_storage::{DependencyInfo, NodeId};

use crate::error::AfsError;
use crate::project::{ProjectFile, ProjectNode};

/// Change notifications published by the dependency layer.
///
/// `dependency_changed` fires on the *source* of a mutated edge;
/// `backward_dependency_changed` fires on its *target*.
pub trait DependencyListener: Send + Sync {
    fn dependency_changed(&self, name: &str);

    fn backward_dependency_changed(&self, _name: &str) {}
}

/// Per-node listener index. Listeners are held weakly; dead entries are
/// pruned on every notification.
#[derive(Default)]
pub(crate) struct DependencyBus {
    listeners: DashMap<NodeId, Vec<Weak<dyn DependencyListener>>>,
}

impl DependencyBus {
    pub(crate) fn subscribe(&self, node: NodeId, listener: Weak<dyn DependencyListener>) {
        self.listeners.entry(node).or_default().push(listener);
    }

    // Upgrades outside the map entry so listener callbacks never run under
    // the shard lock.
    fn alive(&self, node: NodeId) -> Vec<Arc<dyn DependencyListener>> {
        match self.listeners.get_mut(&node) {
            Some(mut entry) => {
                entry.retain(|listener| listener.strong_count() > 0);
                entry.iter().filter_map(Weak::upgrade).collect()
            }
            None => Vec::new(),
        }
    }

    pub(crate) fn dependency_changed(&self, node: NodeId, name: &str) {
        trace!(%node, name, "dependency changed");
        for listener in self.alive(node) {
            listener.dependency_changed(name);
        }
    }

    pub(crate) fn backward_dependency_changed(&self, node: NodeId, name: &str) {
        trace!(%node, name, "backward dependency changed");
        for listener in self.alive(node) {
            listener.backward_dependency_changed(name);
        }
    }
}

/// Selects and types the target of a dependency lookup. Returning `None`
/// filters the node out (type mismatch is absence, not an error).
pub type Select<T> = fn(ProjectNode) -> Option<T>;

/// Memoized single-value dependency lookup.
///
/// `get` resolves the owner's dependency named `name`, keeps the first
/// target accepted by the selector, and memoizes the result — including the
/// "no such dependency" case. One mutex guards the memo; concurrent callers
/// during a miss serialize on it, so each invalidation is followed by at
/// most one recomputation.
pub struct DependencyCache<T> {
    inner: Arc<CacheInner<T>>,
}

struct CacheInner<T> {
    owner: ProjectFile,
    name: String,
    select: Select<T>,
    state: Mutex<CacheState<T>>,
}

struct CacheState<T> {
    cached: bool,
    value: Option<T>,
}

impl<T> DependencyCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(owner: &ProjectFile, name: impl Into<String>, select: Select<T>) -> Self {
        let inner = Arc::new(CacheInner {
            owner: owner.clone(),
            name: name.into(),
            select,
            state: Mutex::new(CacheState {
                cached: false,
                value: None,
            }),
        });
        let listener: Weak<dyn DependencyListener> =
            Arc::downgrade(&(inner.clone() as Arc<dyn DependencyListener>));
        owner.bus().subscribe(owner.id(), listener);
        Self { inner }
    }

    /// Current value of the dependency, resolving it on a cache miss.
    pub fn get(&self) -> Result<Option<T>, AfsError> {
        let mut state = self.inner.state.lock();
        if !state.cached {
            state.value = self
                .inner
                .owner
                .dependency(&self.inner.name)?
                .into_iter()
                .find_map(self.inner.select);
            state.cached = true;
        }
        Ok(state.value.clone())
    }

    /// Drops the memoized value; the next `get` resolves afresh.
    pub fn invalidate(&self) {
        self.inner.clear();
    }
}

impl<T> CacheInner<T> {
    fn clear(&self) {
        let mut state = self.state.lock();
        state.cached = false;
        state.value = None;
    }
}

impl<T: Send + Sync> DependencyListener for CacheInner<T> {
    fn dependency_changed(&self, _name: &str) {
        // Coarse on purpose: the name hint is not filtered on.
        self.clear();
    }
}

/// Ordered dependency list layered over named single edges.
///
/// A logical list named `N` is stored as independent backend edges
/// `N_0, N_1, …, N_{k-1}`. Every mutation reads the whole list, mutates it
/// in memory and rewrites all edges, so backend edge names are **not stable**
/// across mutations: removing index 0 renames every remaining edge.
pub struct OrderedDependencyManager {
    inner: Arc<OrderedInner>,
}

struct OrderedInner {
    owner: ProjectFile,
    name: String,
    pattern: Regex,
    cache: Mutex<Option<Vec<DependencyInfo>>>,
}

impl OrderedDependencyManager {
    pub fn new(owner: &ProjectFile, name: impl Into<String>) -> Self {
        let name = name.into();
        // Escaped literal plus digit suffix; construction cannot fail.
        let pattern = Regex::new(&format!("^{}_(\\d+)$", regex::escape(&name)))
            .expect("ordered dependency pattern");
        let inner = Arc::new(OrderedInner {
            owner: owner.clone(),
            name,
            pattern,
            cache: Mutex::new(None),
        });
        let listener: Weak<dyn DependencyListener> =
            Arc::downgrade(&(inner.clone() as Arc<dyn DependencyListener>));
        owner.bus().subscribe(owner.id(), listener);
        Self { inner }
    }

    /// One unsorted, unfiltered snapshot of *all* of the owner's edges,
    /// lazily populated and cleared wholesale on any change notification.
    fn snapshot(&self) -> Result<Vec<DependencyInfo>, AfsError> {
        let mut cache = self.inner.cache.lock();
        if let Some(list) = cache.as_ref() {
            return Ok(list.clone());
        }
        let list = self
            .inner
            .owner
            .ctx
            .fs
            .storage
            .get_dependencies_info(self.inner.owner.id())?;
        *cache = Some(list.clone());
        Ok(list)
    }

    /// Ordered target ids, recovered by suffix index.
    fn target_ids(&self) -> Result<Vec<NodeId>, AfsError> {
        let mut entries: Vec<(usize, NodeId)> = self
            .snapshot()?
            .into_iter()
            .filter_map(|dep| {
                self.inner
                    .pattern
                    .captures(&dep.name)
                    .and_then(|captures| captures[1].parse::<usize>().ok())
                    .map(|index| (index, dep.target))
            })
            .collect();
        entries.sort_by_key(|(index, _)| *index);
        Ok(entries.into_iter().map(|(_, target)| target).collect())
    }

    /// Resolved targets, in list order.
    pub fn dependencies(&self) -> Result<Vec<ProjectNode>, AfsError> {
        self.target_ids()?
            .into_iter()
            .map(|id| ProjectNode::from_id(self.inner.owner.ctx.clone(), id))
            .collect()
    }

    /// Resolved targets accepted by the selector, preserving list order.
    pub fn typed_dependencies<T>(&self, select: Select<T>) -> Result<Vec<T>, AfsError> {
        Ok(self
            .dependencies()?
            .into_iter()
            .filter_map(select)
            .collect())
    }

    /// Replaces the whole list: removes every `{name}_*` edge, then recreates
    /// edges `{name}_0 … {name}_{k-1}` from `targets`.
    ///
    /// The rewrite is not transactional: a backend failure mid-sequence
    /// leaves a partially rewritten list behind.
    pub fn set_list(&self, targets: &[NodeId]) -> Result<(), AfsError> {
        let owner = &self.inner.owner;
        let storage = &owner.ctx.fs.storage;
        let removed: Vec<DependencyInfo> = storage
            .get_dependencies_info(owner.id())?
            .into_iter()
            .filter(|dep| self.inner.pattern.is_match(&dep.name))
            .collect();
        for dep in &removed {
            storage.remove_dependencies(owner.id(), &dep.name)?;
        }
        for (index, target) in targets.iter().enumerate() {
            storage.set_dependencies(
                owner.id(),
                &format!("{}_{}", self.inner.name, index),
                &[*target],
            )?;
        }
        owner.bus().dependency_changed(owner.id(), &self.inner.name);
        for dep in &removed {
            owner.bus().backward_dependency_changed(dep.target, &dep.name);
        }
        for (index, target) in targets.iter().enumerate() {
            owner
                .bus()
                .backward_dependency_changed(*target, &format!("{}_{}", self.inner.name, index));
        }
        Ok(())
    }

    /// Appends targets at the end of the list.
    pub fn append(&self, targets: &[NodeId]) -> Result<(), AfsError> {
        let mut list = self.target_ids()?;
        list.extend_from_slice(targets);
        self.set_list(&list)
    }

    /// Inserts targets at `index`, shifting the tail.
    pub fn insert(&self, index: usize, targets: &[NodeId]) -> Result<(), AfsError> {
        let mut list = self.target_ids()?;
        if index > list.len() {
            return Err(AfsError::IndexOutOfBounds {
                index,
                len: list.len(),
            });
        }
        list.splice(index..index, targets.iter().copied());
        self.set_list(&list)
    }

    /// Removes the entry at `index`; subsequent entries shift down and their
    /// backend edge names are re-issued.
    pub fn remove_at(&self, index: usize) -> Result<(), AfsError> {
        let mut list = self.target_ids()?;
        if index >= list.len() {
            return Err(AfsError::IndexOutOfBounds {
                index,
                len: list.len(),
            });
        }
        list.remove(index);
        self.set_list(&list)
    }

    /// Removes every entry whose target is in `ids`.
    pub fn remove_targets(&self, ids: &[NodeId]) -> Result<(), AfsError> {
        let mut list = self.target_ids()?;
        list.retain(|target| !ids.contains(target));
        self.set_list(&list)
    }
}

impl DependencyListener for OrderedInner {
    fn dependency_changed(&self, _name: &str) {
        *self.cache.lock() = None;
    }
}
