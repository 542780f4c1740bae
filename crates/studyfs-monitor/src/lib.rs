//! Process-local monitor for long-running background tasks.
//!
//! A [`TaskMonitor`] is created once per process and tracks in-flight tasks:
//! each is started, has its status message updated zero or more times, and is
//! stopped. Every committed mutation increments a global *revision* by
//! exactly one, and every listener observes mutations in revision order —
//! dispatch is synchronous, under the registry's single lock. A failed
//! operation (unknown task id) never advances the revision, so clients may
//! treat "revision moved" as "a real mutation happened".
//!
//! Nothing here is persistent or distributed: all state is lost on restart,
//! and an orphaned task lives until something calls [`TaskMonitor::stop_task`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Monitor-local task identifier, randomly generated at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One in-flight task. `revision` is the global revision at the time of the
/// task's last mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub message: Option<String>,
    pub revision: u64,
    pub project_id: String,
}

/// Immutable, revision-stamped copy of task state at a point in time.
///
/// The revision is always the registry-wide one, even when the snapshot was
/// filtered down to a single project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub revision: u64,
    pub tasks: Vec<Task>,
}

/// Lifecycle event delivered synchronously to listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskEvent {
    Started {
        id: TaskId,
        revision: u64,
        name: String,
    },
    Stopped {
        id: TaskId,
        revision: u64,
    },
    MessageUpdated {
        id: TaskId,
        revision: u64,
        message: String,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::Started { id, .. }
            | TaskEvent::Stopped { id, .. }
            | TaskEvent::MessageUpdated { id, .. } => *id,
        }
    }

    pub fn revision(&self) -> u64 {
        match self {
            TaskEvent::Started { revision, .. }
            | TaskEvent::Stopped { revision, .. }
            | TaskEvent::MessageUpdated { revision, .. } => *revision,
        }
    }
}

/// Receives task lifecycle events.
///
/// `project_id` scopes the listener: `None` receives every event, `Some(p)`
/// only events for tasks of project `p`. Callbacks run synchronously while
/// the registry lock is held — a blocking listener stalls every task
/// operation in the process.
pub trait TaskListener: Send + Sync {
    fn project_id(&self) -> Option<&str> {
        None
    }

    fn on_event(&self, event: &TaskEvent);
}

/// Errors reported by the monitor. Failed operations have no side effects:
/// no state change, no notification, no revision bump.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonitorError {
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),
}

struct MonitorState {
    revision: u64,
    tasks: HashMap<TaskId, Task>,
    listeners: Vec<Arc<dyn TaskListener>>,
}

/// Thread-safe registry of active tasks.
///
/// One lock guards the whole registry; all tasks across all projects
/// serialize on it. That trades intra-registry parallelism for a total order
/// over mutations and trivially correct listener ordering.
pub struct TaskMonitor {
    state: Mutex<MonitorState>,
}

impl TaskMonitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MonitorState {
                revision: 0,
                tasks: HashMap::new(),
                listeners: Vec::new(),
            }),
        }
    }

    /// Registers a task and notifies listeners with a `Started` event.
    pub fn start_task(&self, name: &str, project_id: &str) -> Task {
        let mut state = self.state.lock();
        let MonitorState {
            revision,
            tasks,
            listeners,
        } = &mut *state;
        *revision += 1;
        let task = Task {
            id: TaskId::new(),
            name: name.to_string(),
            message: None,
            revision: *revision,
            project_id: project_id.to_string(),
        };
        tasks.insert(task.id, task.clone());
        debug!(id = %task.id, name, project_id, revision = *revision, "task started");
        let event = TaskEvent::Started {
            id: task.id,
            revision: *revision,
            name: task.name.clone(),
        };
        notify(listeners, project_id, &event);
        task
    }

    /// Removes a task and notifies listeners with a `Stopped` event.
    ///
    /// An unknown id fails without advancing the revision.
    pub fn stop_task(&self, id: TaskId) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        let MonitorState {
            revision,
            tasks,
            listeners,
        } = &mut *state;
        let task = tasks.remove(&id).ok_or(MonitorError::UnknownTask(id))?;
        *revision += 1;
        debug!(%id, revision = *revision, "task stopped");
        let event = TaskEvent::Stopped {
            id,
            revision: *revision,
        };
        notify(listeners, &task.project_id, &event);
        Ok(())
    }

    /// Updates a task's status message and notifies listeners.
    ///
    /// An unknown id fails without advancing the revision.
    pub fn update_task_message(&self, id: TaskId, message: &str) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        let MonitorState {
            revision,
            tasks,
            listeners,
        } = &mut *state;
        let task = tasks.get_mut(&id).ok_or(MonitorError::UnknownTask(id))?;
        *revision += 1;
        task.message = Some(message.to_string());
        task.revision = *revision;
        let project_id = task.project_id.clone();
        debug!(%id, revision = *revision, "task message updated");
        let event = TaskEvent::MessageUpdated {
            id,
            revision: *revision,
            message: message.to_string(),
        };
        notify(listeners, &project_id, &event);
        Ok(())
    }

    /// Copies current task state, optionally filtered by project. The
    /// snapshot's revision is the registry-wide revision at the time of the
    /// call regardless of the filter.
    pub fn take_snapshot(&self, project_filter: Option<&str>) -> TaskSnapshot {
        let state = self.state.lock();
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| project_filter.map_or(true, |project| task.project_id == project))
            .cloned()
            .collect();
        tasks.sort_by_key(|task| task.revision);
        TaskSnapshot {
            revision: state.revision,
            tasks,
        }
    }

    /// Registers a listener; dispatch follows registration order.
    pub fn add_listener(&self, listener: Arc<dyn TaskListener>) {
        self.state.lock().listeners.push(listener);
    }

    /// Unregisters a previously added listener (by identity).
    pub fn remove_listener(&self, listener: &Arc<dyn TaskListener>) {
        self.state
            .lock()
            .listeners
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }
}

impl Default for TaskMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn notify(listeners: &[Arc<dyn TaskListener>], project_id: &str, event: &TaskEvent) {
    for listener in listeners {
        match listener.project_id() {
            None => listener.on_event(event),
            Some(filter) if filter == project_id => listener.on_event(event),
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_accessors() {
        let id = TaskId::new();
        let event = TaskEvent::MessageUpdated {
            id,
            revision: 7,
            message: "solving".into(),
        };
        assert_eq!(event.task_id(), id);
        assert_eq!(event.revision(), 7);
    }

    #[test]
    fn unknown_task_error_names_the_id() {
        let id = TaskId::new();
        let err = MonitorError::UnknownTask(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
