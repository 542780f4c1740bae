use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use studyfs_monitor::{MonitorError, TaskEvent, TaskId, TaskListener, TaskMonitor};

/// Records every delivered event, optionally scoped to one project.
struct Recorder {
    project: Option<String>,
    events: Mutex<Vec<TaskEvent>>,
}

impl Recorder {
    fn new(project: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            project: project.map(str::to_string),
            events: Mutex::new(Vec::new()),
        })
    }

    fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().clone()
    }
}

impl TaskListener for Recorder {
    fn project_id(&self) -> Option<&str> {
        self.project.as_deref()
    }

    fn on_event(&self, event: &TaskEvent) {
        self.events.lock().push(event.clone());
    }
}

#[test]
fn revisions_increase_by_one_per_committed_mutation() {
    let monitor = TaskMonitor::new();
    let t1 = monitor.start_task("LoadFlow-Run-1", "projA");
    assert_eq!(t1.revision, 1);
    let t2 = monitor.start_task("LoadFlow-Run-2", "projA");
    assert_eq!(t2.revision, 2);
    monitor.update_task_message(t1.id, "solving").unwrap();
    assert_eq!(monitor.take_snapshot(None).revision, 3);
    monitor.stop_task(t2.id).unwrap();
    assert_eq!(monitor.take_snapshot(None).revision, 4);
}

#[test]
fn failed_operations_do_not_advance_the_revision() {
    let monitor = TaskMonitor::new();
    let task = monitor.start_task("import", "projA");
    assert_eq!(monitor.take_snapshot(None).revision, 1);

    let unknown = TaskId::new();
    assert_eq!(
        monitor.stop_task(unknown),
        Err(MonitorError::UnknownTask(unknown))
    );
    assert_eq!(
        monitor.update_task_message(unknown, "ignored"),
        Err(MonitorError::UnknownTask(unknown))
    );
    assert_eq!(monitor.take_snapshot(None).revision, 1);

    // The registered task is untouched.
    let snapshot = monitor.take_snapshot(None);
    assert_eq!(snapshot.tasks, vec![task]);
}

#[test]
fn failed_operations_notify_nobody() {
    let monitor = TaskMonitor::new();
    let recorder = Recorder::new(None);
    monitor.add_listener(recorder.clone());

    let _ = monitor.stop_task(TaskId::new());
    let _ = monitor.update_task_message(TaskId::new(), "ignored");
    assert!(recorder.events().is_empty());
}

#[test]
fn snapshot_is_an_independent_copy_with_the_global_revision() {
    let monitor = TaskMonitor::new();
    let t1 = monitor.start_task("LoadFlow-Run-1", "projA");
    monitor.start_task("LoadFlow-Run-2", "projB");

    let filtered = monitor.take_snapshot(Some("projA"));
    assert_eq!(filtered.tasks.len(), 1);
    assert_eq!(filtered.tasks[0].name, "LoadFlow-Run-1");
    // Global revision, not a per-project one.
    assert_eq!(filtered.revision, 2);

    // Later mutations do not leak into the copy.
    monitor.update_task_message(t1.id, "solving").unwrap();
    assert_eq!(filtered.tasks[0].message, None);
}

#[test]
fn listeners_filter_by_project() {
    let monitor = TaskMonitor::new();
    let all = Recorder::new(None);
    let only_a = Recorder::new(Some("projA"));
    monitor.add_listener(all.clone());
    monitor.add_listener(only_a.clone());

    let a = monitor.start_task("a-task", "projA");
    let b = monitor.start_task("b-task", "projB");
    monitor.update_task_message(b.id, "running").unwrap();
    monitor.stop_task(a.id).unwrap();

    assert_eq!(all.events().len(), 4);
    let a_events = only_a.events();
    assert_eq!(a_events.len(), 2);
    assert!(a_events.iter().all(|event| event.task_id() == a.id));
}

#[test]
fn listener_observes_revisions_in_order() {
    let monitor = TaskMonitor::new();
    let recorder = Recorder::new(None);
    monitor.add_listener(recorder.clone());

    let task = monitor.start_task("seq", "p");
    monitor.update_task_message(task.id, "1").unwrap();
    monitor.update_task_message(task.id, "2").unwrap();
    monitor.stop_task(task.id).unwrap();

    let revisions: Vec<u64> = recorder.events().iter().map(TaskEvent::revision).collect();
    assert_eq!(revisions, vec![1, 2, 3, 4]);
}

#[test]
fn removed_listener_receives_nothing_further() {
    let monitor = TaskMonitor::new();
    let recorder = Recorder::new(None);
    let listener: Arc<dyn TaskListener> = recorder.clone();
    monitor.add_listener(listener.clone());

    monitor.start_task("one", "p");
    monitor.remove_listener(&listener);
    monitor.start_task("two", "p");

    assert_eq!(recorder.events().len(), 1);
}

#[test]
fn update_stamps_the_task_with_the_new_global_revision() {
    let monitor = TaskMonitor::new();
    let task = monitor.start_task("stamped", "p");
    monitor.start_task("noise", "q");
    monitor.update_task_message(task.id, "halfway").unwrap();

    let snapshot = monitor.take_snapshot(Some("p"));
    assert_eq!(snapshot.tasks[0].revision, 3);
    assert_eq!(snapshot.tasks[0].message.as_deref(), Some("halfway"));
}

// The end-to-end sequence: two starts, a filtered snapshot, a failed stop
// and a successful one.
#[test]
fn lifecycle_scenario() {
    let monitor = TaskMonitor::new();

    let t1 = monitor.start_task("LoadFlow-Run-1", "projA");
    assert_eq!(t1.revision, 1);
    assert_eq!(monitor.take_snapshot(None).tasks.len(), 1);

    let t2 = monitor.start_task("LoadFlow-Run-2", "projB");
    assert_eq!(t2.revision, 2);

    let snapshot = monitor.take_snapshot(Some("projA"));
    assert_eq!(snapshot.tasks.len(), 1);
    assert_eq!(snapshot.tasks[0].name, "LoadFlow-Run-1");
    assert_eq!(snapshot.revision, 2);

    assert!(monitor.stop_task(TaskId::new()).is_err());
    assert_eq!(monitor.take_snapshot(None).revision, 2);

    monitor.stop_task(t1.id).unwrap();
    let end = monitor.take_snapshot(None);
    assert_eq!(end.revision, 3);
    assert_eq!(end.tasks.len(), 1);
    assert_eq!(end.tasks[0].id, t2.id);
}
