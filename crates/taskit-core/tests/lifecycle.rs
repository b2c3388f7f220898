//! End-to-end task lifecycle scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rstest::rstest;
use taskit_core::app::{DependencyInfo, TaskRef};
use taskit_core::{
    Dependency, Diagnostics, InMemoryStatusStore, StatusStore, TaskId, TaskManager, TaskStatus,
    TaskitError, ToggleDependency,
};

fn dep(name: &str, active: bool) -> DependencyInfo {
    DependencyInfo {
        name: name.to_owned(),
        active,
    }
}

fn count_status(manager: &TaskManager, status: TaskStatus) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    manager.on(status, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    hits
}

#[test]
fn gate_scenario_through_diagnostics() {
    let diagnostics = Arc::new(Diagnostics::new());
    let manager = TaskManager::builder("quests")
        .diagnostics(Arc::clone(&diagnostics))
        .build();
    let mid = manager.id();
    let tid = TaskId::new(1);

    let checked = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&checked);
    diagnostics.on_dependencies_checked(move |task: &TaskRef| sink.lock().unwrap().push(task.task_id));

    let gate = ToggleDependency::shared("gate");
    let task = manager.ensure_task(tid).unwrap();
    task.add_dependency(gate.clone() as Arc<dyn Dependency>);
    task.start().unwrap();

    assert_eq!(diagnostics.task_status(mid, tid), Some(TaskStatus::Pending));
    assert_eq!(diagnostics.dependencies(mid, tid), vec![dep("gate", false)]);

    gate.set_active(true);
    assert_eq!(diagnostics.task_status(mid, tid), Some(TaskStatus::Active));
    assert_eq!(diagnostics.dependencies(mid, tid), vec![dep("gate", true)]);

    task.complete().unwrap();
    assert_eq!(diagnostics.task_status(mid, tid), Some(TaskStatus::Completed));
    assert!(diagnostics.dependencies(mid, tid).is_empty());

    task.archive().unwrap();
    assert_eq!(diagnostics.task_status(mid, tid), Some(TaskStatus::Archived));
    assert!(manager.task(tid).is_none());
    assert!(!manager.live_task_ids().contains(&tid));
    assert_eq!(diagnostics.archived_task_ids(mid), vec![tid]);

    assert_eq!(*checked.lock().unwrap(), vec![tid, tid]);
}

#[rstest]
#[case::in_order(vec![0, 1, 2])]
#[case::reversed(vec![2, 1, 0])]
#[case::middle_first(vec![1, 2, 0])]
#[case::last_first(vec![2, 0, 1])]
fn becomes_active_once_after_the_last_activation(#[case] order: Vec<usize>) {
    let manager = TaskManager::new("quests");
    let active = count_status(&manager, TaskStatus::Active);
    let gates: Vec<Arc<ToggleDependency>> = (0..3)
        .map(|i| ToggleDependency::shared(format!("gate-{i}")))
        .collect();
    let task = manager.ensure_task(TaskId::new(7)).unwrap();
    for gate in &gates {
        task.add_dependency(gate.clone() as Arc<dyn Dependency>);
    }

    task.start().unwrap();
    let (last, rest) = order.split_last().unwrap();
    for &i in rest {
        gates[i].set_active(true);
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }
    gates[*last].set_active(true);

    assert_eq!(task.status(), TaskStatus::Active);
    assert_eq!(active.load(Ordering::SeqCst), 1);

    for gate in &gates {
        gate.set_active(true);
    }
    assert_eq!(active.load(Ordering::SeqCst), 1);
}

#[test]
fn zero_dependency_task_is_active_when_start_returns() {
    let manager = TaskManager::new("quests");
    let task = manager.ensure_task(TaskId::new(1)).unwrap();
    task.start().unwrap();
    assert_eq!(task.status(), TaskStatus::Active);
}

#[test]
fn reactivating_an_active_dependency_fires_nothing() {
    let manager = TaskManager::new("quests");
    let active = count_status(&manager, TaskStatus::Active);
    let gate = ToggleDependency::shared("gate");
    let first = manager.ensure_task(TaskId::new(1)).unwrap();
    first.add_dependency(gate.clone() as Arc<dyn Dependency>);
    first.start().unwrap();

    gate.set_active(true);
    assert_eq!(active.load(Ordering::SeqCst), 1);

    let second = manager.ensure_task(TaskId::new(2)).unwrap();
    second.add_dependency(gate.clone() as Arc<dyn Dependency>);
    gate.set_active(true);
    assert_eq!(active.load(Ordering::SeqCst), 1);
    assert_eq!(second.status(), TaskStatus::Idle);
}

#[test]
fn shared_dependency_promotes_both_tasks_in_one_call() {
    let manager = TaskManager::new("quests");
    let active = count_status(&manager, TaskStatus::Active);
    let gate = ToggleDependency::shared("door");
    let a = manager.ensure_task(TaskId::new(1)).unwrap();
    let b = manager.ensure_task(TaskId::new(2)).unwrap();
    for task in [&a, &b] {
        task.add_dependency(gate.clone() as Arc<dyn Dependency>);
        task.start().unwrap();
    }

    gate.set_active(true);

    assert_eq!(a.status(), TaskStatus::Active);
    assert_eq!(b.status(), TaskStatus::Active);
    assert_eq!(active.load(Ordering::SeqCst), 2);
}

#[test]
fn archive_task_moves_the_id_between_lists() {
    let diagnostics = Arc::new(Diagnostics::new());
    let manager = TaskManager::builder("quests")
        .diagnostics(Arc::clone(&diagnostics))
        .build();
    let mid = manager.id();
    let tid = TaskId::new(4);
    manager.ensure_task(tid).unwrap().start().unwrap();

    assert_eq!(diagnostics.unarchived_task_ids(mid), vec![tid]);
    assert!(diagnostics.archived_task_ids(mid).is_empty());

    manager.archive_task(tid).unwrap();

    assert!(diagnostics.unarchived_task_ids(mid).is_empty());
    assert_eq!(diagnostics.archived_task_ids(mid), vec![tid]);
    assert!(manager.is_task_archived(tid));
    assert_eq!(manager.ensure_task(tid).unwrap_err(), TaskitError::Archived(tid));
}

#[test]
fn archived_status_survives_into_a_new_manager() {
    let mut store = InMemoryStatusStore::new();
    store.set_status(TaskId::new(1), TaskStatus::Completed);
    store.set_status(TaskId::new(2), TaskStatus::Archived);

    let manager = TaskManager::builder("quests").store(store).build();

    let completed = manager.ensure_task(TaskId::new(1)).unwrap();
    assert_eq!(completed.status(), TaskStatus::Completed);
    assert!(completed.start().is_err());
    assert_eq!(
        manager.ensure_task(TaskId::new(2)).unwrap_err(),
        TaskitError::Archived(TaskId::new(2))
    );
}

#[rstest]
#[case(TaskStatus::Idle)]
#[case(TaskStatus::Pending)]
#[case(TaskStatus::Active)]
#[case(TaskStatus::Completed)]
fn archived_is_final_from_every_live_status(#[case] start_from: TaskStatus) {
    let gate = ToggleDependency::shared("gate");
    let manager = TaskManager::new("quests");
    let task = manager.ensure_task(TaskId::new(1)).unwrap();
    task.add_dependency(gate.clone() as Arc<dyn Dependency>);
    if start_from != TaskStatus::Idle {
        task.start().unwrap();
    }
    if matches!(start_from, TaskStatus::Active | TaskStatus::Completed) {
        gate.set_active(true);
    }
    if start_from == TaskStatus::Completed {
        task.complete().unwrap();
    }
    assert_eq!(task.status(), start_from);

    task.archive().unwrap();

    assert_eq!(task.status(), TaskStatus::Archived);
    assert!(task.start().is_err());
    assert!(task.complete().is_err());
    assert!(task.archive().is_err());
    assert!(manager.archive_task(TaskId::new(1)).is_err());
    assert_eq!(task.status(), TaskStatus::Archived);
}

#[test]
fn graph_can_move_to_another_thread() {
    let manager = TaskManager::new("quests");
    let gate = ToggleDependency::shared("gate");
    let task = manager.ensure_task(TaskId::new(1)).unwrap();
    task.add_dependency(gate.clone() as Arc<dyn Dependency>);
    task.start().unwrap();

    let status = std::thread::spawn(move || {
        gate.set_active(true);
        let status = task.status();
        drop(manager);
        status
    })
    .join()
    .unwrap();

    assert_eq!(status, TaskStatus::Active);
}
