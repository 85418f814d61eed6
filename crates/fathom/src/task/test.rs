use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use crate::error::ErrorKind;
use crate::task::Task;

#[test]
fn ready_task_resolves_immediately() {
    let task = Task::ready(7);

    assert!(task.is_fulfilled());
    assert_eq!(task.get(), Ok(7));
}

#[test]
fn get_blocks_until_fulfilled_across_threads() {
    let (task, completer) = Task::pending();

    let producer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        completer.complete("done".to_owned());
    });

    assert_eq!(task.get(), Ok("done".to_owned()));
    producer.join().unwrap();
}

#[test]
fn continuation_fires_exactly_once() {
    let fired = Arc::new(AtomicUsize::new(0));

    let (task, completer) = Task::pending();
    let counter = fired.clone();
    task.on_complete(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    completer.complete(1);

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(task.get(), Ok(1));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn continuation_on_already_fulfilled_task_runs_immediately() {
    let fired = Arc::new(AtomicUsize::new(0));

    let task = Task::ready(1);
    let counter = fired.clone();
    task.on_complete(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn dropped_completer_fails_with_resource_error() {
    let (task, completer) = Task::<i32>::pending();
    drop(completer);

    let error = task.get().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Resource);
}

#[test]
fn failed_task_surfaces_its_error() {
    let task = Task::<i32>::failed(crate::error::ErrorState::timeout("too slow"));

    assert_eq!(task.get().unwrap_err().kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn task_is_awaitable() {
    let (task, completer) = Task::pending();

    let producer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        completer.complete(21);
    });

    assert_eq!(task.await, Ok(21));
    producer.join().unwrap();
}

#[tokio::test]
async fn awaiting_a_ready_task_is_immediate() {
    assert_eq!(Task::ready(3).await, Ok(3));
}
