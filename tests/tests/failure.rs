mod common;
use common::*;

use std::sync::{Arc, Mutex};

use graphmirror::{
    error::TaskError, memory::MemoryDocumentStore, storage::DocumentCollection, FailurePolicy, QueueConfig, QueueStatus, TaskFailure,
};

fn collect_failures(world: &World) -> Arc<Mutex<Vec<TaskFailure>>> {
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = failures.clone();
    world.queue.on_failure(move |failure| sink.lock().unwrap().push(failure.clone()));
    failures
}

#[tokio::test]
async fn test_failure_halts_and_retains_later_tasks() -> Result<(), anyhow::Error> {
    let world = World::new().await?;
    let failures = collect_failures(&world);
    world.people_collection.inject("p2", Fault::Fail);

    world.person_with_id("p1", "ok");
    world.person_with_id("p2", "broken");
    world.trip_with_id("t1", "never");
    world.person_with_id("p3", "never");

    assert_eq!(world.queue.wait_idle().await, QueueStatus::Halted);
    assert_eq!(world.journal.summary(), vec!["people insert p1"]);
    assert_eq!(world.queue.len(), 2);

    let failures = failures.lock().unwrap().clone();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].sequence, 1);
    assert_eq!(failures[0].collection, "people");
    assert_eq!(failures[0].entity_id.as_str(), "p2");
    assert!(matches!(*failures[0].error, TaskError::Storage(_)));

    // pushing onto a halted queue only appends
    world.person_with_id("p4", "queued");
    assert_eq!(world.queue.status(), QueueStatus::Halted);
    assert_eq!(world.queue.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_resume_drains_retained_tasks() -> Result<(), anyhow::Error> {
    let world = World::new().await?;
    world.people_collection.inject("p1", Fault::Fail);

    world.person_with_id("p1", "lost");
    world.person_with_id("p2", "kept");
    assert_eq!(world.queue.wait_idle().await, QueueStatus::Halted);

    assert!(world.queue.resume());
    assert!(!world.queue.resume());
    assert_eq!(world.queue.wait_idle().await, QueueStatus::Idle);

    // the failed insert is not retried
    assert_eq!(world.journal.summary(), vec!["people insert p2"]);
    assert_eq!(world.people_collection.count().await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_continue_policy_skips_failed_task() -> Result<(), anyhow::Error> {
    let world = World::detached(&MemoryDocumentStore::new(), QueueConfig::continue_on_failure()).await?;
    world.attach();
    let failures = collect_failures(&world);
    world.trips_collection.inject("t1", Fault::Fail);

    world.person_with_id("p1", "before");
    world.trip_with_id("t1", "broken");
    world.person_with_id("p2", "after");

    assert_eq!(world.queue.wait_idle().await, QueueStatus::Idle);
    assert_eq!(world.journal.summary(), vec!["people insert p1", "people insert p2"]);
    assert_eq!(failures.lock().unwrap().len(), 1);
    assert!(!world.queue.resume());
    Ok(())
}

#[tokio::test]
async fn test_panicking_store_call_is_reported() -> Result<(), anyhow::Error> {
    let world = World::new().await?;
    let failures = collect_failures(&world);
    world.people_collection.inject("p1", Fault::Panic);

    let person = world.person_with_id("p1", "boom");
    person.update(|p| p.age = Some(1))?;

    assert_eq!(world.queue.wait_idle().await, QueueStatus::Halted);
    let failures = failures.lock().unwrap().clone();
    assert_eq!(failures.len(), 1);
    match &*failures[0].error {
        TaskError::Panicked(message) => assert!(message.contains("injected panic for p1")),
        other => panic!("expected a panic, got {other}"),
    }

    // the queue survives and the retained replace runs against a missing document
    assert!(world.queue.resume());
    assert_eq!(world.queue.wait_idle().await, QueueStatus::Idle);
    assert_eq!(world.people_collection.count().await?, 0);
    Ok(())
}

#[test]
fn test_failure_policy_parsing() {
    assert_eq!("halt".parse::<FailurePolicy>().unwrap(), FailurePolicy::Halt);
    assert_eq!(" Continue ".parse::<FailurePolicy>().unwrap(), FailurePolicy::Continue);
    assert!("retry".parse::<FailurePolicy>().is_err());
    assert_eq!(FailurePolicy::default(), FailurePolicy::Halt);
    assert_eq!(QueueConfig::default().failure_policy, FailurePolicy::Halt);
    assert_eq!(FailurePolicy::Continue.to_string(), "continue");
}

#[test]
fn test_queue_requires_a_runtime() {
    assert!(graphmirror::TaskQueue::new(QueueConfig::default()).is_err());
}
