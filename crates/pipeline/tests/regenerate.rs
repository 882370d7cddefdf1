//! Single-key regeneration after a bulk run.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use atelier_core::error::CoreError;
use atelier_generation::GenerationClient;
use atelier_pipeline::{RecordStatus, RegenerationController, ResultStore, TaskScheduler};
use common::{tasks, MockClient};
use tokio::sync::Semaphore;

const KEYS: [&str; 6] = ["1950s", "1960s", "1970s", "1980s", "1990s", "2000s"];

async fn finished_run(client: Arc<MockClient>) -> (Arc<ResultStore>, RegenerationController) {
    let store = Arc::new(ResultStore::new());
    let client: Arc<dyn GenerationClient> = client;
    TaskScheduler::new(Arc::clone(&client), Arc::clone(&store), 2)
        .unwrap()
        .run(tasks(&KEYS))
        .await
        .unwrap();
    let controller = RegenerationController::new(client, Arc::clone(&store));
    (store, controller)
}

fn task(key: &str) -> atelier_core::types::GenerationTask {
    tasks(&[key]).remove(0)
}

#[tokio::test]
async fn regenerating_a_done_key_touches_only_that_key() {
    let client = Arc::new(MockClient::new());
    let (store, controller) = finished_run(Arc::clone(&client)).await;
    let before = store.snapshot().await;

    let status = controller.regenerate(&task("1970s")).await.unwrap();

    assert_eq!(status, RecordStatus::Done);
    assert_eq!(client.calls_for("1970s"), 2);
    assert_eq!(client.total_calls(), 7);

    let after = store.snapshot().await;
    assert_eq!(after.run, before.run);
    for key in KEYS.iter().filter(|k| **k != "1970s") {
        assert_eq!(after.get(key), before.get(key), "{key} changed");
    }
    assert!(after.get("1970s").unwrap().updated_at >= before.get("1970s").unwrap().updated_at);
}

#[tokio::test]
async fn failed_key_can_recover() {
    let client = Arc::new(MockClient::new().failing_with("1980s"));
    let (store, controller) = finished_run(Arc::clone(&client)).await;
    let keys: Vec<String> = KEYS.iter().map(|k| k.to_string()).collect();
    assert!(!store.is_complete(&keys).await);

    client.set_failing("1980s", false);
    let status = controller.regenerate(&task("1980s")).await.unwrap();

    assert_eq!(status, RecordStatus::Done);
    assert!(store.is_complete(&keys).await);
}

#[tokio::test]
async fn regeneration_can_fail_again() {
    let client = Arc::new(MockClient::new().failing_with("1950s"));
    let (store, controller) = finished_run(Arc::clone(&client)).await;

    let status = controller.regenerate(&task("1950s")).await.unwrap();
    assert_eq!(status, RecordStatus::Error);
    assert_eq!(
        store.get("1950s").await.unwrap().status(),
        RecordStatus::Error
    );
}

#[tokio::test]
async fn pending_key_is_rejected_without_a_call() {
    let client = Arc::new(MockClient::new());
    let store = Arc::new(ResultStore::new());
    store
        .reset(&KEYS.iter().map(|k| k.to_string()).collect::<Vec<_>>())
        .await;
    let controller = RegenerationController::new(client.clone(), Arc::clone(&store));

    assert_matches!(
        controller.regenerate(&task("1950s")).await,
        Err(CoreError::Precondition(_))
    );
    assert_eq!(client.total_calls(), 0);
    assert_eq!(
        store.get("1950s").await.unwrap().status(),
        RecordStatus::Pending
    );
}

#[tokio::test]
async fn key_outside_the_run_is_rejected() {
    let client = Arc::new(MockClient::new());
    let (_, controller) = finished_run(Arc::clone(&client)).await;

    assert_matches!(
        controller.regenerate(&task("2010s")).await,
        Err(CoreError::Precondition(_))
    );
    assert_eq!(client.total_calls(), 6);
}

#[tokio::test]
async fn concurrent_regenerations_of_one_key_are_single_flight() {
    let gate = Arc::new(Semaphore::new(6));
    let client = Arc::new(MockClient::new().gated(Arc::clone(&gate)));
    let (store, controller) = finished_run(Arc::clone(&client)).await;
    let controller = Arc::new(controller);

    let first = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.regenerate(&task("1990s")).await })
    };
    let watcher = Arc::clone(&client);
    common::wait_until(|| watcher.total_calls() == 7).await;
    assert_eq!(
        store.get("1990s").await.unwrap().status(),
        RecordStatus::Pending
    );

    assert_matches!(
        controller.regenerate(&task("1990s")).await,
        Err(CoreError::Precondition(_))
    );

    // Other keys stay available while one is in flight.
    let second = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.regenerate(&task("1950s")).await })
    };
    common::wait_until(|| watcher.total_calls() == 8).await;

    gate.add_permits(2);
    assert_eq!(first.await.unwrap().unwrap(), RecordStatus::Done);
    assert_eq!(second.await.unwrap().unwrap(), RecordStatus::Done);
    assert_eq!(client.calls_for("1990s"), 2);
}

#[tokio::test]
async fn regeneration_result_is_dropped_after_reset() {
    let gate = Arc::new(Semaphore::new(6));
    let client = Arc::new(MockClient::new().gated(Arc::clone(&gate)));
    let (store, controller) = finished_run(Arc::clone(&client)).await;
    let controller = Arc::new(controller);

    let pending = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.regenerate(&task("1960s")).await })
    };
    let watcher = Arc::clone(&client);
    common::wait_until(|| watcher.total_calls() == 7).await;

    store.clear().await;
    gate.add_permits(1);

    assert_matches!(
        pending.await.unwrap(),
        Err(CoreError::Precondition(msg)) if msg.contains("discarded")
    );
    assert!(store.get("1960s").await.is_none());
}
