//! Session flows: mode selection through downloads.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use atelier_core::album::{CANVAS_HEIGHT, CANVAS_WIDTH};
use atelier_core::error::CoreError;
use atelier_core::mode::{builtin_catalog, find_mode, Mode, DECADES};
use atelier_pipeline::{Phase, RecordStatus, Studio, StudioConfig, StudioError};
use common::{compositor, source_photo, MockClient};
use tokio::sync::Semaphore;

fn mode(id: &str) -> Mode {
    find_mode(&builtin_catalog(), id).unwrap().clone()
}

fn prompt(mode: &Mode, key: &str) -> String {
    mode.prompt_for(key).unwrap().to_string()
}

fn studio(client: Arc<MockClient>) -> Studio {
    Studio::new(client, StudioConfig::default())
}

async fn ready(studio: &Studio, mode: Mode) {
    studio.select_mode(mode).await.unwrap();
    studio.set_source(source_photo()).await.unwrap();
}

// -- lifecycle --

#[tokio::test]
async fn phases_follow_the_workflow() {
    let studio = studio(Arc::new(MockClient::new()));
    assert_eq!(studio.phase().await, Phase::Selection);

    studio.select_mode(mode("time-travel")).await.unwrap();
    assert_eq!(studio.phase().await, Phase::Uploader);

    studio.set_source(source_photo()).await.unwrap();
    assert_eq!(studio.phase().await, Phase::Uploader);

    studio.generate().await.unwrap();
    assert_eq!(studio.phase().await, Phase::Results);

    studio.change_source().await;
    assert_eq!(studio.phase().await, Phase::Uploader);
    assert!(studio.source().await.is_none());
    assert!(studio.mode().await.is_some());
    assert!(studio.snapshot().await.records.is_empty());

    studio.start_over().await;
    assert_eq!(studio.phase().await, Phase::Selection);
    assert!(studio.mode().await.is_none());
}

#[tokio::test]
async fn generation_needs_mode_and_photo() {
    let studio = studio(Arc::new(MockClient::new()));
    assert_matches!(studio.generate().await, Err(CoreError::Precondition(_)));
    assert_matches!(
        studio.set_source(source_photo()).await,
        Err(CoreError::Precondition(_))
    );

    studio.select_mode(mode("portrait-art")).await.unwrap();
    assert_matches!(studio.generate().await, Err(CoreError::Precondition(_)));
    assert_eq!(studio.phase().await, Phase::Uploader);
}

#[tokio::test]
async fn new_photo_clears_previous_results() {
    let studio = studio(Arc::new(MockClient::new()));
    ready(&studio, mode("time-travel")).await;
    studio.generate().await.unwrap();
    assert!(studio.is_complete().await);

    studio.set_source(source_photo()).await.unwrap();
    assert!(studio.snapshot().await.records.is_empty());
    assert!(!studio.is_complete().await);
}

// -- multi-image runs --

#[tokio::test]
async fn six_decades_all_succeed_and_compose() {
    let client = Arc::new(MockClient::new());
    let studio = studio(Arc::clone(&client));
    ready(&studio, mode("time-travel")).await;

    let summary = studio.generate().await.unwrap();
    assert_eq!((summary.total, summary.done, summary.failed), (6, 6, 0));
    assert!(studio.is_complete().await);
    assert_eq!(studio.snapshot().await.keys(), DECADES.to_vec());
    assert!(client.max_in_flight() <= 2);

    let album = studio.download_album(&compositor()).await.unwrap();
    assert_eq!(album.filename, "past-forward-album.jpg");
    assert!(album.image.is_jpeg());
    let page = image::load_from_memory(album.image.bytes()).unwrap();
    assert_eq!((page.width(), page.height()), (CANVAS_WIDTH, CANVAS_HEIGHT));
}

#[tokio::test]
async fn one_failure_blocks_the_album_until_regenerated() {
    let time_travel = mode("time-travel");
    let failing = prompt(&time_travel, "1970s");
    let client = Arc::new(MockClient::new().failing_with(&failing));
    let studio = studio(Arc::clone(&client));
    ready(&studio, time_travel).await;

    let summary = studio.generate().await.unwrap();
    assert_eq!((summary.done, summary.failed), (5, 1));
    assert_eq!(studio.phase().await, Phase::Results);
    assert!(!studio.is_complete().await);

    let snapshot = studio.snapshot().await;
    let failed = snapshot.get("1970s").unwrap();
    assert!(failed.error_message().unwrap().contains("model refused"));

    assert_matches!(
        studio.download_album(&compositor()).await,
        Err(StudioError::Core(CoreError::Precondition(_)))
    );

    client.set_failing(&failing, false);
    assert_eq!(
        studio.regenerate("1970s").await.unwrap(),
        RecordStatus::Done
    );
    assert!(studio.is_complete().await);
    assert!(studio.download_album(&compositor()).await.is_ok());
}

#[tokio::test]
async fn magazine_album_uses_mode_filename() {
    let studio = studio(Arc::new(MockClient::new()));
    ready(&studio, mode("magazine-cover")).await;
    studio.generate().await.unwrap();

    let album = studio.download_album(&compositor()).await.unwrap();
    assert_eq!(album.filename, "magazine-cover-album.jpg");
}

// -- single-image runs --

#[tokio::test]
async fn single_mode_produces_one_keyed_image() {
    let client = Arc::new(MockClient::new());
    let studio = studio(Arc::clone(&client));
    ready(&studio, mode("knitted-doll")).await;

    let summary = studio.generate().await.unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(client.total_calls(), 1);
    assert_eq!(studio.snapshot().await.keys(), vec!["knitted-doll"]);

    let download = studio.download_image("knitted-doll").await.unwrap();
    assert_eq!(download.filename, "creative-output-knitted-doll.jpg");
    // The mock answers with PNG; downloads are always JPEG.
    assert!(download.image.is_jpeg());
    assert!(image::load_from_memory(download.image.bytes()).is_ok());

    assert_matches!(
        studio.download_album(&compositor()).await,
        Err(StudioError::Core(CoreError::Precondition(_)))
    );
}

#[tokio::test]
async fn single_mode_regenerates_by_mode_id() {
    let client = Arc::new(MockClient::new());
    let studio = studio(Arc::clone(&client));
    ready(&studio, mode("black-gold")).await;
    studio.generate().await.unwrap();

    assert_eq!(
        studio.regenerate("black-gold").await.unwrap(),
        RecordStatus::Done
    );
    assert_eq!(client.total_calls(), 2);
}

// -- downloads and lookups --

#[tokio::test]
async fn downloads_require_a_done_key() {
    let time_travel = mode("time-travel");
    let client = Arc::new(MockClient::new().failing_with(&prompt(&time_travel, "1950s")));
    let studio = studio(client);
    ready(&studio, time_travel).await;
    studio.generate().await.unwrap();

    assert_matches!(
        studio.download_image("1950s").await,
        Err(StudioError::Core(CoreError::Precondition(_)))
    );
    assert_matches!(
        studio.download_image("1850s").await,
        Err(StudioError::Core(CoreError::NotFound { .. }))
    );
    let ok = studio.download_image("1960s").await.unwrap();
    assert_eq!(ok.filename, "creative-output-1960s.jpg");
}

#[tokio::test]
async fn unknown_key_cannot_be_regenerated() {
    let client = Arc::new(MockClient::new());
    let studio = studio(Arc::clone(&client));
    ready(&studio, mode("time-travel")).await;
    studio.generate().await.unwrap();

    assert_matches!(
        studio.regenerate("1850s").await,
        Err(CoreError::NotFound { .. })
    );
    assert_eq!(client.total_calls(), 6);
}

// -- superseded runs --

#[tokio::test]
async fn changing_photo_mid_run_discards_late_results() {
    let gate = Arc::new(Semaphore::new(0));
    let client = Arc::new(MockClient::new().gated(Arc::clone(&gate)));
    let studio = Arc::new(studio(Arc::clone(&client)));
    ready(&studio, mode("time-travel")).await;

    let run = {
        let studio = Arc::clone(&studio);
        tokio::spawn(async move { studio.generate().await })
    };
    let watcher = Arc::clone(&client);
    common::wait_until(|| watcher.total_calls() == 2).await;
    assert_eq!(studio.phase().await, Phase::Generating);
    assert_matches!(studio.generate().await, Err(CoreError::Precondition(_)));

    studio.change_source().await;
    gate.add_permits(6);
    run.await.unwrap().unwrap();

    assert!(studio.snapshot().await.records.is_empty());
    assert_eq!(studio.phase().await, Phase::Uploader);
}

#[tokio::test]
async fn regeneration_discarded_by_a_new_photo_is_reported() {
    let gate = Arc::new(Semaphore::new(6));
    let client = Arc::new(MockClient::new().gated(Arc::clone(&gate)));
    let studio = Arc::new(studio(Arc::clone(&client)));
    ready(&studio, mode("time-travel")).await;
    studio.generate().await.unwrap();

    let pending = {
        let studio = Arc::clone(&studio);
        tokio::spawn(async move { studio.regenerate("1980s").await })
    };
    let watcher = Arc::clone(&client);
    common::wait_until(|| watcher.total_calls() == 7).await;

    studio.set_source(source_photo()).await.unwrap();
    gate.add_permits(1);

    assert_matches!(pending.await.unwrap(), Err(CoreError::Precondition(_)));
    assert!(studio.snapshot().await.records.is_empty());
}
