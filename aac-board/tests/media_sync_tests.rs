//! Media sync integration tests

mod helpers;

use aac_board::services::media_pipeline::encode_data_uri;
use aac_board::services::media_sync::{DeletionNotice, MediaSync};
use aac_common::config::PolicyConfig;
use aac_common::events::BoardEvent;
use helpers::*;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn inline_card(id: &str, order: i64) -> aac_common::Card {
    let mut card = remote_card(id, "food", id, order);
    card.image_url = encode_data_uri("image/png", &png_bytes(24, 24));
    card
}

async fn board_with_inline_cards() -> Board {
    let store = FakeRemoteStore::signed_in();
    store.seed_card(inline_card("inline-1", 0));
    store.seed_card(inline_card("inline-2", 1));
    store.seed_card(remote_card("hosted", "food", "Hosted", 2));
    let board = board_with(store, bare_system_content(), PolicyConfig::default());
    board.manager.initialize().await;
    board
}

#[tokio::test]
async fn test_sweep_uploads_inline_images() {
    let board = board_with_inline_cards().await;
    assert_eq!(board.manager.pending_uploads().await.len(), 2);
    let mut rx = board.events.subscribe();

    let sync = MediaSync::new(board.manager.clone());
    let report = sync.sweep().await;

    assert_eq!(report.uploaded, 2);
    assert_eq!(report.failed, 0);
    assert!(!report.skipped);
    assert_eq!(board.host.upload_count(), 2);
    assert!(board.manager.pending_uploads().await.is_empty());

    let stored = board.store.stored_card("inline-1").unwrap();
    assert!(stored.image_url.starts_with("https://media.example/aac-test/"));
    assert!(stored.media_id.is_some());
    assert_eq!(
        board.store.stored_card("hosted").unwrap().image_url,
        "https://cdn.example/hosted.png"
    );

    assert!(matches!(
        rx.recv().await.unwrap(),
        BoardEvent::MediaSyncCompleted { uploaded: 2, failed: 0 }
    ));

    // Second sweep has nothing left to do
    assert!(sync.sweep().await.skipped);
}

#[tokio::test]
async fn test_sweep_discards_upload_when_card_update_fails() {
    let board = board_with_inline_cards().await;
    board.store.fail_update_of("inline-2");

    let report = MediaSync::new(board.manager.clone()).sweep().await;

    assert_eq!(report.uploaded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(board.host.destroyed().len(), 1);

    let pending = board.manager.pending_uploads().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, "inline-2");
}

#[tokio::test]
async fn test_sweep_counts_upload_failures() {
    let board = board_with_inline_cards().await;
    *board.host.fail_uploads.lock().unwrap() = true;

    let report = MediaSync::new(board.manager.clone()).sweep().await;
    assert_eq!(report.uploaded, 0);
    assert_eq!(report.failed, 2);
    assert_eq!(board.manager.pending_uploads().await.len(), 2);
}

#[tokio::test]
async fn test_watch_deletions_destroys_media_until_channel_closes() {
    let board = signed_in_board().await;
    let sync = MediaSync::new(board.manager.clone());

    let (tx, rx) = mpsc::channel(8);
    tx.send(DeletionNotice {
        card_id: "a".to_string(),
        media_id: Some("aac-test/img-7".to_string()),
    })
    .await
    .unwrap();
    tx.send(DeletionNotice {
        card_id: "b".to_string(),
        media_id: None,
    })
    .await
    .unwrap();
    drop(tx);

    let destroyed = sync.watch_deletions(rx, CancellationToken::new()).await;
    assert_eq!(destroyed, 1);
    assert_eq!(board.host.destroyed(), vec!["aac-test/img-7".to_string()]);
}

#[tokio::test]
async fn test_watch_deletions_stops_on_cancel() {
    let board = signed_in_board().await;
    let sync = MediaSync::new(board.manager.clone());

    let (_tx, rx) = mpsc::channel::<DeletionNotice>(8);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let destroyed = tokio::time::timeout(Duration::from_secs(1), sync.watch_deletions(rx, cancel))
        .await
        .expect("watcher should stop when cancelled");
    assert_eq!(destroyed, 0);
}

#[tokio::test]
async fn test_run_sweeps_then_stops_on_cancel() {
    let board = board_with_inline_cards().await;
    let sync = MediaSync::new(board.manager.clone());

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.cancel();
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        sync.run(Duration::from_millis(20), cancel),
    )
    .await
    .expect("sync loop should stop when cancelled");

    assert_eq!(board.host.upload_count(), 2);
}
