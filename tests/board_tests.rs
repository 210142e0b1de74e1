mod common;

use bountyfold::{
    Board, BoardError, Config, EventKind, MemoryContentStore, MemoryLedger, RawEvent,
    RecordError, SubscriptionError, NO_EXTERNAL_DATA,
};
use common::{
    bounty_ids, fulfilment_ids, raw_acceptance, raw_cancellation, raw_fulfilment, raw_issuance,
    CID_A, CID_B, CID_C,
};
use serde_json::json;
use std::time::Duration;
use tempfile::tempdir;

fn board_with(store: &MemoryContentStore, timeout: Duration) -> Board {
    Board::builder()
        .content_store(store.clone())
        .enrich_timeout(timeout)
        .open()
        .unwrap()
}

#[tokio::test]
async fn test_deliver_appends_immediately_and_queues_pass() {
    let mut board = Board::builder().open().unwrap();

    let position = board
        .deliver(EventKind::Issuance, raw_issuance(1, 5, "X"))
        .unwrap();
    assert_eq!(position, 0);
    assert_eq!(board.store().len(), 1);
    assert_eq!(board.pending_passes(), 1);
    assert_eq!(board.views().log_len, 0);

    let views = board.flush().await;
    assert_eq!(board.pending_passes(), 0);
    assert_eq!(views.log_len, 1);
    assert_eq!(bounty_ids(&views), vec![1]);
}

#[tokio::test]
async fn test_lifecycle_through_board() {
    let mut board = Board::builder().open().unwrap();
    board.deliver(EventKind::Issuance, raw_issuance(1, 5, "X")).unwrap();
    board.deliver(EventKind::Issuance, raw_issuance(2, 8, "Z")).unwrap();
    board.deliver(EventKind::Fulfilment, raw_fulfilment(1, 1, "Y")).unwrap();
    board.deliver(EventKind::Fulfilment, raw_fulfilment(2, 1, "W")).unwrap();
    board.deliver(EventKind::Acceptance, raw_acceptance(2, 1)).unwrap();

    let views = board.flush().await;
    assert_eq!(bounty_ids(&views), vec![1]);
    assert_eq!(fulfilment_ids(&views), vec![(1, 1)]);

    board.deliver(EventKind::Cancellation, raw_cancellation(1)).unwrap();
    let views = board.flush().await;
    assert!(views.open_bounties.is_empty());
    assert!(views.valid_fulfilments.is_empty());
    assert_eq!(views.log_len, 6);
}

#[tokio::test]
async fn test_failed_lookup_degrades_to_raw_reference() {
    let store = MemoryContentStore::new();
    store.insert(CID_A, json!({"bountyData": "unreachable"}));
    store.fail(CID_A);
    let mut board = board_with(&store, Duration::from_secs(1));

    board.deliver(EventKind::Issuance, raw_issuance(1, 5, CID_A)).unwrap();
    let views = board.flush().await;

    let bounty = &views.open_bounties[0];
    assert_eq!(bounty.bounty_id.0, 1);
    assert_eq!(bounty.bounty_data, CID_A);
    assert_eq!(bounty.ipfs_data, NO_EXTERNAL_DATA);
}

#[tokio::test]
async fn test_resolved_lookup_is_displayed() {
    let store = MemoryContentStore::new();
    store.insert(CID_A, json!({"bountyData": "port the parser"}));
    store.insert(CID_B, json!({"fulfilmentData": "parser ported"}));
    let mut board = board_with(&store, Duration::from_secs(1));

    board.deliver(EventKind::Issuance, raw_issuance(1, 5, CID_A)).unwrap();
    board.deliver(EventKind::Fulfilment, raw_fulfilment(1, 1, CID_B)).unwrap();
    let views = board.flush().await;

    assert_eq!(views.open_bounties[0].bounty_data, "port the parser");
    assert_eq!(views.open_bounties[0].ipfs_data, CID_A);
    assert_eq!(views.valid_fulfilments[0].fulfilment_data, "parser ported");
    assert_eq!(views.valid_fulfilments[0].ipfs_data, CID_B);
}

#[tokio::test(start_paused = true)]
async fn test_passes_publish_in_append_order() {
    let store = MemoryContentStore::new();
    store.insert(CID_A, json!({"bountyData": "first"}));
    store.insert(CID_B, json!({"bountyData": "second"}));
    store.delay(CID_A, Duration::from_secs(3));
    let mut board = board_with(&store, Duration::from_secs(10));

    board.deliver(EventKind::Issuance, raw_issuance(1, 5, CID_A)).unwrap();
    board.deliver(EventKind::Issuance, raw_issuance(2, 7, CID_B)).unwrap();

    let first = board.process_next().await.unwrap();
    assert_eq!(first.log_len, 1);
    assert_eq!(bounty_ids(&first), vec![1]);
    assert_eq!(first.open_bounties[0].bounty_data, "first");

    let second = board.process_next().await.unwrap();
    assert_eq!(second.log_len, 2);
    assert_eq!(bounty_ids(&second), vec![1, 2]);
    assert_eq!(second.open_bounties[1].bounty_data, "second");

    assert!(board.process_next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_slow_lookup_times_out_without_stalling() {
    let store = MemoryContentStore::new();
    store.insert(CID_A, json!({"bountyData": "too slow"}));
    store.insert(CID_B, json!({"bountyData": "fast"}));
    store.delay(CID_A, Duration::from_secs(3600));
    let mut board = board_with(&store, Duration::from_secs(2));

    board.deliver(EventKind::Issuance, raw_issuance(1, 5, CID_A)).unwrap();
    board.deliver(EventKind::Issuance, raw_issuance(2, 5, CID_B)).unwrap();

    let start = tokio::time::Instant::now();
    let views = board.flush().await;
    assert!(start.elapsed() < Duration::from_secs(3600));

    assert_eq!(views.open_bounties[0].bounty_data, CID_A);
    assert_eq!(views.open_bounties[0].ipfs_data, "none");
    assert_eq!(views.open_bounties[1].bounty_data, "fast");
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let mut board = Board::builder().open().unwrap();

    let err = board
        .deliver(EventKind::Fulfilment, RawEvent::new(json!({"bounty_id": "1"})))
        .unwrap_err();
    assert!(matches!(err, RecordError::MissingField { .. }));
    assert!(board.store().is_empty());
    assert_eq!(board.pending_passes(), 0);
}

#[tokio::test]
async fn test_subscriber_receives_consistent_views() {
    let mut board = Board::builder().open().unwrap();
    let mut subscriber = board.subscribe();

    board.deliver(EventKind::Issuance, raw_issuance(1, 5, "X")).unwrap();
    board.deliver(EventKind::Fulfilment, raw_fulfilment(1, 1, "Y")).unwrap();
    board.flush().await;

    let views = subscriber.changed().await.unwrap();
    assert_eq!(views.log_len, 2);
    assert_eq!(bounty_ids(&views), vec![1]);
    assert_eq!(fulfilment_ids(&views), vec![(1, 1)]);
}

#[tokio::test]
async fn test_run_replays_ledger_history() {
    let ledger = MemoryLedger::new();
    ledger.emit(EventKind::Issuance, raw_issuance(1, 5, "X"));
    ledger.emit(EventKind::Fulfilment, raw_fulfilment(1, 1, "Y"));
    ledger.emit(EventKind::Issuance, raw_issuance(2, 5, "Z"));
    ledger.emit(EventKind::Cancellation, raw_cancellation(2));
    ledger.emit_error(
        EventKind::Fulfilment,
        SubscriptionError::Transport("connection reset".into()),
    );
    ledger.emit(EventKind::Acceptance, RawEvent::new(json!({"bounty_id": "1"})));
    ledger.close();

    let mut board = Board::builder().open().unwrap();
    let views = board.run(&ledger).await;

    assert_eq!(board.store().len(), 4);
    assert_eq!(views.log_len, 4);
    assert_eq!(bounty_ids(&views), vec![1]);
    assert_eq!(fulfilment_ids(&views), vec![(1, 1)]);
}

#[tokio::test]
async fn test_run_consumes_live_events() {
    let ledger = MemoryLedger::new();
    ledger.emit(EventKind::Issuance, raw_issuance(1, 5, "X"));

    let mut board = Board::builder().open().unwrap();
    let feeder = async {
        tokio::task::yield_now().await;
        ledger.emit(EventKind::Cancellation, raw_cancellation(1));
        ledger.emit(EventKind::Issuance, raw_issuance(2, 9, "Z"));
        ledger.close();
    };

    let (views, ()) = tokio::join!(board.run(&ledger), feeder);
    assert_eq!(bounty_ids(&views), vec![2]);
    assert_eq!(views.log_len, 3);
}

#[tokio::test]
async fn test_journal_restores_views() {
    let dir = tempdir().unwrap();
    {
        let mut board = Board::builder().journal(dir.path()).open().unwrap();
        board
            .deliver(EventKind::Issuance, raw_issuance(1, 5, "X").with_block(10))
            .unwrap();
        board
            .deliver(EventKind::Issuance, raw_issuance(2, 5, "Z").with_block(11))
            .unwrap();
        board
            .deliver(EventKind::Cancellation, raw_cancellation(2).with_block(12))
            .unwrap();
        board.shutdown().await;
    }

    let mut board = Board::builder().journal(dir.path()).open().unwrap();
    assert_eq!(board.store().len(), 3);
    assert_eq!(board.pending_passes(), 3);
    assert_eq!(board.resume_block(EventKind::Issuance), 11);
    assert_eq!(board.resume_block(EventKind::Cancellation), 12);
    assert_eq!(board.resume_block(EventKind::Fulfilment), 0);

    let views = board.flush().await;
    assert_eq!(bounty_ids(&views), vec![1]);
}

#[tokio::test]
async fn test_second_board_on_same_journal_fails() {
    let dir = tempdir().unwrap();
    let _board = Board::builder().journal(dir.path()).open().unwrap();

    match Board::builder().journal(dir.path()).open() {
        Err(BoardError::Journal(e)) => assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("second board should not acquire the journal"),
    }
}

#[tokio::test]
async fn test_resume_absorbs_redelivered_events() {
    let dir = tempdir().unwrap();
    let ledger = MemoryLedger::new();
    ledger.emit(EventKind::Issuance, raw_issuance(1, 5, CID_A).with_block(5));
    ledger.emit(EventKind::Issuance, raw_issuance(2, 5, CID_B).with_block(6));
    ledger.close();

    {
        let mut board = Board::builder().journal(dir.path()).open().unwrap();
        board.run(&ledger).await;
        board.shutdown().await;
    }

    let ledger = MemoryLedger::new();
    ledger.emit(EventKind::Issuance, raw_issuance(1, 5, CID_A).with_block(5));
    ledger.emit(EventKind::Issuance, raw_issuance(2, 5, CID_B).with_block(6));
    ledger.emit(EventKind::Issuance, raw_issuance(3, 5, CID_C).with_block(7));
    ledger.close();

    let mut board = Board::builder().journal(dir.path()).open().unwrap();
    assert_eq!(board.resume_block(EventKind::Issuance), 6);
    let views = board.run(&ledger).await;

    // block 6 is delivered again, block 5 is not
    assert_eq!(board.store().len(), 4);
    assert_eq!(bounty_ids(&views), vec![1, 2, 3]);

    // the redelivered block 6 issuance is not journaled a second time
    let journaled = board.journal().unwrap().read_all().unwrap();
    assert_eq!(journaled.len(), 3);
    board.shutdown().await;

    let board = Board::builder().journal(dir.path()).open().unwrap();
    assert_eq!(board.store().len(), 3);
    assert_eq!(board.resume_block(EventKind::Issuance), 7);
}

#[tokio::test]
async fn test_restart_replays_kinds_behind_the_newest_block() {
    let dir = tempdir().unwrap();

    // the cancellation at block 6 had not arrived when the board stopped
    let partial = MemoryLedger::new();
    partial.emit(EventKind::Issuance, raw_issuance(1, 5, "X").with_block(5));
    partial.emit(EventKind::Issuance, raw_issuance(2, 5, "Z").with_block(7));
    partial.close();
    {
        let mut board = Board::builder().journal(dir.path()).open().unwrap();
        board.run(&partial).await;
        board.shutdown().await;
    }

    let ledger = MemoryLedger::new();
    ledger.emit(EventKind::Issuance, raw_issuance(1, 5, "X").with_block(5));
    ledger.emit(EventKind::Cancellation, raw_cancellation(1).with_block(6));
    ledger.emit(EventKind::Issuance, raw_issuance(2, 5, "Z").with_block(7));
    ledger.close();

    let mut board = Board::builder().journal(dir.path()).open().unwrap();
    assert_eq!(board.resume_block(EventKind::Issuance), 7);
    assert_eq!(board.resume_block(EventKind::Cancellation), 0);
    let restarted = board.run(&ledger).await;

    let mut fresh = Board::builder().open().unwrap();
    let from_genesis = fresh.run(&ledger).await;

    assert_eq!(bounty_ids(&restarted), vec![2]);
    assert_eq!(bounty_ids(&restarted), bounty_ids(&from_genesis));
}

#[tokio::test]
async fn test_config_from_block_sets_resume_point() {
    let config = Config {
        from_block: 100,
        ..Config::default()
    };
    let ledger = MemoryLedger::new();
    ledger.emit(EventKind::Issuance, raw_issuance(1, 5, "old").with_block(50));
    ledger.emit(EventKind::Issuance, raw_issuance(2, 5, "new").with_block(150));
    ledger.close();

    let mut board = Board::builder().config(config).open().unwrap();
    assert_eq!(board.resume_block(EventKind::Issuance), 100);
    let views = board.run(&ledger).await;
    assert_eq!(bounty_ids(&views), vec![2]);
}
