//! End-to-end board behaviour against in-process gateways.

mod common;

use std::sync::Arc;

use common::*;
use kanban_board::{BoardConfig, BoardError, BoardEvent, FetchOutcome, MoveOutcome, SkipReason};
use kanban_gateway::StageFilter;
use kanban_models::{ContactId, Stage};

fn new() -> Stage {
    Stage::value("New")
}

fn qualified() -> Stage {
    Stage::value("Qualified")
}

fn won() -> Stage {
    Stage::value("Won")
}

#[tokio::test]
async fn test_pages_accumulate_until_total_is_reached() {
    let gateway = Arc::new(ScriptedGateway::new(vec![pipeline()]));
    let filter = StageFilter::Value("New".into());
    gateway.script(
        &filter,
        1,
        vec![contact("1", "Ana", Some("New")), contact("2", "Bruno", Some("New"))],
        Some(5),
    );
    gateway.script(
        &filter,
        2,
        vec![
            contact("3", "Caio", Some("New")),
            contact("4", "Davi", Some("New")),
            contact("5", "Eva", Some("New")),
        ],
        Some(5),
    );
    let board = board(gateway.clone(), BoardConfig::default());

    board.select_attribute(None).await.unwrap();
    assert_eq!(board.contacts_for(&new()).len(), 2);
    assert!(board.has_more(&new()));
    assert_eq!(board.total_for(&new()), Some(5));

    let outcome = board.request_more(&new()).await.unwrap();
    assert_eq!(
        outcome,
        FetchOutcome::Loaded {
            count: 3,
            has_more: false
        }
    );
    assert_eq!(ids(&board.contacts_for(&new())), vec!["1", "2", "3", "4", "5"]);
    assert!(!board.has_more(&new()));

    assert_eq!(
        board.request_more(&new()).await.unwrap(),
        FetchOutcome::Skipped(SkipReason::Exhausted)
    );
    let new_calls = gateway
        .calls()
        .iter()
        .filter(|q| q.filter == filter)
        .count();
    assert_eq!(new_calls, 2);
}

#[tokio::test]
async fn test_initial_load_classifies_every_contact() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default());

    let stages = board.select_attribute(None).await.unwrap();

    assert_eq!(stages, vec![new(), qualified(), won(), Stage::Unassigned]);
    assert_eq!(ids(&board.contacts_for(&new())), vec!["1", "2", "R7", "10"]);
    assert_eq!(ids(&board.contacts_for(&qualified())), vec!["4", "5"]);
    assert_eq!(ids(&board.contacts_for(&won())), vec!["6"]);
    assert_eq!(
        sorted_ids(&board.contacts_for(&Stage::Unassigned)),
        vec!["7", "8", "9"]
    );
    assert!(stages.iter().all(|s| !board.has_more(s)));
    assert_eq!(board.display_name(&Stage::Unassigned), "Unassigned");
}

#[tokio::test]
async fn test_concurrent_requests_for_one_stage_issue_one_fetch() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default().with_page_size(1));
    board.select_attribute(None).await.unwrap();
    assert!(board.has_more(&new()));

    gateway.pause(PIPELINE);
    let first = {
        let board = Arc::clone(&board);
        tokio::spawn(async move { board.request_more(&new()).await })
    };
    wait_for_flight(&gateway).await;

    assert!(board.is_loading(&new()));
    assert_eq!(
        board.request_more(&new()).await.unwrap(),
        FetchOutcome::Skipped(SkipReason::Busy)
    );
    assert_eq!(
        board.fetch_page(&new()).await.unwrap(),
        FetchOutcome::Skipped(SkipReason::Busy)
    );

    gateway.resume(PIPELINE);
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, FetchOutcome::Loaded { count: 1, .. }));
    assert!(!board.is_loading(&new()));
    assert_eq!(ids(&board.contacts_for(&new())), vec!["1", "2"]);
    assert_eq!(gateway.stats().max_in_flight["pipeline/New"], 1);
}

#[tokio::test]
async fn test_different_stages_fetch_concurrently() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default().with_page_size(1));
    board.select_attribute(None).await.unwrap();

    gateway.pause(PIPELINE);
    let spawn = |stage: Stage| {
        let board = Arc::clone(&board);
        tokio::spawn(async move { board.request_more(&stage).await })
    };
    let a = spawn(new());
    let b = spawn(qualified());
    while gateway.stats().in_flight_total() < 2 {
        tokio::task::yield_now().await;
    }
    assert!(board.is_loading(&new()));
    assert!(board.is_loading(&qualified()));

    gateway.resume(PIPELINE);
    assert!(matches!(a.await.unwrap().unwrap(), FetchOutcome::Loaded { .. }));
    assert!(matches!(b.await.unwrap().unwrap(), FetchOutcome::Loaded { .. }));
    assert_eq!(ids(&board.contacts_for(&qualified())), vec!["4", "5"]);
}

#[tokio::test]
async fn test_load_all_exhausts_stage() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default().with_page_size(1));
    board.select_attribute(None).await.unwrap();

    let received = board.load_all(&new()).await.unwrap();

    assert_eq!(received, 3);
    assert_eq!(board.contacts_for(&new()).len(), 4);
    assert!(!board.has_more(&new()));
}

#[tokio::test]
async fn test_page_for_superseded_attribute_is_discarded() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default().with_page_size(1));
    board.select_attribute(None).await.unwrap();

    gateway.pause(PIPELINE);
    let late = {
        let board = Arc::clone(&board);
        tokio::spawn(async move { board.request_more(&new()).await })
    };
    wait_for_flight(&gateway).await;

    let stages = board.select_attribute(Some("priority")).await.unwrap();
    gateway.resume(PIPELINE);

    assert_eq!(late.await.unwrap().unwrap(), FetchOutcome::Discarded);
    assert_eq!(board.active_attribute().unwrap().key, "priority");
    assert_eq!(ids(&board.contacts_for(&Stage::value("High"))), vec!["9"]);
    assert_eq!(ids(&board.contacts_for(&Stage::value("Low"))), vec!["10"]);
    for stage in &stages {
        assert!(!board.is_loading(stage));
        assert!(board.contacts_for(stage).iter().all(|c| c.id.as_str() != "2"));
    }
    assert!(board.contacts_for(&new()).is_empty());
}

#[tokio::test]
async fn test_aborted_fetch_releases_stage() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default().with_page_size(1));
    board.select_attribute(None).await.unwrap();

    gateway.pause(PIPELINE);
    let fetch = {
        let board = Arc::clone(&board);
        tokio::spawn(async move { board.request_more(&new()).await })
    };
    wait_for_flight(&gateway).await;
    assert!(board.is_loading(&new()));

    fetch.abort();
    assert!(fetch.await.unwrap_err().is_cancelled());
    assert!(!board.is_loading(&new()));

    gateway.resume(PIPELINE);
    let outcome = board.request_more(&new()).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Loaded { count: 1, .. }));
    assert_eq!(ids(&board.contacts_for(&new())), vec!["1", "2"]);
}

#[tokio::test]
async fn test_filter_rejection_for_superseded_attribute_is_ignored() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default().with_page_size(1));
    board.select_attribute(None).await.unwrap();

    gateway.pause(PIPELINE);
    let late = {
        let board = Arc::clone(&board);
        tokio::spawn(async move { board.request_more(&new()).await })
    };
    wait_for_flight(&gateway).await;

    let stages = board.select_attribute(Some("priority")).await.unwrap();
    let mut events = board.subscribe();
    gateway.set_reject_filters(true);
    gateway.resume(PIPELINE);

    assert_eq!(late.await.unwrap().unwrap(), FetchOutcome::Discarded);
    assert!(!board.is_degraded());
    assert!(stages.iter().all(|s| !board.is_loading(s)));
    assert!(!drain(&mut events)
        .iter()
        .any(|e| matches!(e, BoardEvent::DegradedMode { .. })));
}

#[tokio::test]
async fn test_filter_rejection_switches_to_local_partitioning() {
    let gateway = memory_gateway();
    gateway.set_reject_filters(true);
    let board = board(gateway.clone(), BoardConfig::default());
    let mut events = board.subscribe();

    board.select_attribute(None).await.unwrap();

    assert!(board.is_degraded());
    assert_eq!(
        sorted_ids(&board.contacts_for(&new())),
        vec!["1", "10", "2", "R7"]
    );
    assert_eq!(ids(&board.contacts_for(&qualified())), vec!["4", "5"]);
    assert_eq!(ids(&board.contacts_for(&won())), vec!["6"]);
    assert_eq!(
        sorted_ids(&board.contacts_for(&Stage::Unassigned)),
        vec!["7", "8", "9"]
    );
    assert_eq!(gateway.stats().list_calls_for(&StageFilter::Any), 1);
    assert!(board.stages().iter().all(|s| !board.has_more(s)));

    let degraded = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, BoardEvent::DegradedMode { .. }))
        .count();
    assert_eq!(degraded, 1);
    assert!(board.snapshot().unwrap().degraded);
}

#[tokio::test]
async fn test_move_is_visible_and_persisted() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default());
    board.select_attribute(None).await.unwrap();
    let mut events = board.subscribe();

    // Edited elsewhere after the board loaded.
    gateway.upsert_contact(contact("11", "Kai", Some("Won")));

    let id = ContactId::from("1");
    let outcome = board.move_contact(&id, &new(), &won()).await.unwrap();

    assert_eq!(outcome, MoveOutcome::Moved);
    assert_eq!(ids(&board.contacts_for(&new())), vec!["2", "R7", "10"]);
    assert_eq!(sorted_ids(&board.contacts_for(&won())), vec!["1", "11", "6"]);
    assert_eq!(gateway.contact(&id).unwrap().stage_value(PIPELINE), Some("Won"));

    let events = drain(&mut events);
    assert!(matches!(events[0], BoardEvent::ContactMoved { .. }));
    assert!(events
        .iter()
        .any(|e| matches!(e, BoardEvent::MoveConfirmed { .. })));

    // The refresh that pulled in "11" is announced for both stages.
    let loaded: Vec<(Stage, usize)> = events
        .iter()
        .filter_map(|e| match e {
            BoardEvent::StageLoaded { stage, loaded, .. } => Some((stage.clone(), *loaded)),
            _ => None,
        })
        .collect();
    assert!(loaded.contains(&(won(), 3)));
    assert!(loaded.contains(&(new(), 3)));
}

#[tokio::test]
async fn test_degraded_move_refreshes_once() {
    let gateway = memory_gateway();
    gateway.set_reject_filters(true);
    let board = board(gateway.clone(), BoardConfig::default());
    board.select_attribute(None).await.unwrap();
    assert!(board.is_degraded());
    let unfiltered = gateway.stats().list_calls_for(&StageFilter::Any);
    let mut events = board.subscribe();

    gateway.upsert_contact(contact("11", "Kai", Some("Qualified")));
    board
        .move_contact(&ContactId::from("1"), &new(), &won())
        .await
        .unwrap();

    assert_eq!(gateway.stats().list_calls_for(&StageFilter::Any), unfiltered + 1);
    assert_eq!(sorted_ids(&board.contacts_for(&qualified())), vec!["11", "4", "5"]);

    let mut refreshed: Vec<Stage> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            BoardEvent::StageLoaded { stage, .. } => Some(stage),
            _ => None,
        })
        .collect();
    refreshed.dedup();
    assert_eq!(refreshed, board.stages());
}

#[tokio::test]
async fn test_move_without_reconciliation_skips_refresh() {
    let gateway = memory_gateway();
    let board = board(
        gateway.clone(),
        BoardConfig::default().with_reconcile_after_move(false),
    );
    board.select_attribute(None).await.unwrap();
    let calls = gateway.stats().list_calls.len();

    board
        .move_contact(&ContactId::from("6"), &won(), &Stage::Unassigned)
        .await
        .unwrap();

    assert_eq!(gateway.stats().list_calls.len(), calls);
    assert_eq!(gateway.stats().write_calls, 1);
    assert!(board.contacts_for(&won()).is_empty());
}

#[tokio::test]
async fn test_move_within_stage_is_a_noop() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default());
    board.select_attribute(None).await.unwrap();
    let before = board.contacts_for(&new());

    let outcome = board
        .move_contact(&ContactId::from("2"), &new(), &new())
        .await
        .unwrap();

    assert_eq!(outcome, MoveOutcome::Unchanged);
    assert_eq!(gateway.stats().write_calls, 0);
    assert_eq!(ids(&board.contacts_for(&new())), ids(&before));
}

#[tokio::test]
async fn test_failed_move_is_reverted() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default());
    board.select_attribute(None).await.unwrap();
    let mut events = board.subscribe();
    gateway.set_fail_writes(true);

    let err = board
        .move_contact(&ContactId::from("R7"), &new(), &qualified())
        .await
        .unwrap_err();

    assert!(matches!(err, BoardError::MutationConflict { .. }));
    assert_eq!(ids(&board.contacts_for(&new())), vec!["1", "2", "R7", "10"]);
    assert_eq!(ids(&board.contacts_for(&qualified())), vec!["4", "5"]);

    let fresh = common::board(gateway.clone(), BoardConfig::default());
    fresh.select_attribute(None).await.unwrap();
    for stage in board.stages() {
        assert_eq!(
            sorted_ids(&board.contacts_for(&stage)),
            sorted_ids(&fresh.contacts_for(&stage)),
            "stage {} differs from a fresh load",
            stage
        );
    }

    let failures: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, BoardEvent::MoveFailed { .. }))
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].notification().unwrap().contains("Rita"));
}

#[tokio::test]
async fn test_failure_notifications_use_display_labels() {
    let gateway = memory_gateway();
    let config = BoardConfig::default().with_unassigned_label("Não Atribuído");
    let board = board(gateway.clone(), config);
    board.select_attribute(None).await.unwrap();
    let mut events = board.subscribe();

    gateway.set_fail_writes(true);
    board
        .move_contact(&ContactId::from("6"), &won(), &Stage::Unassigned)
        .await
        .unwrap_err();

    gateway.set_fail_lists(true);
    board.fetch_page(&Stage::Unassigned).await.unwrap_err();

    let notifications: Vec<String> = drain(&mut events)
        .iter()
        .filter_map(BoardEvent::notification)
        .collect();
    assert!(notifications
        .iter()
        .any(|n| n.starts_with("Could not move Fabio to 'Não Atribuído'")));
    assert!(notifications
        .iter()
        .any(|n| n.starts_with("Could not load 'Não Atribuído'")));
}

#[tokio::test]
async fn test_failed_move_after_attribute_switch_leaves_new_session_alone() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default());
    board.select_attribute(None).await.unwrap();
    gateway.set_fail_writes(true);
    gateway.pause(PIPELINE);

    let pending = {
        let board = Arc::clone(&board);
        tokio::spawn(async move {
            board
                .move_contact(&ContactId::from("R7"), &new(), &qualified())
                .await
        })
    };
    while gateway.stats().write_calls == 0 {
        tokio::task::yield_now().await;
    }

    let stages = board.select_attribute(Some("priority")).await.unwrap();
    let mut events = board.subscribe();
    gateway.resume(PIPELINE);

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, BoardError::MutationConflict { .. }));

    assert_eq!(board.active_attribute().unwrap().key, "priority");
    assert!(board.contacts_for(&new()).is_empty());
    let copies: Vec<_> = stages
        .iter()
        .flat_map(|s| board.contacts_for(s))
        .filter(|c| c.id.as_str() == "R7")
        .collect();
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].stage_value(PIPELINE), Some("New"));

    let failures = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, BoardEvent::MoveFailed { .. }))
        .count();
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn test_move_from_wrong_stage_changes_nothing() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default());
    board.select_attribute(None).await.unwrap();

    let err = board
        .move_contact(&ContactId::from("4"), &new(), &won())
        .await
        .unwrap_err();

    assert!(matches!(err, BoardError::PreconditionFailed { .. }));
    assert_eq!(gateway.stats().write_calls, 0);
    assert_eq!(ids(&board.contacts_for(&qualified())), vec!["4", "5"]);
}

#[tokio::test]
async fn test_fetch_failure_keeps_cursor_and_can_retry() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default().with_page_size(2));
    board.select_attribute(None).await.unwrap();
    assert_eq!(board.contacts_for(&new()).len(), 2);
    let mut events = board.subscribe();

    gateway.set_fail_lists(true);
    let err = board.request_more(&new()).await.unwrap_err();
    assert!(matches!(err, BoardError::TransientFetch { .. }));
    assert!(board.stage_error(&new()).is_some());
    assert!(board.has_more(&new()));
    assert!(!board.is_loading(&new()));
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, BoardEvent::StageFetchFailed { .. })));

    gateway.set_fail_lists(false);
    let outcome = board.request_more(&new()).await.unwrap();
    assert_eq!(
        outcome,
        FetchOutcome::Loaded {
            count: 2,
            has_more: false
        }
    );
    assert!(board.stage_error(&new()).is_none());
    assert_eq!(board.contacts_for(&new()).len(), 4);
}

#[tokio::test]
async fn test_no_list_attribute_makes_board_unusable() {
    let gateway = Arc::new(kanban_gateway::MemoryGateway::default());
    let board = board(gateway, BoardConfig::default());
    let mut events = board.subscribe();

    let err = board.select_attribute(None).await.unwrap_err();

    assert!(matches!(err, BoardError::Configuration(_)));
    assert!(board.stages().is_empty());
    assert!(board.snapshot().is_none());
    assert!(matches!(
        drain(&mut events).as_slice(),
        [BoardEvent::BoardUnusable { .. }]
    ));
}

#[tokio::test]
async fn test_preferred_attribute_from_config() {
    let gateway = memory_gateway();
    let config = BoardConfig::default().with_preferred_attribute(Some("priority".into()));
    let board = board(gateway.clone(), config);

    board.select_attribute(None).await.unwrap();
    assert_eq!(board.active_attribute().unwrap().key, "priority");

    // An explicit choice overrides the configured one; an unknown one falls
    // back to the first attribute.
    board.select_attribute(Some(PIPELINE)).await.unwrap();
    assert_eq!(board.active_attribute().unwrap().key, PIPELINE);
    board.select_attribute(Some("missing")).await.unwrap();
    assert_eq!(board.active_attribute().unwrap().key, PIPELINE);
}

#[tokio::test]
async fn test_reload_picks_up_external_changes() {
    let gateway = memory_gateway();
    let board = board(gateway.clone(), BoardConfig::default());
    board.select_attribute(Some("priority")).await.unwrap();

    gateway.upsert_contact(contact("1", "Ana", Some("New")).with_attribute("priority", "High"));
    board.reload().await.unwrap();

    assert_eq!(board.active_attribute().unwrap().key, "priority");
    assert_eq!(sorted_ids(&board.contacts_for(&Stage::value("High"))), vec!["1", "9"]);
}

#[tokio::test]
async fn test_snapshot_serializes() {
    let gateway = memory_gateway();
    let board = board(gateway, BoardConfig::default());
    board.select_attribute(None).await.unwrap();

    let json = serde_json::to_value(board.snapshot().unwrap()).unwrap();
    assert_eq!(json["attribute_key"], "pipeline");
    assert_eq!(json["stages"].as_array().unwrap().len(), 4);
    assert_eq!(json["stages"][3]["label"], "Unassigned");
    assert_eq!(json["stages"][0]["state"], "exhausted");
}
