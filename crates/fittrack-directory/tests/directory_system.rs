//! Integration tests for the in-process directory actor: many handles,
//! concurrent writers, cancellation, and simulated latency.

use std::time::Duration;

use fittrack_directory::{DirectoryError, MemoryDirectory, UserDirectory, search_users};
use fittrack_model::{NewUserRecord, Role, UserId, UserPatch};
use tokio::task::JoinSet;

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test]
async fn test_concurrent_inserts_from_many_handles_all_land() {
    let dir = MemoryDirectory::spawn_with_capacity(4);
    let mut tasks = JoinSet::new();

    for i in 0..32 {
        let handle = dir.clone();
        tasks.spawn(async move {
            handle
                .insert(NewUserRecord::customer(UserId::new_v4(), format!("user{i}@x.com")))
                .await
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.expect("task panicked").expect("insert");
    }

    assert_eq!(dir.list_all().await.unwrap().len(), 32);
}

#[tokio::test]
async fn test_racing_inserts_for_one_id_have_one_winner() {
    let dir = MemoryDirectory::spawn();
    let id = UserId::new_v4();
    let mut tasks = JoinSet::new();

    for _ in 0..8 {
        let handle = dir.clone();
        tasks.spawn(async move { handle.insert(NewUserRecord::customer(id, "a@x.com")).await });
    }

    let mut wins = 0;
    let mut duplicates = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => wins += 1,
            Err(DirectoryError::DuplicateId(dup)) => {
                assert_eq!(dup, id);
                duplicates += 1;
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(duplicates, 7);
}

#[tokio::test]
async fn test_cancelled_caller_still_writes() {
    let dir = MemoryDirectory::spawn();
    let new = NewUserRecord::customer(UserId::new_v4(), "a@x.com");
    let id = new.id;

    // One poll sends the command; then the caller gives up on the reply.
    let result = tokio::time::timeout(Duration::ZERO, dir.insert(new)).await;
    assert!(result.is_err(), "insert should still be waiting for its reply");

    // Commands are processed in order, so the select sees the insert.
    let record = dir.select_by_id(id).await.expect("record written");
    assert_eq!(record.email, "a@x.com");
}

// =========================================================================
// Latency
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_latency_delays_every_call() {
    let dir = MemoryDirectory::spawn();
    dir.set_latency(Duration::from_millis(300));

    let start = tokio::time::Instant::now();
    dir.insert(NewUserRecord::customer(UserId::new_v4(), "a@x.com"))
        .await
        .unwrap();
    dir.list_all().await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn test_offline_after_latency_is_network_error() {
    let dir = MemoryDirectory::spawn();
    dir.set_latency(Duration::from_millis(100));
    dir.set_offline(true);

    let err = dir.exists_with_role(Role::Admin).await.unwrap_err();

    assert!(matches!(err, DirectoryError::Network(_)));
}

// =========================================================================
// Admin screen flow
// =========================================================================

#[tokio::test]
async fn test_search_over_listing_matches_name_after_update() {
    let dir = MemoryDirectory::spawn();
    let new = NewUserRecord::customer(UserId::new_v4(), "c@x.com");
    let id = new.id;
    dir.insert(new).await.unwrap();
    dir.insert(NewUserRecord::new(UserId::new_v4(), "boss@x.com", Role::Admin).with_name("Boss"))
        .await
        .unwrap();

    dir.update_by_id(id, UserPatch::default().with_name("Priya Shah"))
        .await
        .unwrap();

    let records = dir.list_all().await.unwrap();
    let hits = search_users(&records, "priya");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);
    assert_eq!(search_users(&records, "  ").len(), 2);
}
