//! Time accounting across the mirror and the ledger.

mod helpers;

use std::time::Duration;

use studyhub_store::paths;
use studyhub_sync::SyncEvent;

use helpers::{TestWorld, wait_for_event};

#[tokio::test]
async fn test_ticks_reach_the_ledger_exactly_once() {
    let world = TestWorld::new();
    let session = world.join("alice").await;

    session.accounting().start_session().await;
    for _ in 0..12 {
        session.accounting().record_tick().await;
    }
    session.leave().await;

    assert_eq!(world.ledger.total_minutes("alice"), 12);
}

#[tokio::test]
async fn test_failed_flush_converges_without_loss_or_double_count() {
    let world = TestWorld::new();
    let session = world.join("alice").await;
    session.accounting().start_session().await;

    // The flush at the threshold gets rejected by the ledger.
    world.ledger.fail_next_updates(1);
    for _ in 0..5 {
        session.accounting().record_tick().await;
    }
    assert_eq!(world.ledger.total_minutes("alice"), 0);
    assert_eq!(session.accounting().unflushed_minutes(), 5);

    // Ticking on retries the pending batch under the same idempotency key.
    for _ in 0..5 {
        session.accounting().record_tick().await;
    }
    session.leave().await;

    assert_eq!(world.ledger.total_minutes("alice"), 10);
}

#[tokio::test]
async fn test_leave_flushes_minutes_below_the_threshold() {
    let world = TestWorld::new();
    let session = world.join("alice").await;
    session.accounting().start_session().await;

    for _ in 0..3 {
        session.accounting().record_tick().await;
    }
    assert_eq!(world.ledger.total_minutes("alice"), 0);

    session.leave().await;
    assert_eq!(world.ledger.total_minutes("alice"), 3);
}

#[tokio::test]
async fn test_mirror_is_visible_to_other_clients() {
    let world = TestWorld::new();
    let session = world.join("alice").await;
    let uid = session.context().identity().uid;

    session.accounting().start_session().await;
    session.accounting().record_tick().await;
    session.accounting().record_tick().await;

    let expected = world.config.accounting.tick_interval_seconds as i64 * 2;
    let mirrored = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(value) = world
                .store
                .read(&paths::room_presence_seconds(world.room, uid))
                && value.as_i64() == Some(expected)
            {
                return value;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("mirror should reach the store");

    assert_eq!(mirrored.as_i64(), Some(expected));
    session.leave().await;
}

#[tokio::test]
async fn test_session_emits_mirror_updates() {
    let world = TestWorld::new();
    let session = world.join("alice").await;
    let mut events = session.events();

    session.accounting().start_session().await;
    session.accounting().record_tick().await;

    let tick = world.config.accounting.tick_interval_seconds;
    let event = wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::StudyMirrorUpdated { .. })
    })
    .await;
    let SyncEvent::StudyMirrorUpdated { accumulated_seconds } = event else {
        unreachable!();
    };
    assert_eq!(accumulated_seconds, tick);
    session.leave().await;
}
