//! Shared timer synchronization between concurrently-connected clients.

mod helpers;

use chrono::Duration;

use studyhub_entity::timer::{RoomTimerState, TimerMode};
use studyhub_store::paths;
use studyhub_sync::SyncEvent;

use helpers::{TestWorld, wait_for_event};

#[tokio::test]
async fn test_start_is_visible_to_every_client() {
    let world = TestWorld::new();
    let alice = world.join("alice").await;
    let bob = world.join("bob").await;
    let mut bob_events = bob.events();

    alice.timer().start().await.expect("start");

    let event = wait_for_event(&mut bob_events, |e| {
        matches!(e, SyncEvent::TimerChanged { state } if state.is_active)
    })
    .await;
    let SyncEvent::TimerChanged { state } = event else {
        unreachable!();
    };
    assert_eq!(state.mode, TimerMode::Study);
    assert_eq!(state.time, 1500);
    assert!(state.start_time.is_some());
}

#[tokio::test]
async fn test_clients_derive_the_same_countdown() {
    let world = TestWorld::new();
    let alice = world.join("alice").await;
    let bob = world.join("bob").await;

    alice.timer().start().await.expect("start");
    world.clock.advance(Duration::seconds(100));

    // Both clients derive from the same document and the same server clock.
    let from_alice = alice.timer().current().await.expect("current");
    let from_bob = bob.timer().current().await.expect("current");
    assert_eq!(from_alice.remaining_at(world.store.now()), 1400);
    assert_eq!(from_bob.remaining_at(world.store.now()), 1400);
}

#[tokio::test]
async fn test_pause_freezes_the_same_value_everywhere() {
    let world = TestWorld::new();
    let alice = world.join("alice").await;
    let bob = world.join("bob").await;
    let mut bob_events = bob.events();

    alice.timer().start().await.expect("start");
    world.clock.advance(Duration::seconds(250));
    bob.timer().pause().await.expect("pause");

    let event = wait_for_event(&mut bob_events, |e| {
        matches!(e, SyncEvent::TimerChanged { state } if !state.is_active && state.time != 1500)
    })
    .await;
    let SyncEvent::TimerChanged { state } = event else {
        unreachable!();
    };
    assert_eq!(state.time, 1250);
    assert_eq!(state.start_time, None);
    assert_eq!(
        alice.timer().current().await.expect("current").time,
        1250,
        "both clients must display the frozen value"
    );
}

#[tokio::test]
async fn test_concurrent_completion_converges_to_one_transition() {
    let world = TestWorld::new();
    let alice = world.join("alice").await;
    let bob = world.join("bob").await;
    let mut bob_events = bob.events();

    alice.timer().start().await.expect("start");
    wait_for_event(&mut bob_events, |e| {
        matches!(e, SyncEvent::TimerChanged { state } if state.is_active)
    })
    .await;

    // Jump past the end of the study phase: both display loops derive zero
    // and both write the identical completion document.
    world.clock.advance(Duration::seconds(1501));

    let event = wait_for_event(&mut bob_events, |e| {
        matches!(e, SyncEvent::TimerChanged { state } if state.mode == TimerMode::ShortBreak)
    })
    .await;
    let SyncEvent::TimerChanged { state } = event else {
        unreachable!();
    };
    assert!(!state.is_active);
    assert_eq!(state.time, 300);
    assert_eq!(state.completed_study_sessions, 1);

    // The store converged on the same document regardless of which client
    // won the write race.
    let stored: RoomTimerState = serde_json::from_value(
        world
            .store
            .read(&paths::timer(world.room))
            .expect("timer document"),
    )
    .expect("parse");
    assert_eq!(stored.mode, TimerMode::ShortBreak);
    assert_eq!(stored.time, 300);
    assert!(!stored.is_active);
    assert_eq!(stored.completed_study_sessions, 1);
}

#[tokio::test]
async fn test_late_joiner_adopts_the_existing_document() {
    let world = TestWorld::new();
    let alice = world.join("alice").await;
    alice
        .timer()
        .switch_mode(TimerMode::LongBreak)
        .await
        .expect("switch");

    // A later joiner must not reset the room's timer.
    let bob = world.join("bob").await;
    let state = bob.timer().current().await.expect("current");
    assert_eq!(state.mode, TimerMode::LongBreak);
    assert_eq!(state.time, 900);
}
