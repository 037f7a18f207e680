//! Room membership, typing indicators, and the stale-participant sweep.

mod helpers;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;

use studyhub_core::traits::store::PresenceStore;
use studyhub_store::paths;
use studyhub_store::paths::MutationIntent;
use studyhub_sync::SyncEvent;
use studyhub_worker::sweep;

use helpers::{TestWorld, wait_for_event};

#[tokio::test]
async fn test_rejoining_does_not_duplicate_the_participant_entry() {
    let world = TestWorld::new();
    let identity = TestWorld::identity("alice");

    let first = world.join_as(identity.clone()).await;
    let second = world.join_as(identity.clone()).await;

    let participants = world
        .store
        .read(&paths::participants(world.room))
        .and_then(|v| v.as_object().map(|m| m.len()))
        .expect("participants present");
    assert_eq!(participants, 1, "same uid must stay a single entry");

    drop(first);
    drop(second);
}

#[tokio::test]
async fn test_participant_changes_reach_other_clients() {
    let world = TestWorld::new();
    let alice = world.join("alice").await;
    let mut events = alice.events();

    let bob = world.join("bob").await;
    wait_for_event(&mut events, |e| match e {
        SyncEvent::ParticipantsChanged { participants } => {
            let names: Vec<&str> = participants.iter().map(|p| p.username.as_str()).collect();
            names == vec!["alice", "bob"]
        }
        _ => false,
    })
    .await;

    bob.leave().await;
    wait_for_event(&mut events, |e| match e {
        SyncEvent::ParticipantsChanged { participants } => {
            participants.len() == 1 && participants[0].username == "alice"
        }
        _ => false,
    })
    .await;
}

#[tokio::test]
async fn test_join_writes_a_heartbeat_before_returning() {
    let world = TestWorld::new();
    let session = world.join("alice").await;
    let uid = session.context().identity().uid;

    // Deliberately no waiting: a sweep can fire between join and the
    // heartbeat loop's first tick, so the first beat must land
    // synchronously with the participant entry.
    assert!(
        world.store.read(&paths::heartbeat(world.room, uid)).is_some(),
        "join must write the first heartbeat itself"
    );

    let worker_conn: Arc<dyn PresenceStore> = world.store.connect();
    let evicted = sweep::sweep_stale_participants(&worker_conn, &world.config.room)
        .await
        .expect("sweep");
    assert_eq!(evicted, 0, "a just-joined member must not be swept");

    session.leave().await;
}

#[tokio::test]
async fn test_typing_indicator_round_trip() {
    let world = TestWorld::new();
    let session = world.join("alice").await;
    let uid = session.context().identity().uid;

    session.set_typing(true).await;
    assert_eq!(
        world.store.read(&paths::typing(world.room, uid)),
        Some(serde_json::Value::Bool(true))
    );

    session.set_typing(false).await;
    assert_eq!(world.store.read(&paths::typing(world.room, uid)), None);
}

#[tokio::test]
async fn test_sweep_evicts_participants_with_stale_heartbeats() {
    let world = TestWorld::new();
    let alice = world.join("alice").await;
    let bob = world.join("bob").await;
    let alice_uid = alice.context().identity().uid;
    let bob_uid = bob.context().identity().uid;

    // Wait for both initial heartbeats to land.
    tokio::time::timeout(StdDuration::from_secs(5), async {
        loop {
            let alive = world.store.read(&paths::heartbeat(world.room, alice_uid)).is_some()
                && world.store.read(&paths::heartbeat(world.room, bob_uid)).is_some();
            if alive {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
    })
    .await
    .expect("initial heartbeats");

    // Time passes with no beats; then only bob manages to refresh.
    world
        .clock
        .advance(Duration::seconds(world.config.room.inactivity_threshold_seconds as i64 + 1));
    let refresh = MutationIntent::WriteHeartbeat {
        room: world.room,
        uid: bob_uid,
        at: world.store.now(),
    }
    .resolve()
    .expect("resolve");
    world.store.apply_write(&refresh).expect("refresh");

    // The worker runs on its own connection, like the cron job does.
    let worker_conn: Arc<dyn PresenceStore> = world.store.connect();
    let evicted = sweep::sweep_stale_participants(&worker_conn, &world.config.room)
        .await
        .expect("sweep");
    assert_eq!(evicted, 1);

    assert!(
        world.store.read(&paths::participant(world.room, alice_uid)).is_none(),
        "alice went silent and must be evicted"
    );
    assert!(
        world.store.read(&paths::room_presence(world.room, alice_uid)).is_none(),
        "eviction also clears the presence record"
    );
    assert!(
        world.store.read(&paths::participant(world.room, bob_uid)).is_some(),
        "bob kept beating and must survive"
    );

    bob.leave().await;
}
