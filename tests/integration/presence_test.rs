//! Presence announcement, dedup, and disconnect cleanup across clients.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use studyhub_core::traits::Clock;
use studyhub_core::traits::ledger::LedgerApi;
use studyhub_entity::presence::CommunityPresenceRecord;
use studyhub_store::paths;
use studyhub_sync::presence::dedup;
use studyhub_sync::{RoomSession, SyncEvent};

use helpers::{TestWorld, wait_for_event};

#[tokio::test]
async fn test_roster_shows_other_clients_as_they_come_online() {
    let world = TestWorld::new();
    let observer = world.join("observer").await;
    let mut events = observer.events();

    let _alice = world.join("alice").await;

    let event = wait_for_event(&mut events, |e| match e {
        SyncEvent::RosterChanged { roster } => roster.iter().any(|r| r.username == "alice"),
        _ => false,
    })
    .await;

    let SyncEvent::RosterChanged { roster } = event else {
        unreachable!();
    };
    let alice = roster.iter().find(|r| r.username == "alice").expect("alice");
    assert!(alice.is_online());
}

#[tokio::test]
async fn test_duplicate_connections_collapse_to_one_roster_entry() {
    let world = TestWorld::new();
    let _observer = world.join("observer").await;

    // Two tabs: same username, separate connections and uids.
    let _tab_one = world.join("alice").await;
    let _tab_two = world.join("alice").await;

    // Wait until all three raw records landed in the feed.
    let records = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = world.store.read(&paths::community());
            let records = dedup::parse_feed(snapshot.as_ref());
            if records.len() == 3 {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("all three announcements should land");

    let roster = dedup::canonical_roster(records);
    assert_eq!(roster.len(), 2, "observer plus one alice, never three");
    assert_eq!(
        roster.iter().filter(|r| r.username == "alice").count(),
        1,
        "two connections must still render as one user"
    );
}

#[tokio::test]
async fn test_disconnect_fires_last_will_cleanup() {
    let world = TestWorld::new();

    // Build the session on a connection the test keeps hold of.
    let conn = world.store.connect();
    let identity = TestWorld::identity("alice");
    let uid = identity.uid;
    let session = RoomSession::join(
        identity,
        world.room,
        conn.clone(),
        Arc::clone(&world.ledger) as Arc<dyn LedgerApi>,
        world.config.clone(),
    )
    .await
    .expect("join");

    // Wait until the announcer has published the presence record.
    let observer = world.join("observer").await;
    let mut events = observer.events();
    wait_for_event(&mut events, |e| match e {
        SyncEvent::RosterChanged { roster } => {
            roster.iter().any(|r| r.username == "alice" && r.is_online())
        }
        _ => false,
    })
    .await;

    conn.simulate_disconnect();

    // Last-will: community record flips offline, room presence disappears.
    let event = wait_for_event(&mut events, |e| match e {
        SyncEvent::RosterChanged { roster } => roster
            .iter()
            .any(|r| r.username == "alice" && !r.is_online()),
        _ => false,
    })
    .await;
    drop(event);

    assert!(
        world.store.read(&paths::room_presence(world.room, uid)).is_none(),
        "room presence record must be gone after the last-will fires"
    );

    drop(session);
}

#[tokio::test]
async fn test_clean_leave_removes_records_explicitly() {
    let world = TestWorld::new();
    let observer = world.join("observer").await;
    let mut events = observer.events();

    let session = world.join("alice").await;
    let uid = session.context().identity().uid;
    wait_for_event(&mut events, |e| match e {
        SyncEvent::RosterChanged { roster } => {
            roster.iter().any(|r| r.username == "alice" && r.is_online())
        }
        _ => false,
    })
    .await;

    session.leave().await;

    wait_for_event(&mut events, |e| match e {
        SyncEvent::RosterChanged { roster } => roster
            .iter()
            .any(|r| r.username == "alice" && !r.is_online()),
        _ => false,
    })
    .await;

    assert!(world.store.read(&paths::room_presence(world.room, uid)).is_none());
    assert!(world.store.read(&paths::participant(world.room, uid)).is_none());
}

#[tokio::test]
async fn test_offline_record_keeps_its_last_seen_stamp() {
    let world = TestWorld::new();
    let observer = world.join("observer").await;
    let mut events = observer.events();

    let t0 = world.clock.now();
    let session = world.join("alice").await;
    wait_for_event(&mut events, |e| match e {
        SyncEvent::RosterChanged { roster } => {
            roster.iter().any(|r| r.username == "alice" && r.is_online())
        }
        _ => false,
    })
    .await;

    session.leave().await;
    let event = wait_for_event(&mut events, |e| match e {
        SyncEvent::RosterChanged { roster } => roster
            .iter()
            .any(|r| r.username == "alice" && !r.is_online()),
        _ => false,
    })
    .await;

    let SyncEvent::RosterChanged { roster } = event else {
        unreachable!();
    };
    let alice: &CommunityPresenceRecord = roster
        .iter()
        .find(|r| r.username == "alice")
        .expect("alice still listed while offline");
    assert!(alice.last_seen >= t0);
}
