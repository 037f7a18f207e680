//! Unread badge computation across inbox updates.

mod helpers;

use studyhub_core::types::UserId;
use studyhub_entity::chat::PrivateChatSummary;
use studyhub_store::paths::MutationIntent;
use studyhub_sync::SyncEvent;

use helpers::{TestWorld, wait_for_event};

fn deliver(world: &TestWorld, owner: UserId, partner: UserId, sender: UserId) {
    let summary = PrivateChatSummary {
        partner_id: partner,
        last_message_timestamp: world.store.now(),
        last_sender_id: sender,
    };
    let write = MutationIntent::WriteInboxSummary {
        owner,
        partner,
        summary,
    }
    .resolve()
    .expect("resolve");
    world.store.apply_write(&write).expect("deliver");
}

#[tokio::test]
async fn test_incoming_message_raises_a_badge() {
    let world = TestWorld::new();
    let session = world.join("alice").await;
    let me = session.context().identity().uid;
    let partner = UserId::new();
    let mut events = session.events();

    deliver(&world, me, partner, partner);

    let event = wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::UnreadChanged { partners } if !partners.is_empty())
    })
    .await;
    let SyncEvent::UnreadChanged { partners } = event else {
        unreachable!();
    };
    assert_eq!(partners, vec![partner]);
}

#[tokio::test]
async fn test_own_replies_never_raise_a_badge() {
    let world = TestWorld::new();
    let session = world.join("alice").await;
    let me = session.context().identity().uid;
    let partner = UserId::new();
    let mut events = session.events();

    // The last message in the conversation is ours.
    deliver(&world, me, partner, me);

    wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::UnreadChanged { .. })
    })
    .await;

    // The summary reached the tracker, yet no badge may be raised.
    assert!(session.unread().unread_partners().is_empty());
}

#[tokio::test]
async fn test_opening_the_conversation_clears_the_badge() {
    let world = TestWorld::new();
    let session = world.join("alice").await;
    let me = session.context().identity().uid;
    let partner = UserId::new();
    let mut events = session.events();

    deliver(&world, me, partner, partner);
    wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::UnreadChanged { partners } if partners == &vec![partner])
    })
    .await;

    session.unread().open_conversation(partner).await;
    let event = wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::UnreadChanged { partners } if partners.is_empty())
    })
    .await;
    drop(event);

    assert!(session.unread().unread_partners().is_empty());
}

#[tokio::test]
async fn test_newer_message_reopens_a_read_conversation() {
    let world = TestWorld::new();
    let session = world.join("alice").await;
    let me = session.context().identity().uid;
    let partner = UserId::new();
    let mut events = session.events();

    deliver(&world, me, partner, partner);
    wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::UnreadChanged { partners } if partners == &vec![partner])
    })
    .await;
    session.unread().open_conversation(partner).await;
    wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::UnreadChanged { partners } if partners.is_empty())
    })
    .await;

    // A strictly newer message must beat the watermark.
    world.clock.advance(chrono::Duration::seconds(5));
    deliver(&world, me, partner, partner);

    wait_for_event(&mut events, |e| {
        matches!(e, SyncEvent::UnreadChanged { partners } if partners == &vec![partner])
    })
    .await;
}
