mod utils;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use petwheel::invite::UserInvite;
use petwheel::room::{EpochMillis, InviteStatus};
use petwheel::{GameRoom, GameRoomCoordinator};
use utils::{identity, PlayingRoomBuilder, TestSetupBuilder};

async fn room(coordinator: &GameRoomCoordinator, room_id: &str) -> GameRoom {
    coordinator.get_room(room_id).await.expect("room exists")
}

fn assert_player_count_consistent(room: &GameRoom) {
    assert_eq!(room.current_players as usize, room.players.len());
}

#[tokio::test]
async fn test_invitee_sees_pending_invite() {
    let setup = TestSetupBuilder::new().build();
    let coordinator = &setup.coordinator;
    let host = identity("host", "Hana");
    let room_id = coordinator.create_room_from_catalog(&host, None).await.unwrap();

    assert!(coordinator.send_invite(&room_id, &host, "guest").await);

    let invites = coordinator.actionable_invites("guest").await.unwrap();
    assert_eq!(invites.len(), 1);
    assert_eq!(invites[0].room_id, room_id);
    assert_eq!(invites[0].from_user_id, "host");
    assert_eq!(invites[0].from_user_name, "Hana");
    assert_eq!(invites[0].status, InviteStatus::Pending);

    // Nothing addressed to the host
    assert!(coordinator.actionable_invites("host").await.unwrap().is_empty());

    let entry = &room(coordinator, &room_id).await.invites["guest"];
    assert_eq!(entry.status, InviteStatus::Pending);
    assert_eq!(entry.from_user_id, "host");
}

#[tokio::test]
async fn test_invite_to_missing_room_fails() {
    let setup = TestSetupBuilder::new().build();
    assert!(
        !setup
            .coordinator
            .send_invite("missing", &identity("host", "Hana"), "guest")
            .await
    );
    assert!(setup.coordinator.actionable_invites("guest").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_accept_marks_both_sides_accepted() {
    let setup = TestSetupBuilder::new().build();
    let coordinator = &setup.coordinator;
    let host = identity("host", "Hana");
    let room_id = coordinator.create_room_from_catalog(&host, None).await.unwrap();
    assert!(coordinator.send_invite(&room_id, &host, "guest").await);

    assert!(coordinator.accept_invite(&room_id, &identity("guest", "Gus")).await);

    let joined = room(coordinator, &room_id).await;
    assert_player_count_consistent(&joined);
    assert_eq!(joined.players["guest"].display_name, "Gus");
    assert!(joined.players["guest"].joined_at.is_some());
    assert_eq!(joined.invites["guest"].status, InviteStatus::Accepted);

    // Accepted invites drop out of the pending query
    assert!(coordinator.actionable_invites("guest").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_decline_leaves_players_untouched() {
    let setup = TestSetupBuilder::new().build();
    let coordinator = &setup.coordinator;
    let host = identity("host", "Hana");
    let room_id = coordinator.create_room_from_catalog(&host, None).await.unwrap();
    assert!(coordinator.send_invite(&room_id, &host, "guest").await);

    assert!(coordinator.decline_invite(&room_id, "guest").await);

    let declined = room(coordinator, &room_id).await;
    assert_eq!(declined.current_players, 1);
    assert!(!declined.players.contains_key("guest"));
    assert_eq!(declined.invites["guest"].status, InviteStatus::Declined);
    assert!(coordinator.actionable_invites("guest").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_accept_refused_when_full() {
    let setup = TestSetupBuilder::new().build();
    let coordinator = &setup.coordinator;
    let room_id = PlayingRoomBuilder::new().waiting().build(coordinator).await;

    assert!(!coordinator.accept_invite(&room_id, &identity("late", "Lou")).await);

    let full = room(coordinator, &room_id).await;
    assert_eq!(full.current_players, 2);
    assert!(!full.players.contains_key("late"));
}

#[tokio::test]
async fn test_accept_refused_once_playing() {
    let setup = TestSetupBuilder::new().build();
    let coordinator = &setup.coordinator;
    let room_id = PlayingRoomBuilder::new()
        .with_guests(vec![identity("guest", "Gus")])
        .build(coordinator)
        .await;

    assert!(!coordinator.accept_invite(&room_id, &identity("late", "Lou")).await);
    assert!(!coordinator.accept_invite("missing", &identity("late", "Lou")).await);
}

#[tokio::test]
async fn test_accept_twice_does_not_double_count() {
    let setup = TestSetupBuilder::new().build();
    let coordinator = &setup.coordinator;
    let host = identity("host", "Hana");
    let room_id = coordinator.create_room(&host, Vec::new(), 3).await.unwrap();
    let guest = identity("guest", "Gus");

    assert!(coordinator.accept_invite(&room_id, &guest).await);
    assert!(coordinator.accept_invite(&room_id, &guest).await);

    let joined = room(coordinator, &room_id).await;
    assert_eq!(joined.current_players, 2);
    assert_player_count_consistent(&joined);
}

#[tokio::test]
async fn test_leave_keeps_counts_consistent() {
    let setup = TestSetupBuilder::new().build();
    let coordinator = &setup.coordinator;
    let room_id = PlayingRoomBuilder::new().waiting().build(coordinator).await;

    assert!(coordinator.leave_room(&room_id, "guest").await);
    let after = room(coordinator, &room_id).await;
    assert_eq!(after.current_players, 1);
    assert_player_count_consistent(&after);

    // Leaving twice is refused
    assert!(!coordinator.leave_room(&room_id, "guest").await);
}

#[tokio::test]
async fn test_last_player_leaving_deletes_room() {
    let setup = TestSetupBuilder::new().build();
    let coordinator = &setup.coordinator;
    let room_id = coordinator
        .create_room_from_catalog(&identity("host", "Hana"), None)
        .await
        .unwrap();

    assert!(coordinator.leave_room(&room_id, "host").await);
    assert!(coordinator.get_room(&room_id).await.is_none());
}

#[tokio::test]
async fn test_invite_subscription_delivers_full_lists_newest_first() {
    let setup = TestSetupBuilder::new().build();
    let coordinator = &setup.coordinator;
    let alice = identity("alice", "Alice");
    let bob = identity("bob", "Bob");
    let first = coordinator.create_room_from_catalog(&alice, None).await.unwrap();
    let second = coordinator.create_room_from_catalog(&bob, None).await.unwrap();

    let deliveries: Arc<Mutex<Vec<Vec<UserInvite>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = deliveries.clone();
    let handle = coordinator
        .subscribe_to_user_invites("guest", move |invites| {
            sink.lock().unwrap().push(invites);
        })
        .await
        .unwrap();

    assert!(coordinator.send_invite(&first, &alice, "guest").await);
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(coordinator.send_invite(&second, &bob, "guest").await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let latest = deliveries.lock().unwrap().last().cloned().unwrap();
    let rooms: Vec<_> = latest.iter().map(|invite| invite.room_id.clone()).collect();
    assert_eq!(rooms, vec![second.clone(), first.clone()]);

    // Every delivery is a complete list, starting from the empty initial snapshot
    assert!(deliveries.lock().unwrap()[0].is_empty());

    handle.unsubscribe();
    let delivered = deliveries.lock().unwrap().len();
    assert!(coordinator.decline_invite(&first, "guest").await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(deliveries.lock().unwrap().len(), delivered);
}

#[tokio::test]
async fn test_stale_invites_are_filtered_out() {
    let setup = TestSetupBuilder::new().build();
    let coordinator = &setup.coordinator;
    let host = identity("host", "Hana");
    let room_id = coordinator.create_room_from_catalog(&host, None).await.unwrap();
    assert!(coordinator.send_invite(&room_id, &host, "guest").await);

    let mut watch = coordinator.watch_user_invites("guest").await.unwrap();
    let pending = watch.next().await.unwrap();
    assert_eq!(pending.len(), 1);

    let filter = coordinator.invite_filter();
    let sent_at = pending[0].timestamp.unwrap();
    let at_limit = EpochMillis(sent_at.as_millis() + 60_000);
    assert_eq!(filter.actionable(pending.clone(), at_limit).len(), 1);

    let expired = EpochMillis(sent_at.as_millis() + 60_001);
    assert!(filter.actionable(pending, expired).is_empty());
}
