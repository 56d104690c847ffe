//! Room registry tests
//!
//! Covers session registration, room membership changes, origin-excluded
//! broadcast and the sweep of dead senders.

use chat_service::websocket::RoomRegistry;

#[tokio::test]
async fn test_broadcast_skips_origin() {
    let registry = RoomRegistry::new();
    let (alice_session, mut alice_rx) = registry.register_session(1, &[10]).await;
    let (_bob_session, mut bob_rx) = registry.register_session(2, &[10]).await;

    registry.broadcast(10, Some(alice_session), "frame").await;

    assert_eq!(bob_rx.recv().await.expect("bob receives"), "frame");
    assert!(alice_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_broadcast_without_origin_reaches_everyone() {
    let registry = RoomRegistry::new();
    let (_a, mut alice_rx) = registry.register_session(1, &[10]).await;
    let (_b, mut bob_rx) = registry.register_session(2, &[10]).await;

    registry.broadcast(10, None, "frame").await;

    assert_eq!(alice_rx.recv().await.expect("alice receives"), "frame");
    assert_eq!(bob_rx.recv().await.expect("bob receives"), "frame");
}

#[tokio::test]
async fn test_origin_exclusion_is_per_session_not_per_user() {
    let registry = RoomRegistry::new();
    let (phone_session, mut phone_rx) = registry.register_session(1, &[10]).await;
    let (_laptop_session, mut laptop_rx) = registry.register_session(1, &[10]).await;

    registry.broadcast(10, Some(phone_session), "frame").await;

    // The same user's other device still hears about the message
    assert_eq!(laptop_rx.recv().await.expect("laptop receives"), "frame");
    assert!(phone_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_broadcast_reaches_only_the_addressed_room() {
    let registry = RoomRegistry::new();
    let (_a, mut alice_rx) = registry.register_session(1, &[10]).await;
    let (_b, mut bob_rx) = registry.register_session(2, &[20]).await;

    registry.broadcast(10, None, "frame").await;

    assert_eq!(alice_rx.recv().await.expect("alice receives"), "frame");
    assert!(bob_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_deregister_removes_session_from_all_rooms() {
    let registry = RoomRegistry::new();
    let (alice_session, _alice_rx) = registry.register_session(1, &[10, 20]).await;
    let (_bob_session, mut bob_rx) = registry.register_session(2, &[10]).await;

    registry.deregister_session(alice_session).await;

    assert_eq!(registry.sessions_in_room(10).await, 1);
    assert_eq!(registry.sessions_in_room(20).await, 0);

    registry.broadcast(10, None, "frame").await;
    assert_eq!(bob_rx.recv().await.expect("bob receives"), "frame");
}

#[tokio::test]
async fn test_join_room_adds_every_live_session_once() {
    let registry = RoomRegistry::new();
    let (_phone, mut phone_rx) = registry.register_session(1, &[]).await;
    let (_laptop, mut laptop_rx) = registry.register_session(1, &[]).await;

    registry.join_room(10, 1).await;
    assert_eq!(registry.sessions_in_room(10).await, 2);

    // Joining again changes nothing
    registry.join_room(10, 1).await;
    assert_eq!(registry.sessions_in_room(10).await, 2);

    // A user without a live session is skipped
    registry.join_room(10, 99).await;
    assert_eq!(registry.sessions_in_room(10).await, 2);

    registry.broadcast(10, None, "frame").await;
    assert_eq!(phone_rx.recv().await.expect("phone receives"), "frame");
    assert_eq!(laptop_rx.recv().await.expect("laptop receives"), "frame");
}

#[tokio::test]
async fn test_leave_room_detaches_one_session() {
    let registry = RoomRegistry::new();
    let (alice_session, mut alice_rx) = registry.register_session(1, &[10]).await;
    let (_bob_session, mut bob_rx) = registry.register_session(2, &[10]).await;

    registry.leave_room(10, alice_session).await;
    assert_eq!(registry.sessions_in_room(10).await, 1);

    registry.broadcast(10, None, "frame").await;
    assert!(alice_rx.try_recv().is_err());
    assert_eq!(bob_rx.recv().await.expect("bob receives"), "frame");
}

#[tokio::test]
async fn test_drop_room_removes_everyone() {
    let registry = RoomRegistry::new();
    let (_a, mut alice_rx) = registry.register_session(1, &[10]).await;
    let (_b, mut bob_rx) = registry.register_session(2, &[10]).await;

    registry.drop_room(10).await;
    assert_eq!(registry.sessions_in_room(10).await, 0);

    registry.broadcast(10, None, "frame").await;
    assert!(alice_rx.try_recv().is_err());
    assert!(bob_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_broadcast_sweeps_dead_senders() {
    let registry = RoomRegistry::new();
    let (_a, mut alice_rx) = registry.register_session(1, &[10]).await;
    let (_b, bob_rx) = registry.register_session(2, &[10]).await;

    // Bob's receiver is gone; the next broadcast notices and drops him
    drop(bob_rx);
    assert_eq!(registry.sessions_in_room(10).await, 2);

    registry.broadcast(10, None, "frame").await;
    assert_eq!(registry.sessions_in_room(10).await, 1);
    assert_eq!(alice_rx.recv().await.expect("alice receives"), "frame");
}
