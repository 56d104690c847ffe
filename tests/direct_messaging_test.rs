//! Direct conversation tests
//!
//! Covers pair uniqueness, send-time conversation bootstrap, implicit seen
//! propagation on reply and the conversation list view.

mod common;

use chat_service::error::AppError;
use chat_service::models::ConversationKind;
use chat_service::pagination::Pagination;
use chat_service::services::ConversationInput;
use common::{backend, chat, seed_user};

#[tokio::test]
async fn test_start_conversation_is_idempotent_across_directions() {
    let b = backend();
    let alice = seed_user(&b.users, "Alice", "100").await;
    let bob = seed_user(&b.users, "Bob", "200").await;

    let first = b
        .engine
        .start_conversation(alice, bob, ConversationInput::default())
        .await
        .expect("create conversation");
    let second = b
        .engine
        .start_conversation(bob, alice, ConversationInput::default())
        .await
        .expect("reuse conversation");

    assert_eq!(first.conversation.id, second.conversation.id);
    assert_eq!(first.conversation.kind, ConversationKind::Direct);
    assert_eq!(second.members.len(), 2);
}

#[tokio::test]
async fn test_start_conversation_with_self_rejected() {
    let b = backend();
    let alice = seed_user(&b.users, "Alice", "100").await;

    let err = b
        .engine
        .start_conversation(alice, alice, ConversationInput::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_get_conversation_by_users() {
    let b = backend();
    let alice = seed_user(&b.users, "Alice", "100").await;
    let bob = seed_user(&b.users, "Bob", "200").await;
    let carol = seed_user(&b.users, "Carol", "300").await;

    let created = b
        .engine
        .start_conversation(alice, bob, ConversationInput::default())
        .await
        .expect("create conversation");

    // Lookup works regardless of argument order
    let found = b
        .engine
        .get_conversation_by_users(bob, alice)
        .await
        .expect("find conversation");
    assert_eq!(found.conversation.id, created.conversation.id);

    let err = b
        .engine
        .get_conversation_by_users(alice, carol)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn test_send_chat_bootstraps_conversation() {
    let b = backend();
    let alice = seed_user(&b.users, "Alice", "100").await;
    let bob = seed_user(&b.users, "Bob", "200").await;

    let message = b
        .engine
        .send_chat(alice, Some(bob), None, chat("hi"))
        .await
        .expect("send creates the conversation on the fly");

    let view = b
        .engine
        .get_conversation_by_users(alice, bob)
        .await
        .expect("conversation exists after send");
    assert_eq!(message.conversation_id, view.conversation.id);
    assert_eq!(message.sender_id, alice);
    assert!(!message.seen);
    assert!(!message.is_edited);
    assert!(!message.is_deleted);
}

#[tokio::test]
async fn test_send_chat_requires_target_or_conversation() {
    let b = backend();
    let alice = seed_user(&b.users, "Alice", "100").await;

    let err = b
        .engine
        .send_chat(alice, None, None, chat("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_send_chat_rejects_empty_content() {
    let b = backend();
    let alice = seed_user(&b.users, "Alice", "100").await;
    let bob = seed_user(&b.users, "Bob", "200").await;

    let err = b
        .engine
        .send_chat(alice, Some(bob), None, chat("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_send_chat_rejects_non_member() {
    let b = backend();
    let alice = seed_user(&b.users, "Alice", "100").await;
    let bob = seed_user(&b.users, "Bob", "200").await;
    let carol = seed_user(&b.users, "Carol", "300").await;

    let view = b
        .engine
        .start_conversation(alice, bob, ConversationInput::default())
        .await
        .expect("create conversation");

    let err = b
        .engine
        .send_chat(carol, None, Some(view.conversation.id), chat("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn test_reply_marks_earlier_messages_seen() {
    let b = backend();
    let alice = seed_user(&b.users, "Alice", "100").await;
    let bob = seed_user(&b.users, "Bob", "200").await;

    b.engine
        .send_chat(alice, Some(bob), None, chat("one"))
        .await
        .expect("first send");
    b.engine
        .send_chat(alice, Some(bob), None, chat("two"))
        .await
        .expect("second send");
    let reply = b
        .engine
        .send_chat(bob, Some(alice), None, chat("three"))
        .await
        .expect("reply");

    let chats = b
        .engine
        .get_conversation_chats(reply.conversation_id, alice, Pagination::default())
        .await
        .expect("list chats");

    // Newest first; the reply is unseen, everything before it got marked
    assert_eq!(chats.len(), 3);
    assert_eq!(chats[0].content, "three");
    assert!(!chats[0].seen);
    assert_eq!(chats[1].content, "two");
    assert!(chats[1].seen);
    assert_eq!(chats[2].content, "one");
    assert!(chats[2].seen);
}

#[tokio::test]
async fn test_own_follow_ups_leave_own_messages_unseen() {
    let b = backend();
    let alice = seed_user(&b.users, "Alice", "100").await;
    let bob = seed_user(&b.users, "Bob", "200").await;

    b.engine
        .send_chat(alice, Some(bob), None, chat("one"))
        .await
        .expect("first send");
    let last = b
        .engine
        .send_chat(alice, Some(bob), None, chat("two"))
        .await
        .expect("second send");

    let chats = b
        .engine
        .get_conversation_chats(last.conversation_id, alice, Pagination::default())
        .await
        .expect("list chats");

    assert!(chats.iter().all(|m| !m.seen));
}

#[tokio::test]
async fn test_conversation_list_orders_and_counts() {
    let b = backend();
    let alice = seed_user(&b.users, "Alice", "100").await;
    let bob = seed_user(&b.users, "Bob", "200").await;
    let carol = seed_user(&b.users, "Carol", "300").await;

    b.engine
        .send_chat(bob, Some(alice), None, chat("from bob"))
        .await
        .expect("bob sends");
    b.engine
        .send_chat(carol, Some(alice), None, chat("from carol"))
        .await
        .expect("carol sends");
    b.engine
        .send_chat(carol, Some(alice), None, chat("from carol again"))
        .await
        .expect("carol sends again");

    let list = b.engine.get_conversation_list(alice).await.expect("list");

    assert_eq!(list.len(), 2);
    // Most recent activity first, and a direct conversation carries the
    // other participant's name
    assert_eq!(list[0].conversation.name, "Carol");
    assert_eq!(list[0].not_seen, 2);
    assert_eq!(list[1].conversation.name, "Bob");
    assert_eq!(list[1].not_seen, 1);
}

#[tokio::test]
async fn test_conversation_list_counts_exclude_own_messages() {
    let b = backend();
    let alice = seed_user(&b.users, "Alice", "100").await;
    let bob = seed_user(&b.users, "Bob", "200").await;

    b.engine
        .send_chat(alice, Some(bob), None, chat("hello"))
        .await
        .expect("send");

    let list = b.engine.get_conversation_list(alice).await.expect("list");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].not_seen, 0);

    let list = b.engine.get_conversation_list(bob).await.expect("list");
    assert_eq!(list[0].not_seen, 1);
}
