use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    Conversation, ConversationPatch, ConversationWithMembers, Message, MessagePatch,
    NewConversation, NewMessage, NewUser, User, UserPatch,
};
use crate::pagination::Pagination;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence port for conversations and messages. Multi-statement
/// operations are atomic: either every statement applies or none do.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn find_direct_conversation(&self, a: i64, b: i64) -> AppResult<Option<Conversation>>;

    /// Creates the conversation and its membership rows in one transaction.
    async fn create_conversation_with_members(
        &self,
        conversation: NewConversation,
        member_ids: &[i64],
    ) -> AppResult<ConversationWithMembers>;

    async fn get_conversation(&self, id: i64) -> AppResult<Option<ConversationWithMembers>>;

    /// Applies the patch to the conversation row. Returns the updated row,
    /// None when no such conversation exists.
    async fn update_conversation(
        &self,
        id: i64,
        patch: ConversationPatch,
    ) -> AppResult<Option<Conversation>>;

    /// Adds the given users, skipping ids that are already members.
    async fn add_members(&self, id: i64, user_ids: &[i64]) -> AppResult<ConversationWithMembers>;

    /// Conversations the user belongs to, most recent activity first,
    /// each with its unseen count for that user.
    async fn list_conversations_for_user(
        &self,
        user_id: i64,
    ) -> AppResult<Vec<ConversationWithMembers>>;

    /// Removes the conversation, its membership and its messages. Returns
    /// false when no such conversation existed.
    async fn delete_conversation(&self, id: i64) -> AppResult<bool>;

    async fn create_message(&self, message: NewMessage) -> AppResult<Message>;

    /// Inserts the message, bumps the conversation's activity timestamp and
    /// marks every earlier message from other senders as seen, atomically.
    async fn create_message_marking_seen(&self, message: NewMessage) -> AppResult<Message>;

    /// Applies the patch if the message exists, belongs to the sender and is
    /// not hidden from them. Returns the updated row, None otherwise.
    async fn update_message(
        &self,
        id: i64,
        sender_id: i64,
        patch: MessagePatch,
    ) -> AppResult<Option<Message>>;

    /// Removes the message for everyone. Only the sender may do this;
    /// returns false when nothing matched.
    async fn delete_message(&self, id: i64, sender_id: i64) -> AppResult<bool>;

    /// Hides the message from one user without touching what others see.
    async fn soft_delete_message(
        &self,
        id: i64,
        sender_id: i64,
        hidden_from: i64,
    ) -> AppResult<bool>;

    /// Marks messages up to and including `message_id` as seen, skipping the
    /// excluded sender's own messages. Returns how many rows changed.
    async fn mark_seen_up_to(
        &self,
        conversation_id: i64,
        message_id: i64,
        exclude_sender: i64,
    ) -> AppResult<u64>;

    /// Newest-first page of messages, omitting those hidden from the viewer.
    async fn list_messages(
        &self,
        conversation_id: i64,
        viewer_id: i64,
        page: Pagination,
    ) -> AppResult<Vec<Message>>;
}

/// Persistence port for the user directory and its contact/block edges.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> AppResult<User>;

    async fn get_user(&self, id: i64) -> AppResult<Option<User>>;

    async fn get_user_by_phone(&self, phone: &str) -> AppResult<Option<User>>;

    async fn update_user(&self, id: i64, patch: UserPatch) -> AppResult<Option<User>>;

    async fn add_contact(&self, owner_id: i64, contact_id: i64) -> AppResult<()>;

    async fn add_block(&self, user_id: i64, blocked_id: i64) -> AppResult<()>;

    /// True when `by` has blocked `user`.
    async fn is_blocked(&self, user: i64, by: i64) -> AppResult<bool>;
}
