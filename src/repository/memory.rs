use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::models::{
    direct_key, Conversation, ConversationKind, ConversationMember, ConversationPatch,
    ConversationWithMembers, Message, MessagePatch, NewConversation, NewMessage, NewUser, User,
    UserPatch,
};
use crate::pagination::Pagination;

use super::{ChatStore, UserStore};

#[derive(Clone)]
struct MemberRow {
    user_id: i64,
    joined_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    conversations: HashMap<i64, Conversation>,
    members: HashMap<i64, Vec<MemberRow>>,
    messages: BTreeMap<i64, Message>,
    contacts: HashSet<(i64, i64)>,
    blocks: HashSet<(i64, i64)>,
    next_user_id: i64,
    next_conversation_id: i64,
    next_message_id: i64,
    fail_next: HashSet<String>,
}

impl Inner {
    fn take_fault(&mut self, op: &str) -> AppResult<()> {
        if self.fail_next.remove(op) {
            return Err(AppError::Internal(format!("injected failure: {op}")));
        }
        Ok(())
    }

    fn member_view(&self, conversation_id: i64) -> Vec<ConversationMember> {
        self.members
            .get(&conversation_id)
            .map(|rows| {
                rows.iter()
                    .map(|m| {
                        let user = self.users.get(&m.user_id);
                        ConversationMember {
                            user_id: m.user_id,
                            name: user.map(|u| u.name.clone()).unwrap_or_default(),
                            avatar: user.and_then(|u| u.avatar.clone()),
                            joined_at: m.joined_at,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn view_of(&self, conversation: Conversation) -> ConversationWithMembers {
        let members = self.member_view(conversation.id);
        ConversationWithMembers {
            conversation,
            members,
            not_seen: 0,
        }
    }

    fn not_seen_for(&self, conversation_id: i64, user_id: i64) -> i64 {
        self.messages
            .values()
            .filter(|m| m.conversation_id == conversation_id && !m.seen && m.sender_id != user_id)
            .count() as i64
    }
}

/// In-memory store used by the test suites. Behaves like the Postgres store,
/// including atomicity: every check and injected fault fires before the first
/// write, so a failed operation leaves no partial state behind.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call of the named operation fail before touching state.
    pub fn fail_next(&self, op: &str) {
        self.inner.lock().unwrap().fail_next.insert(op.to_string());
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn find_direct_conversation(&self, a: i64, b: i64) -> AppResult<Option<Conversation>> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("find_direct_conversation")?;

        let key = direct_key(a, b);
        Ok(inner
            .conversations
            .values()
            .find(|c| {
                c.kind == ConversationKind::Direct
                    && c.direct_key.as_deref() == Some(key.as_str())
            })
            .cloned())
    }

    async fn create_conversation_with_members(
        &self,
        conversation: NewConversation,
        member_ids: &[i64],
    ) -> AppResult<ConversationWithMembers> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("create_conversation_with_members")?;

        if let Some(key) = &conversation.direct_key {
            if inner
                .conversations
                .values()
                .any(|c| c.direct_key.as_deref() == Some(key.as_str()))
            {
                return Err(AppError::Conflict(
                    "a conversation for this pair already exists".to_string(),
                ));
            }
        }

        inner.next_conversation_id += 1;
        let id = inner.next_conversation_id;
        let now = Utc::now();
        let created = Conversation {
            id,
            kind: conversation.kind,
            name: conversation.name,
            image: conversation.image,
            description: conversation.description,
            direct_key: conversation.direct_key,
            last_chat_at: now,
            created_at: now,
            updated_at: now,
        };
        inner.conversations.insert(id, created.clone());

        let rows = inner.members.entry(id).or_default();
        for user_id in member_ids {
            if !rows.iter().any(|m| m.user_id == *user_id) {
                rows.push(MemberRow {
                    user_id: *user_id,
                    joined_at: now,
                });
            }
        }

        Ok(inner.view_of(created))
    }

    async fn get_conversation(&self, id: i64) -> AppResult<Option<ConversationWithMembers>> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("get_conversation")?;

        Ok(inner
            .conversations
            .get(&id)
            .cloned()
            .map(|c| inner.view_of(c)))
    }

    async fn update_conversation(
        &self,
        id: i64,
        patch: ConversationPatch,
    ) -> AppResult<Option<Conversation>> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("update_conversation")?;

        match inner.conversations.get_mut(&id) {
            Some(c) => {
                if let Some(name) = patch.name {
                    c.name = name;
                }
                if let Some(image) = patch.image {
                    c.image = Some(image);
                }
                if let Some(description) = patch.description {
                    c.description = Some(description);
                }
                if let Some(last_chat_at) = patch.last_chat_at {
                    c.last_chat_at = last_chat_at;
                }
                c.updated_at = Utc::now();
                Ok(Some(c.clone()))
            }
            None => Ok(None),
        }
    }

    async fn add_members(&self, id: i64, user_ids: &[i64]) -> AppResult<ConversationWithMembers> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("add_members")?;

        let conversation = inner
            .conversations
            .get(&id)
            .cloned()
            .ok_or(AppError::NotFound)?;

        let now = Utc::now();
        let rows = inner.members.entry(id).or_default();
        for user_id in user_ids {
            if !rows.iter().any(|m| m.user_id == *user_id) {
                rows.push(MemberRow {
                    user_id: *user_id,
                    joined_at: now,
                });
            }
        }

        Ok(inner.view_of(conversation))
    }

    async fn list_conversations_for_user(
        &self,
        user_id: i64,
    ) -> AppResult<Vec<ConversationWithMembers>> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("list_conversations_for_user")?;

        let mut list: Vec<ConversationWithMembers> = inner
            .conversations
            .values()
            .filter(|c| {
                inner
                    .members
                    .get(&c.id)
                    .map_or(false, |rows| rows.iter().any(|m| m.user_id == user_id))
            })
            .cloned()
            .map(|c| {
                let not_seen = inner.not_seen_for(c.id, user_id);
                let mut view = inner.view_of(c);
                view.not_seen = not_seen;
                view
            })
            .collect();

        list.sort_by(|a, b| b.conversation.last_chat_at.cmp(&a.conversation.last_chat_at));
        Ok(list)
    }

    async fn delete_conversation(&self, id: i64) -> AppResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("delete_conversation")?;

        let existed = inner.conversations.remove(&id).is_some();
        inner.members.remove(&id);
        inner.messages.retain(|_, m| m.conversation_id != id);
        Ok(existed)
    }

    async fn create_message(&self, message: NewMessage) -> AppResult<Message> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("create_message")?;

        inner.next_message_id += 1;
        let id = inner.next_message_id;
        let now = Utc::now();
        let created = Message {
            id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content,
            kind: message.kind,
            seen: false,
            is_edited: false,
            is_deleted: false,
            file_path: message.file_path,
            deleted_by: None,
            created_at: now,
            updated_at: now,
        };
        inner.messages.insert(id, created.clone());
        Ok(created)
    }

    async fn create_message_marking_seen(&self, message: NewMessage) -> AppResult<Message> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("create_message_marking_seen")?;

        inner.next_message_id += 1;
        let id = inner.next_message_id;
        let now = Utc::now();
        let created = Message {
            id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content,
            kind: message.kind,
            seen: false,
            is_edited: false,
            is_deleted: false,
            file_path: message.file_path,
            deleted_by: None,
            created_at: now,
            updated_at: now,
        };
        inner.messages.insert(id, created.clone());

        if let Some(c) = inner.conversations.get_mut(&created.conversation_id) {
            c.last_chat_at = now;
            c.updated_at = now;
        }

        for m in inner.messages.values_mut() {
            if m.conversation_id == created.conversation_id
                && m.id < id
                && m.sender_id != created.sender_id
                && !m.seen
            {
                m.seen = true;
                m.updated_at = now;
            }
        }

        Ok(created)
    }

    async fn update_message(
        &self,
        id: i64,
        sender_id: i64,
        patch: MessagePatch,
    ) -> AppResult<Option<Message>> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("update_message")?;

        match inner.messages.get_mut(&id) {
            Some(m) if m.sender_id == sender_id && m.deleted_by != Some(sender_id) => {
                if let Some(content) = patch.content {
                    m.content = content;
                }
                if let Some(seen) = patch.seen {
                    m.seen = seen;
                }
                if let Some(is_edited) = patch.is_edited {
                    m.is_edited = is_edited;
                }
                if let Some(is_deleted) = patch.is_deleted {
                    m.is_deleted = is_deleted;
                }
                if let Some(file_path) = patch.file_path {
                    m.file_path = Some(file_path);
                }
                m.updated_at = Utc::now();
                Ok(Some(m.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_message(&self, id: i64, sender_id: i64) -> AppResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("delete_message")?;

        let matched = inner
            .messages
            .get(&id)
            .map_or(false, |m| m.sender_id == sender_id);
        if matched {
            inner.messages.remove(&id);
        }
        Ok(matched)
    }

    async fn soft_delete_message(
        &self,
        id: i64,
        sender_id: i64,
        hidden_from: i64,
    ) -> AppResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("soft_delete_message")?;

        match inner.messages.get_mut(&id) {
            Some(m) if m.sender_id == sender_id => {
                m.deleted_by = Some(hidden_from);
                m.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_seen_up_to(
        &self,
        conversation_id: i64,
        message_id: i64,
        exclude_sender: i64,
    ) -> AppResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("mark_seen_up_to")?;

        let now = Utc::now();
        let mut changed = 0u64;
        for m in inner.messages.values_mut() {
            if m.conversation_id == conversation_id
                && m.id <= message_id
                && m.sender_id != exclude_sender
                && !m.seen
            {
                m.seen = true;
                m.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
        viewer_id: i64,
        page: Pagination,
    ) -> AppResult<Vec<Message>> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("list_messages")?;

        Ok(inner
            .messages
            .values()
            .rev()
            .filter(|m| m.conversation_id == conversation_id && m.deleted_by != Some(viewer_id))
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("create_user")?;

        if inner.users.values().any(|u| u.phone == user.phone) {
            return Err(AppError::Conflict("phone already registered".to_string()));
        }

        inner.next_user_id += 1;
        let id = inner.next_user_id;
        let now = Utc::now();
        let created = User {
            id,
            name: user.name,
            username: user.username,
            phone: user.phone,
            avatar: user.avatar,
            bio: user.bio,
            last_online: now,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("get_user")?;

        Ok(inner.users.get(&id).cloned())
    }

    async fn get_user_by_phone(&self, phone: &str) -> AppResult<Option<User>> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("get_user_by_phone")?;

        Ok(inner.users.values().find(|u| u.phone == phone).cloned())
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> AppResult<Option<User>> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("update_user")?;

        match inner.users.get_mut(&id) {
            Some(u) => {
                if let Some(name) = patch.name {
                    u.name = name;
                }
                if let Some(avatar) = patch.avatar {
                    u.avatar = Some(avatar);
                }
                if let Some(bio) = patch.bio {
                    u.bio = Some(bio);
                }
                if let Some(last_online) = patch.last_online {
                    u.last_online = last_online;
                }
                u.updated_at = Utc::now();
                Ok(Some(u.clone()))
            }
            None => Ok(None),
        }
    }

    async fn add_contact(&self, owner_id: i64, contact_id: i64) -> AppResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("add_contact")?;

        inner.contacts.insert((owner_id, contact_id));
        Ok(())
    }

    async fn add_block(&self, user_id: i64, blocked_id: i64) -> AppResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("add_block")?;

        inner.blocks.insert((user_id, blocked_id));
        Ok(())
    }

    async fn is_blocked(&self, user: i64, by: i64) -> AppResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_fault("is_blocked")?;

        Ok(inner.blocks.contains(&(by, user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatKind;

    fn new_message(conversation_id: i64, sender_id: i64, content: &str) -> NewMessage {
        NewMessage {
            conversation_id,
            sender_id,
            content: content.to_string(),
            kind: ChatKind::Text,
            file_path: None,
        }
    }

    #[tokio::test]
    async fn test_fault_fires_once_then_clears() {
        let store = MemoryStore::new();
        store.fail_next("create_message");

        let err = store.create_message(new_message(1, 1, "x")).await;
        assert!(matches!(err, Err(AppError::Internal(_))));

        let ok = store.create_message(new_message(1, 1, "x")).await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_fault_targets_only_named_op() {
        let store = MemoryStore::new();
        store.fail_next("delete_message");

        assert!(store.create_message(new_message(1, 1, "x")).await.is_ok());
        assert!(matches!(
            store.delete_message(1, 1).await,
            Err(AppError::Internal(_))
        ));
    }
}
