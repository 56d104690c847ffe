use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use crate::error::{AppError, AppResult};
use crate::models::{
    direct_key, ChatKind, Conversation, ConversationKind, ConversationMember, ConversationPatch,
    ConversationWithMembers, Message, MessagePatch, NewConversation, NewMessage, NewUser, User,
    UserPatch,
};
use crate::pagination::Pagination;

use super::{ChatStore, UserStore};

/// Postgres-backed store. All multi-statement operations run inside a
/// transaction on the shared pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        PgStore { pool }
    }

    async fn fetch_conversation(&self, id: i64) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(
            r#"
            SELECT id, kind, name, image, description, direct_key,
                   last_chat_at, created_at, updated_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| conversation_from_row(&r)))
    }

    async fn members_for(
        &self,
        conversation_ids: &[i64],
    ) -> AppResult<HashMap<i64, Vec<ConversationMember>>> {
        if conversation_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT cm.conversation_id, cm.user_id, cm.joined_at, u.name, u.avatar
            FROM conversation_members cm
            JOIN users u ON u.id = cm.user_id
            WHERE cm.conversation_id = ANY($1)
            ORDER BY cm.joined_at ASC, cm.user_id ASC
            "#,
        )
        .bind(conversation_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_conversation: HashMap<i64, Vec<ConversationMember>> = HashMap::new();
        for row in rows {
            let conversation_id: i64 = row.get("conversation_id");
            by_conversation
                .entry(conversation_id)
                .or_default()
                .push(member_from_row(&row));
        }

        Ok(by_conversation)
    }

    async fn view_of(&self, conversation: Conversation) -> AppResult<ConversationWithMembers> {
        let mut members = self.members_for(&[conversation.id]).await?;
        let members = members.remove(&conversation.id).unwrap_or_default();
        Ok(ConversationWithMembers {
            conversation,
            members,
            not_seen: 0,
        })
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn find_direct_conversation(&self, a: i64, b: i64) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(
            r#"
            SELECT id, kind, name, image, description, direct_key,
                   last_chat_at, created_at, updated_at
            FROM conversations
            WHERE kind = 'direct' AND direct_key = $1
            "#,
        )
        .bind(direct_key(a, b))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| conversation_from_row(&r)))
    }

    async fn create_conversation_with_members(
        &self,
        conversation: NewConversation,
        member_ids: &[i64],
    ) -> AppResult<ConversationWithMembers> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO conversations (kind, name, image, description, direct_key)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, kind, name, image, description, direct_key,
                      last_chat_at, created_at, updated_at
            "#,
        )
        .bind(conversation.kind.as_str())
        .bind(&conversation.name)
        .bind(&conversation.image)
        .bind(&conversation.description)
        .bind(&conversation.direct_key)
        .fetch_one(&mut *tx)
        .await;

        let created = match result {
            Ok(row) => conversation_from_row(&row),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(AppError::Conflict(
                    "a conversation for this pair already exists".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        for user_id in member_ids {
            sqlx::query(
                "INSERT INTO conversation_members (conversation_id, user_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(created.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.view_of(created).await
    }

    async fn get_conversation(&self, id: i64) -> AppResult<Option<ConversationWithMembers>> {
        match self.fetch_conversation(id).await? {
            Some(conversation) => Ok(Some(self.view_of(conversation).await?)),
            None => Ok(None),
        }
    }

    async fn update_conversation(
        &self,
        id: i64,
        patch: ConversationPatch,
    ) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(
            r#"
            UPDATE conversations
            SET name = COALESCE($2, name),
                image = COALESCE($3, image),
                description = COALESCE($4, description),
                last_chat_at = COALESCE($5, last_chat_at),
                updated_at = now()
            WHERE id = $1
            RETURNING id, kind, name, image, description, direct_key,
                      last_chat_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.image)
        .bind(&patch.description)
        .bind(patch.last_chat_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| conversation_from_row(&r)))
    }

    async fn add_members(&self, id: i64, user_ids: &[i64]) -> AppResult<ConversationWithMembers> {
        let mut tx = self.pool.begin().await?;

        for user_id in user_ids {
            sqlx::query(
                "INSERT INTO conversation_members (conversation_id, user_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_conversation(id).await?.ok_or(AppError::NotFound)
    }

    async fn list_conversations_for_user(
        &self,
        user_id: i64,
    ) -> AppResult<Vec<ConversationWithMembers>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.kind, c.name, c.image, c.description, c.direct_key,
                   c.last_chat_at, c.created_at, c.updated_at,
                   (
                     SELECT COUNT(*) FROM messages m
                     WHERE m.conversation_id = c.id
                       AND m.seen = false
                       AND m.sender_id <> $1
                   ) AS not_seen
            FROM conversations c
            JOIN conversation_members cm ON c.id = cm.conversation_id
            WHERE cm.user_id = $1
            ORDER BY c.last_chat_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.get("id")).collect();
        let mut members = self.members_for(&ids).await?;

        let conversations = rows
            .into_iter()
            .map(|row| {
                let conversation = conversation_from_row(&row);
                let not_seen: i64 = row.get("not_seen");
                let members = members.remove(&conversation.id).unwrap_or_default();
                ConversationWithMembers {
                    conversation,
                    members,
                    not_seen,
                }
            })
            .collect();

        Ok(conversations)
    }

    async fn delete_conversation(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM conversation_members WHERE conversation_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_message(&self, message: NewMessage) -> AppResult<Message> {
        let row = sqlx::query(
            r#"
            INSERT INTO messages (conversation_id, sender_id, content, kind, file_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, conversation_id, sender_id, content, kind, seen, is_edited,
                      is_deleted, file_path, deleted_by, created_at, updated_at
            "#,
        )
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(message.kind.as_str())
        .bind(&message.file_path)
        .fetch_one(&self.pool)
        .await?;

        Ok(message_from_row(&row))
    }

    async fn create_message_marking_seen(&self, message: NewMessage) -> AppResult<Message> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO messages (conversation_id, sender_id, content, kind, file_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, conversation_id, sender_id, content, kind, seen, is_edited,
                      is_deleted, file_path, deleted_by, created_at, updated_at
            "#,
        )
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(message.kind.as_str())
        .bind(&message.file_path)
        .fetch_one(&mut *tx)
        .await?;
        let created = message_from_row(&row);

        sqlx::query(
            "UPDATE conversations SET last_chat_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(created.conversation_id)
        .execute(&mut *tx)
        .await?;

        // Receiving a reply implies everything before it was read.
        sqlx::query(
            r#"
            UPDATE messages SET seen = true, updated_at = now()
            WHERE conversation_id = $1 AND id < $2 AND sender_id <> $3 AND seen = false
            "#,
        )
        .bind(created.conversation_id)
        .bind(created.id)
        .bind(created.sender_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn update_message(
        &self,
        id: i64,
        sender_id: i64,
        patch: MessagePatch,
    ) -> AppResult<Option<Message>> {
        let row = sqlx::query(
            r#"
            UPDATE messages
            SET content = COALESCE($3, content),
                seen = COALESCE($4, seen),
                is_edited = COALESCE($5, is_edited),
                is_deleted = COALESCE($6, is_deleted),
                file_path = COALESCE($7, file_path),
                updated_at = now()
            WHERE id = $1 AND sender_id = $2 AND deleted_by IS DISTINCT FROM $2
            RETURNING id, conversation_id, sender_id, content, kind, seen, is_edited,
                      is_deleted, file_path, deleted_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(sender_id)
        .bind(&patch.content)
        .bind(patch.seen)
        .bind(patch.is_edited)
        .bind(patch.is_deleted)
        .bind(&patch.file_path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| message_from_row(&r)))
    }

    async fn delete_message(&self, id: i64, sender_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1 AND sender_id = $2")
            .bind(id)
            .bind(sender_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_message(
        &self,
        id: i64,
        sender_id: i64,
        hidden_from: i64,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE messages SET deleted_by = $3, updated_at = now() \
             WHERE id = $1 AND sender_id = $2",
        )
        .bind(id)
        .bind(sender_id)
        .bind(hidden_from)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_seen_up_to(
        &self,
        conversation_id: i64,
        message_id: i64,
        exclude_sender: i64,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET seen = true, updated_at = now()
            WHERE conversation_id = $1 AND id <= $2 AND sender_id <> $3 AND seen = false
            "#,
        )
        .bind(conversation_id)
        .bind(message_id)
        .bind(exclude_sender)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
        viewer_id: i64,
        page: Pagination,
    ) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, sender_id, content, kind, seen, is_edited,
                   is_deleted, file_path, deleted_by, created_at, updated_at
            FROM messages
            WHERE conversation_id = $1 AND deleted_by IS DISTINCT FROM $2
            ORDER BY id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(conversation_id)
        .bind(viewer_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (name, username, phone, avatar, bio)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, username, phone, avatar, bio, last_online,
                      created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.phone)
        .bind(&user.avatar)
        .bind(&user.bio)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(user_from_row(&row)),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::Conflict("phone already registered".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, username, phone, avatar, bio, last_online,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| user_from_row(&r)))
    }

    async fn get_user_by_phone(&self, phone: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, username, phone, avatar, bio, last_online,
                   created_at, updated_at
            FROM users
            WHERE phone = $1
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| user_from_row(&r)))
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                avatar = COALESCE($3, avatar),
                bio = COALESCE($4, bio),
                last_online = COALESCE($5, last_online),
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, username, phone, avatar, bio, last_online,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.avatar)
        .bind(&patch.bio)
        .bind(patch.last_online)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| user_from_row(&r)))
    }

    async fn add_contact(&self, owner_id: i64, contact_id: i64) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO contacts (owner_id, contact_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(owner_id)
        .bind(contact_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_block(&self, user_id: i64, blocked_id: i64) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO blocks (user_id, blocked_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(blocked_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn is_blocked(&self, user: i64, by: i64) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM blocks WHERE user_id = $2 AND blocked_id = $1 LIMIT 1")
            .bind(user)
            .bind(by)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }
}

fn conversation_from_row(row: &PgRow) -> Conversation {
    let kind: String = row.get("kind");
    Conversation {
        id: row.get("id"),
        kind: ConversationKind::from_str(&kind),
        name: row.get("name"),
        image: row.try_get("image").ok(),
        description: row.try_get("description").ok(),
        direct_key: row.try_get("direct_key").ok(),
        last_chat_at: row.get("last_chat_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn member_from_row(row: &PgRow) -> ConversationMember {
    ConversationMember {
        user_id: row.get("user_id"),
        name: row.get("name"),
        avatar: row.try_get("avatar").ok(),
        joined_at: row.get("joined_at"),
    }
}

fn message_from_row(row: &PgRow) -> Message {
    let kind: String = row.get("kind");
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        kind: ChatKind::from_str(&kind),
        seen: row.get("seen"),
        is_edited: row.get("is_edited"),
        is_deleted: row.get("is_deleted"),
        file_path: row.try_get("file_path").ok(),
        deleted_by: row.try_get("deleted_by").ok(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        username: row.get("username"),
        phone: row.get("phone"),
        avatar: row.try_get("avatar").ok(),
        bio: row.try_get("bio").ok(),
        last_online: row.get("last_online"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
