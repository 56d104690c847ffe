use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{
    direct_key, ChatKind, ConversationKind, ConversationPatch, ConversationWithMembers, Message,
    MessagePatch, NewConversation, NewMessage,
};
use crate::pagination::Pagination;
use crate::repository::ChatStore;

/// Optional presentation fields for a new conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationInput {
    pub name: String,
    pub image: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatInput {
    pub content: String,
    pub kind: ChatKind,
    pub file_path: Option<String>,
}

/// Fields a sender may change on their own message.
#[derive(Debug, Clone, Default)]
pub struct ChatEdit {
    pub content: Option<String>,
    pub is_deleted: Option<bool>,
    pub file_path: Option<String>,
}

/// Presentation fields a participant may change on a conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationUpdate {
    pub name: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn ChatStore>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        ConversationService { store }
    }

    fn is_member(view: &ConversationWithMembers, user_id: i64) -> bool {
        view.members.iter().any(|m| m.user_id == user_id)
    }

    /// Returns the direct conversation between the two users, creating it if
    /// it does not exist yet. At most one direct conversation exists per
    /// pair, regardless of who started it or how many clients raced to.
    pub async fn start_conversation(
        &self,
        initiator_id: i64,
        target_id: i64,
        input: ConversationInput,
    ) -> AppResult<ConversationWithMembers> {
        if initiator_id == target_id {
            return Err(AppError::BadRequest(
                "cannot start a conversation with yourself".to_string(),
            ));
        }

        if let Some(existing) = self
            .store
            .find_direct_conversation(initiator_id, target_id)
            .await?
        {
            return self
                .store
                .get_conversation(existing.id)
                .await?
                .ok_or(AppError::NotFound);
        }

        let new_conversation = NewConversation {
            kind: ConversationKind::Direct,
            name: input.name,
            image: input.image,
            description: input.description,
            direct_key: Some(direct_key(initiator_id, target_id)),
        };

        match self
            .store
            .create_conversation_with_members(new_conversation, &[initiator_id, target_id])
            .await
        {
            Ok(view) => Ok(view),
            // Lost the race to a concurrent starter; hand back the winner.
            Err(AppError::Conflict(_)) => {
                let existing = self
                    .store
                    .find_direct_conversation(initiator_id, target_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(
                            "direct conversation missing after unique conflict".to_string(),
                        )
                    })?;
                self.store
                    .get_conversation(existing.id)
                    .await?
                    .ok_or(AppError::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_conversation_by_users(
        &self,
        a: i64,
        b: i64,
    ) -> AppResult<ConversationWithMembers> {
        let conversation = self
            .store
            .find_direct_conversation(a, b)
            .await?
            .ok_or(AppError::NotFound)?;
        self.store
            .get_conversation(conversation.id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn get_conversation_by_id(&self, id: i64) -> AppResult<ConversationWithMembers> {
        self.store
            .get_conversation(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Sends a direct message. The conversation comes from `conversation_id`
    /// when given, otherwise it is found or created for the target user.
    /// Insertion, activity bump and seen propagation commit atomically.
    pub async fn send_chat(
        &self,
        sender_id: i64,
        target_user_id: Option<i64>,
        conversation_id: Option<i64>,
        input: ChatInput,
    ) -> AppResult<Message> {
        if input.content.trim().is_empty() {
            return Err(AppError::BadRequest("content cannot be empty".to_string()));
        }

        let conversation = match conversation_id {
            Some(id) => self.get_conversation_by_id(id).await?,
            None => {
                let target = target_user_id.ok_or_else(|| {
                    AppError::BadRequest(
                        "either conversationId or targetUserId is required".to_string(),
                    )
                })?;
                self.start_conversation(sender_id, target, ConversationInput::default())
                    .await?
            }
        };

        if !Self::is_member(&conversation, sender_id) {
            return Err(AppError::Forbidden);
        }

        self.store
            .create_message_marking_seen(NewMessage {
                conversation_id: conversation.conversation.id,
                sender_id,
                content: input.content,
                kind: input.kind,
                file_path: input.file_path,
            })
            .await
    }

    pub async fn send_chat_to_group(
        &self,
        sender_id: i64,
        conversation_id: i64,
        input: ChatInput,
    ) -> AppResult<Message> {
        if input.content.trim().is_empty() {
            return Err(AppError::BadRequest("content cannot be empty".to_string()));
        }

        let conversation = self.get_conversation_by_id(conversation_id).await?;
        if conversation.conversation.kind != ConversationKind::Group {
            return Err(AppError::BadRequest(
                "conversation is not a group".to_string(),
            ));
        }
        if !Self::is_member(&conversation, sender_id) {
            return Err(AppError::Forbidden);
        }

        self.store
            .create_message(NewMessage {
                conversation_id,
                sender_id,
                content: input.content,
                kind: input.kind,
                file_path: input.file_path,
            })
            .await
    }

    /// Edits a message. Only the sender can edit, and a content change marks
    /// the message as edited.
    pub async fn edit_chat(
        &self,
        chat_id: i64,
        sender_id: i64,
        edit: ChatEdit,
    ) -> AppResult<Message> {
        if edit.content.is_none() && edit.is_deleted.is_none() && edit.file_path.is_none() {
            return Err(AppError::BadRequest("nothing to edit".to_string()));
        }

        let patch = MessagePatch {
            is_edited: edit.content.is_some().then_some(true),
            content: edit.content,
            is_deleted: edit.is_deleted,
            file_path: edit.file_path,
            ..MessagePatch::default()
        };

        self.store
            .update_message(chat_id, sender_id, patch)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Removes a message. With `hide_from` set the message is only hidden
    /// from that user; otherwise it is gone for everyone. Either way only
    /// the sender may delete.
    pub async fn delete_chat(
        &self,
        chat_id: i64,
        sender_id: i64,
        hide_from: Option<i64>,
    ) -> AppResult<()> {
        let deleted = match hide_from {
            Some(user_id) => {
                self.store
                    .soft_delete_message(chat_id, sender_id, user_id)
                    .await?
            }
            None => self.store.delete_message(chat_id, sender_id).await?,
        };

        if !deleted {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Marks every message up to and including `message_id` as seen for the
    /// reader, leaving the reader's own messages untouched. Returns how many
    /// messages changed; repeating the call changes nothing further.
    pub async fn seen_chat(
        &self,
        conversation_id: i64,
        message_id: i64,
        user_id: i64,
    ) -> AppResult<u64> {
        let conversation = self.get_conversation_by_id(conversation_id).await?;
        if !Self::is_member(&conversation, user_id) {
            return Err(AppError::Forbidden);
        }

        self.store
            .mark_seen_up_to(conversation_id, message_id, user_id)
            .await
    }

    /// Adds users to a group, skipping ids that are already members.
    pub async fn add_member_to_group(
        &self,
        group_id: i64,
        user_ids: &[i64],
    ) -> AppResult<ConversationWithMembers> {
        if user_ids.is_empty() {
            return Err(AppError::BadRequest("no members to add".to_string()));
        }

        let conversation = self.get_conversation_by_id(group_id).await?;
        if conversation.conversation.kind != ConversationKind::Group {
            return Err(AppError::BadRequest(
                "members can only be added to group conversations".to_string(),
            ));
        }

        self.store.add_members(group_id, user_ids).await
    }

    /// Renames or re-describes a conversation. Only participants may do
    /// this; the activity timestamp stays in the hands of the send path.
    pub async fn update_conversation(
        &self,
        conversation_id: i64,
        user_id: i64,
        update: ConversationUpdate,
    ) -> AppResult<ConversationWithMembers> {
        if update.name.is_none() && update.image.is_none() && update.description.is_none() {
            return Err(AppError::BadRequest("nothing to update".to_string()));
        }
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(AppError::BadRequest("name cannot be empty".to_string()));
            }
            if name.len() > 255 {
                return Err(AppError::BadRequest(
                    "name too long (max 255 characters)".to_string(),
                ));
            }
        }
        if let Some(description) = &update.description {
            if description.len() > 1000 {
                return Err(AppError::BadRequest(
                    "description too long (max 1000 characters)".to_string(),
                ));
            }
        }

        let view = self.get_conversation_by_id(conversation_id).await?;
        if !Self::is_member(&view, user_id) {
            return Err(AppError::Forbidden);
        }

        let patch = ConversationPatch {
            name: update.name,
            image: update.image,
            description: update.description,
            ..ConversationPatch::default()
        };
        let updated = self
            .store
            .update_conversation(conversation_id, patch)
            .await?
            .ok_or(AppError::NotFound)?;

        Ok(ConversationWithMembers {
            conversation: updated,
            members: view.members,
            not_seen: 0,
        })
    }

    /// Lists the user's conversations, most recent activity first. Direct
    /// conversations display as the other participant.
    pub async fn get_conversation_list(
        &self,
        user_id: i64,
    ) -> AppResult<Vec<ConversationWithMembers>> {
        let mut conversations = self.store.list_conversations_for_user(user_id).await?;

        for view in &mut conversations {
            view.displayed_to(user_id);
        }

        Ok(conversations)
    }

    pub async fn get_conversation_chats(
        &self,
        conversation_id: i64,
        user_id: i64,
        page: Pagination,
    ) -> AppResult<Vec<Message>> {
        let conversation = self.get_conversation_by_id(conversation_id).await?;
        if !Self::is_member(&conversation, user_id) {
            return Err(AppError::Forbidden);
        }

        self.store.list_messages(conversation_id, user_id, page).await
    }

    pub async fn get_group_chats(
        &self,
        group_id: i64,
        user_id: i64,
        page: Pagination,
    ) -> AppResult<(ConversationWithMembers, Vec<Message>)> {
        let conversation = self.get_conversation_by_id(group_id).await?;
        if conversation.conversation.kind != ConversationKind::Group {
            return Err(AppError::NotFound);
        }
        if !Self::is_member(&conversation, user_id) {
            return Err(AppError::Forbidden);
        }

        let chats = self.store.list_messages(group_id, user_id, page).await?;
        Ok((conversation, chats))
    }

    /// Creates a group with the creator and one other user as the first
    /// members. More members come in through add_member_to_group.
    pub async fn create_group(
        &self,
        creator_id: i64,
        second_user_id: i64,
        input: ConversationInput,
    ) -> AppResult<ConversationWithMembers> {
        if input.name.trim().is_empty() {
            return Err(AppError::BadRequest("group name cannot be empty".to_string()));
        }
        if input.name.len() > 255 {
            return Err(AppError::BadRequest(
                "group name too long (max 255 characters)".to_string(),
            ));
        }
        if let Some(description) = &input.description {
            if description.len() > 1000 {
                return Err(AppError::BadRequest(
                    "description too long (max 1000 characters)".to_string(),
                ));
            }
        }
        if creator_id == second_user_id {
            return Err(AppError::BadRequest(
                "group needs a second member".to_string(),
            ));
        }

        self.store
            .create_conversation_with_members(
                NewConversation {
                    kind: ConversationKind::Group,
                    name: input.name,
                    image: input.image,
                    description: input.description,
                    direct_key: None,
                },
                &[creator_id, second_user_id],
            )
            .await
    }

    /// Removes a conversation with everything in it. Any participant may do
    /// this, outsiders may not.
    pub async fn delete_conversation(&self, conversation_id: i64, user_id: i64) -> AppResult<()> {
        let conversation = self.get_conversation_by_id(conversation_id).await?;
        if !Self::is_member(&conversation, user_id) {
            return Err(AppError::Forbidden);
        }

        if !self.store.delete_conversation(conversation_id).await? {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
