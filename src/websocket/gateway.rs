use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::pagination::Pagination;
use crate::services::{ChatEdit, ChatInput, ConversationInput, ConversationService, UserService};
use crate::websocket::events::{ClientEvent, Envelope};
use crate::websocket::{RoomRegistry, SessionId};

fn to_value<T: Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(format!("serialize response: {e}")))
}

/// Routes parsed client events into the domain services and handles the
/// room bookkeeping and fan-out around them. Broadcasts happen only after
/// the domain call came back, so nothing uncommitted ever leaves the server.
pub struct Gateway {
    engine: ConversationService,
    users: UserService,
    registry: RoomRegistry,
}

impl Gateway {
    pub fn new(engine: ConversationService, users: UserService, registry: RoomRegistry) -> Self {
        Gateway {
            engine,
            users,
            registry,
        }
    }

    /// Handles one raw inbound frame and produces the reply frame. Never
    /// fails: errors become failure envelopes for the sender.
    pub async fn dispatch(&self, user_id: i64, session_id: SessionId, raw: &str) -> Envelope {
        let event: ClientEvent = match serde_json::from_str(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "malformed client event");
                return Envelope::failure(
                    "error",
                    &AppError::BadRequest("malformed event".to_string()),
                );
            }
        };

        let event_type = event.event_type();
        match self.handle(user_id, session_id, event).await {
            Ok(data) => Envelope::success(event_type, data),
            Err(e) => {
                tracing::warn!(user_id, event = event_type, error = %e, "event failed");
                Envelope::failure(event_type, &e)
            }
        }
    }

    async fn handle(
        &self,
        user_id: i64,
        session_id: SessionId,
        event: ClientEvent,
    ) -> AppResult<Value> {
        match event {
            ClientEvent::StartConversation {
                target_id,
                name,
                image,
                description,
            } => {
                self.users.get_user_by_id(target_id).await?;
                if self.users.is_user_blocked(user_id, target_id).await? {
                    return Err(AppError::Forbidden);
                }

                let view = self
                    .engine
                    .start_conversation(
                        user_id,
                        target_id,
                        ConversationInput {
                            name: name.unwrap_or_default(),
                            image,
                            description,
                        },
                    )
                    .await?;

                let conversation_id = view.conversation.id;
                self.registry.join_room(conversation_id, user_id).await;
                self.registry.join_room(conversation_id, target_id).await;

                to_value(&view)
            }

            ClientEvent::ConversationList => {
                let list = self.engine.get_conversation_list(user_id).await?;
                to_value(&list)
            }

            ClientEvent::SendChat {
                content,
                target_user_id,
                conversation_id,
                kind,
                file_path,
            } => {
                let message = self
                    .engine
                    .send_chat(
                        user_id,
                        target_user_id,
                        conversation_id,
                        ChatInput {
                            content,
                            kind: kind.unwrap_or_default(),
                            file_path,
                        },
                    )
                    .await?;

                // The send may have just created the conversation; get both
                // sides' live sessions into the room before fanning out.
                self.registry.join_room(message.conversation_id, user_id).await;
                if let Some(target) = target_user_id {
                    self.registry.join_room(message.conversation_id, target).await;
                }

                self.registry
                    .broadcast(
                        message.conversation_id,
                        Some(session_id),
                        &Envelope::chat_back(&message).to_json(),
                    )
                    .await;

                to_value(&message)
            }

            ClientEvent::ConversationChats {
                conversation_id,
                page,
                page_size,
            } => {
                let mut view = self.engine.get_conversation_by_id(conversation_id).await?;
                view.displayed_to(user_id);

                let chats = self
                    .engine
                    .get_conversation_chats(
                        conversation_id,
                        user_id,
                        Pagination::from_page(page, page_size),
                    )
                    .await?;

                let chats = to_value(&chats)?;
                Ok(json!({
                    "id": conversation_id,
                    "name": view.conversation.name,
                    "chats": chats,
                }))
            }

            ClientEvent::DeleteConversation { conversation_id } => {
                self.engine.delete_conversation(conversation_id, user_id).await?;
                self.registry.drop_room(conversation_id).await;
                Ok(json!({ "success": true }))
            }

            ClientEvent::EditChat {
                chat_id,
                content,
                is_deleted,
                file_path,
            } => {
                let message = self
                    .engine
                    .edit_chat(
                        chat_id,
                        user_id,
                        ChatEdit {
                            content,
                            is_deleted,
                            file_path,
                        },
                    )
                    .await?;
                to_value(&message)
            }

            ClientEvent::DeleteChat { chat_id, for_me } => {
                let hide_from = if for_me.unwrap_or(false) {
                    Some(user_id)
                } else {
                    None
                };
                self.engine.delete_chat(chat_id, user_id, hide_from).await?;
                Ok(json!({ "success": true }))
            }

            ClientEvent::SeenChat {
                chat_id,
                conversation_id,
            } => {
                self.engine.seen_chat(conversation_id, chat_id, user_id).await?;
                Ok(json!({ "success": true }))
            }

            ClientEvent::CreateGroup {
                name,
                second_user_id,
                image,
                description,
            } => {
                self.users.get_user_by_id(second_user_id).await?;

                let view = self
                    .engine
                    .create_group(
                        user_id,
                        second_user_id,
                        ConversationInput {
                            name,
                            image,
                            description,
                        },
                    )
                    .await?;

                let conversation_id = view.conversation.id;
                self.registry.join_room(conversation_id, user_id).await;
                self.registry.join_room(conversation_id, second_user_id).await;

                to_value(&view)
            }

            ClientEvent::AddMember { group_id, user_ids } => {
                let view = self.engine.add_member_to_group(group_id, &user_ids).await?;
                for added in &user_ids {
                    self.registry.join_room(group_id, *added).await;
                }
                to_value(&view)
            }

            ClientEvent::SendToGroup {
                conversation_id,
                content,
                kind,
                file_path,
            } => {
                let message = self
                    .engine
                    .send_chat_to_group(
                        user_id,
                        conversation_id,
                        ChatInput {
                            content,
                            kind: kind.unwrap_or_default(),
                            file_path,
                        },
                    )
                    .await?;

                self.registry
                    .broadcast(
                        conversation_id,
                        Some(session_id),
                        &Envelope::chat_back(&message).to_json(),
                    )
                    .await;

                to_value(&message)
            }

            ClientEvent::GroupChatList {
                group_id,
                page,
                page_size,
            } => {
                let (view, chats) = self
                    .engine
                    .get_group_chats(group_id, user_id, Pagination::from_page(page, page_size))
                    .await?;

                let chats = to_value(&chats)?;
                Ok(json!({
                    "id": view.conversation.id,
                    "name": view.conversation.name,
                    "chats": chats,
                }))
            }

            ClientEvent::DeleteChatGroup { chat_id } => {
                self.engine.delete_chat(chat_id, user_id, None).await?;
                Ok(json!({ "success": true }))
            }

            ClientEvent::AddContact { phone } => {
                let contact = self.users.add_contact(user_id, &phone).await?;
                to_value(&contact)
            }

            ClientEvent::BlockUser { phone } => {
                let blocked = self.users.block_user(user_id, &phone).await?;
                to_value(&blocked)
            }
        }
    }
}
