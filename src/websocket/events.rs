//! WebSocket event catalog
//!
//! Every client frame carries an event name and a data object:
//!
//! ```json
//! {
//!     "event": "send.chat",
//!     "data": { "content": "hi", "targetUserId": 2 }
//! }
//! ```
//!
//! Replies and pushed frames use the same envelope with the standard
//! response body flattened in:
//!
//! ```json
//! {
//!     "event": "send.chat",
//!     "status": "success",
//!     "message": "success",
//!     "data": { ... }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::models::{ChatKind, Message};
use crate::response::StdResponse;

/// Client-to-server events
///
/// The enum is exhaustive - every event a client may send is listed here,
/// named object.action. Unknown names fail to parse and come back as a
/// bad request frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    // ============================================================
    // Direct Conversations
    // ============================================================
    /// Open (or return) the direct conversation with another user
    #[serde(rename = "start.conversation", rename_all = "camelCase")]
    StartConversation {
        target_id: i64,
        name: Option<String>,
        image: Option<String>,
        description: Option<String>,
    },

    /// List the caller's conversations, most recent first
    #[serde(rename = "conversation.list")]
    ConversationList,

    /// Send a direct message, creating the conversation if needed
    #[serde(rename = "send.chat", rename_all = "camelCase")]
    SendChat {
        content: String,
        target_user_id: Option<i64>,
        conversation_id: Option<i64>,
        kind: Option<ChatKind>,
        file_path: Option<String>,
    },

    /// Page through one conversation's messages, newest first
    #[serde(rename = "conversation.chats", rename_all = "camelCase")]
    ConversationChats {
        conversation_id: i64,
        page: Option<i64>,
        page_size: Option<i64>,
    },

    /// Delete a whole conversation with everything in it
    #[serde(rename = "delete.conversation", rename_all = "camelCase")]
    DeleteConversation { conversation_id: i64 },

    // ============================================================
    // Message Lifecycle
    // ============================================================
    /// Edit one of the caller's own messages
    #[serde(rename = "edit.chat", rename_all = "camelCase")]
    EditChat {
        chat_id: i64,
        content: Option<String>,
        is_deleted: Option<bool>,
        file_path: Option<String>,
    },

    /// Delete one of the caller's own messages, for everyone or
    /// (with forMe) just hidden from the caller
    #[serde(rename = "delete.chat", rename_all = "camelCase")]
    DeleteChat {
        chat_id: i64,
        for_me: Option<bool>,
    },

    /// Mark everything up to and including chatId as seen
    #[serde(rename = "seen.chat", rename_all = "camelCase")]
    SeenChat {
        chat_id: i64,
        conversation_id: i64,
    },

    // ============================================================
    // Groups
    // ============================================================
    /// Create a group with the caller and one other user
    #[serde(rename = "create.group", rename_all = "camelCase")]
    CreateGroup {
        name: String,
        second_user_id: i64,
        image: Option<String>,
        description: Option<String>,
    },

    /// Add users to a group
    #[serde(rename = "add.member", rename_all = "camelCase")]
    AddMember { group_id: i64, user_ids: Vec<i64> },

    /// Send a message into a group
    #[serde(rename = "send.to.group", rename_all = "camelCase")]
    SendToGroup {
        conversation_id: i64,
        content: String,
        kind: Option<ChatKind>,
        file_path: Option<String>,
    },

    /// Page through a group's messages, newest first
    #[serde(rename = "group.chat.list", rename_all = "camelCase")]
    GroupChatList {
        group_id: i64,
        page: Option<i64>,
        page_size: Option<i64>,
    },

    /// Delete one of the caller's own group messages for everyone
    #[serde(rename = "delete.chat.group", rename_all = "camelCase")]
    DeleteChatGroup { chat_id: i64 },

    // ============================================================
    // Contacts
    // ============================================================
    /// Add the user behind a phone number to the caller's contacts
    #[serde(rename = "add.contact")]
    AddContact { phone: String },

    /// Block the user behind a phone number
    #[serde(rename = "block.user")]
    BlockUser { phone: String },
}

impl ClientEvent {
    /// Get event type as string (e.g., "send.chat")
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StartConversation { .. } => "start.conversation",
            Self::ConversationList => "conversation.list",
            Self::SendChat { .. } => "send.chat",
            Self::ConversationChats { .. } => "conversation.chats",
            Self::DeleteConversation { .. } => "delete.conversation",
            Self::EditChat { .. } => "edit.chat",
            Self::DeleteChat { .. } => "delete.chat",
            Self::SeenChat { .. } => "seen.chat",
            Self::CreateGroup { .. } => "create.group",
            Self::AddMember { .. } => "add.member",
            Self::SendToGroup { .. } => "send.to.group",
            Self::GroupChatList { .. } => "group.chat.list",
            Self::DeleteChatGroup { .. } => "delete.chat.group",
            Self::AddContact { .. } => "add.contact",
            Self::BlockUser { .. } => "block.user",
        }
    }
}

/// Server-to-client frame: the event name plus the standard response body
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub event: String,
    #[serde(flatten)]
    pub body: StdResponse,
}

impl Envelope {
    pub fn success(event: &str, data: Value) -> Self {
        Envelope {
            event: event.to_string(),
            body: StdResponse::success(data),
        }
    }

    pub fn failure(event: &str, err: &AppError) -> Self {
        Envelope {
            event: event.to_string(),
            body: StdResponse::failure(err),
        }
    }

    /// Frame pushed to the other sessions of a conversation after a send
    pub fn chat_back(message: &Message) -> Self {
        Envelope::success(
            "send.chat.back",
            json!({
                "chatId": message.id,
                "content": message.content,
                "createdAt": message.created_at,
            }),
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"event":"error","status":"internal error","message":"serialization failed","data":null}"#
                .to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_event_type_naming() {
        let event = ClientEvent::SeenChat {
            chat_id: 10,
            conversation_id: 3,
        };
        assert_eq!(event.event_type(), "seen.chat");
    }

    #[test]
    fn test_parse_send_chat() {
        let raw = r#"{"event":"send.chat","data":{"content":"hi","targetUserId":2}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::SendChat {
                content,
                target_user_id,
                conversation_id,
                kind,
                ..
            } => {
                assert_eq!(content, "hi");
                assert_eq!(target_user_id, Some(2));
                assert_eq!(conversation_id, None);
                assert_eq!(kind, None);
            }
            other => panic!("parsed as {:?}", other),
        }
    }

    #[test]
    fn test_parse_unit_event_without_data() {
        let raw = r#"{"event":"conversation.list"}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event_type(), "conversation.list");
    }

    #[test]
    fn test_unknown_event_fails_to_parse() {
        let raw = r#"{"event":"no.such.event","data":{}}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn test_envelope_shape() {
        let frame = Envelope::success("conversation.list", json!([]));
        let parsed: Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(parsed["event"], "conversation.list");
        assert_eq!(parsed["status"], "success");
        assert_eq!(parsed["message"], "success");
        assert!(parsed["data"].is_array());
    }

    #[test]
    fn test_failure_envelope_uses_public_message() {
        let frame = Envelope::failure("send.chat", &AppError::Forbidden);
        let parsed: Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(parsed["event"], "send.chat");
        assert_eq!(parsed["status"], "permission denied");
        assert!(parsed["data"].is_null());
    }

    #[test]
    fn test_chat_back_payload_keys() {
        let message = Message {
            id: 9,
            conversation_id: 4,
            sender_id: 1,
            content: "pushed".to_string(),
            kind: ChatKind::Text,
            seen: false,
            is_edited: false,
            is_deleted: false,
            file_path: None,
            deleted_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let parsed: Value = serde_json::from_str(&Envelope::chat_back(&message).to_json()).unwrap();
        assert_eq!(parsed["event"], "send.chat.back");
        assert_eq!(parsed["data"]["chatId"], 9);
        assert_eq!(parsed["data"]["content"], "pushed");
        assert!(parsed["data"]["createdAt"].is_string());
    }
}
