use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conversation::ConversationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Text,
    Voice,
    Image,
}

impl Default for ChatKind {
    fn default() -> Self {
        ChatKind::Text
    }
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Text => "text",
            ChatKind::Voice => "voice",
            ChatKind::Image => "image",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "voice" => ChatKind::Voice,
            "image" => ChatKind::Image,
            _ => ChatKind::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: ChatKind,
    pub seen: bool,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub file_path: Option<String>,
    /// Set when one participant removed the message for themselves only.
    pub deleted_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub kind: ChatKind,
    pub file_path: Option<String>,
}

/// Fields left as None keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub seen: Option<bool>,
    pub is_edited: Option<bool>,
    pub is_deleted: Option<bool>,
    pub file_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_kind_default_is_text() {
        assert_eq!(ChatKind::default(), ChatKind::Text);
        assert_eq!(ChatKind::from_str("unknown"), ChatKind::Text);
    }

    #[test]
    fn test_message_wire_shape() {
        let msg = Message {
            id: 42,
            conversation_id: 7,
            sender_id: 1,
            content: "hello".to_string(),
            kind: ChatKind::Voice,
            seen: false,
            is_edited: false,
            is_deleted: false,
            file_path: Some("/uploads/v1.ogg".to_string()),
            deleted_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "voice");
        assert_eq!(json["conversationId"], 7);
        assert_eq!(json["filePath"], "/uploads/v1.ogg");
        assert_eq!(json["isEdited"], false);
    }

    #[test]
    fn test_kind_enums_agree_on_wire_names() {
        assert_eq!(
            serde_json::to_value(ConversationKind::Group).unwrap(),
            "group"
        );
        assert_eq!(serde_json::to_value(ChatKind::Image).unwrap(), "image");
    }
}
