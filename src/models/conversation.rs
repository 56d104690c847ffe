use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationKind {
    #[serde(rename = "direct")]
    Direct,
    #[serde(rename = "group")]
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Direct => "direct",
            ConversationKind::Group => "group",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "group" => ConversationKind::Group,
            _ => ConversationKind::Direct,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    pub name: String,
    pub image: Option<String>,
    pub description: Option<String>,
    /// Uniqueness key for direct conversations, never exposed on the wire.
    #[serde(skip_serializing)]
    pub direct_key: Option<String>,
    pub last_chat_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMember {
    pub user_id: i64,
    pub name: String,
    pub avatar: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// Conversation plus its membership, the unit most operations hand back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationWithMembers {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub members: Vec<ConversationMember>,
    /// Count of unseen messages from other senders. Populated by the
    /// conversation list, zero elsewhere.
    pub not_seen: i64,
}

impl ConversationWithMembers {
    /// A direct conversation's stored name and image are meaningless; to the
    /// viewer it displays as the other participant.
    pub fn displayed_to(&mut self, viewer_id: i64) {
        if self.conversation.kind == ConversationKind::Direct {
            if let Some(other) = self.members.iter().find(|m| m.user_id != viewer_id) {
                self.conversation.name = other.name.clone();
                self.conversation.image = other.avatar.clone();
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub kind: ConversationKind,
    pub name: String,
    pub image: Option<String>,
    pub description: Option<String>,
    pub direct_key: Option<String>,
}

/// Fields a caller may change on an existing conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub name: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub last_chat_at: Option<DateTime<Utc>>,
}

/// Canonical key for a direct pair, identical regardless of argument order.
pub fn direct_key(a: i64, b: i64) -> String {
    format!("{}:{}", a.min(b), a.max(b))
}
