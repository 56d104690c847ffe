pub mod conversation;
pub mod message;
pub mod user;

pub use conversation::{
    direct_key, Conversation, ConversationKind, ConversationMember, ConversationPatch,
    ConversationWithMembers, NewConversation,
};
pub use message::{ChatKind, Message, MessagePatch, NewMessage};
pub use user::{NewUser, User, UserPatch};
