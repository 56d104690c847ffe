pub mod conversation_service;
pub mod user_service;

pub use conversation_service::{
    ChatEdit, ChatInput, ConversationInput, ConversationService, ConversationUpdate,
};
pub use user_service::UserService;
