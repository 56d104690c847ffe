use std::sync::Arc;

use chat_service::models::{ChatKind, NewUser};
use chat_service::repository::MemoryStore;
use chat_service::services::{ChatInput, ConversationService, UserService};

/// Everything a test needs: the raw store (for fault injection) plus the
/// services wired to it.
#[allow(dead_code)]
pub struct TestBackend {
    pub store: Arc<MemoryStore>,
    pub engine: ConversationService,
    pub users: UserService,
}

#[allow(dead_code)]
pub fn backend() -> TestBackend {
    let store = Arc::new(MemoryStore::new());
    TestBackend {
        engine: ConversationService::new(store.clone()),
        users: UserService::new(store.clone()),
        store,
    }
}

#[allow(dead_code)]
pub async fn seed_user(users: &UserService, name: &str, phone: &str) -> i64 {
    users
        .create_user(NewUser {
            name: name.to_string(),
            username: name.to_lowercase(),
            phone: phone.to_string(),
            avatar: None,
            bio: None,
        })
        .await
        .expect("seed user")
        .id
}

#[allow(dead_code)]
pub fn chat(content: &str) -> ChatInput {
    ChatInput {
        content: content.to_string(),
        kind: ChatKind::Text,
        file_path: None,
    }
}
