use std::sync::Arc;

use crate::config::Config;
use crate::services::{ConversationService, UserService};
use crate::websocket::gateway::Gateway;
use crate::websocket::RoomRegistry;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: RoomRegistry,
    pub engine: ConversationService,
    pub users: UserService,
    pub gateway: Arc<Gateway>,
    pub config: Arc<Config>,
}
