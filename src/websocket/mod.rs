use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod events;
pub mod gateway;
pub mod session;

/// Unique identifier for a WebSocket session
///
/// Each connection gets a fresh id on registration so cleanup and origin
/// exclusion address exactly one connection, even when a user has several
/// open at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// One live session inside a room
struct RoomMember {
    session_id: SessionId,
    user_id: i64,
    sender: UnboundedSender<String>,
}

/// Per-session handle kept so later room joins can find the connection
struct SessionHandle {
    user_id: i64,
    sender: UnboundedSender<String>,
}

#[derive(Default)]
struct RegistryState {
    // conversation_id -> live sessions of its members
    rooms: HashMap<i64, Vec<RoomMember>>,
    sessions: HashMap<SessionId, SessionHandle>,
}

/// Room registry for WebSocket sessions
///
/// Tracks which live sessions sit in which conversation rooms so a committed
/// message can be pushed to everyone else in the room. Fan-out never touches
/// the database; a room holds plain channel senders.
#[derive(Default, Clone)]
pub struct RoomRegistry {
    inner: Arc<RwLock<RegistryState>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and place it in all given rooms
    ///
    /// Returns a tuple of (session_id, receiver) where:
    /// - session_id: addresses this connection in later calls
    /// - receiver: carries every frame broadcast to the session's rooms
    pub async fn register_session(
        &self,
        user_id: i64,
        rooms: &[i64],
    ) -> (SessionId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let session_id = SessionId::new();

        let mut guard = self.inner.write().await;
        guard.sessions.insert(
            session_id,
            SessionHandle {
                user_id,
                sender: tx.clone(),
            },
        );
        for conversation_id in rooms {
            guard
                .rooms
                .entry(*conversation_id)
                .or_default()
                .push(RoomMember {
                    session_id,
                    user_id,
                    sender: tx.clone(),
                });
        }

        tracing::debug!(
            "Registered session {:?} for user {} in {} rooms",
            session_id,
            user_id,
            rooms.len()
        );

        (session_id, rx)
    }

    /// Remove a session from the registry and every room it joined
    ///
    /// Must be called when the connection closes, otherwise rooms keep dead
    /// senders around until the next broadcast sweeps them out.
    pub async fn deregister_session(&self, session_id: SessionId) {
        let mut guard = self.inner.write().await;
        guard.sessions.remove(&session_id);
        guard.rooms.retain(|_, members| {
            members.retain(|m| m.session_id != session_id);
            !members.is_empty()
        });

        tracing::debug!("Deregistered session {:?}", session_id);
    }

    /// Add every live session of a user to a room
    ///
    /// Called when a conversation is created or gains a member, so both
    /// sides start receiving frames without reconnecting. Sessions already
    /// in the room stay put; users with no live session are skipped.
    pub async fn join_room(&self, conversation_id: i64, user_id: i64) {
        let mut guard = self.inner.write().await;
        let handles: Vec<(SessionId, UnboundedSender<String>)> = guard
            .sessions
            .iter()
            .filter(|(_, h)| h.user_id == user_id)
            .map(|(id, h)| (*id, h.sender.clone()))
            .collect();
        if handles.is_empty() {
            return;
        }

        let members = guard.rooms.entry(conversation_id).or_default();
        for (session_id, sender) in handles {
            if !members.iter().any(|m| m.session_id == session_id) {
                members.push(RoomMember {
                    session_id,
                    user_id,
                    sender,
                });
            }
        }
    }

    /// Remove one session from one room
    pub async fn leave_room(&self, conversation_id: i64, session_id: SessionId) {
        let mut guard = self.inner.write().await;
        if let Some(members) = guard.rooms.get_mut(&conversation_id) {
            members.retain(|m| m.session_id != session_id);
            if members.is_empty() {
                guard.rooms.remove(&conversation_id);
            }
        }
    }

    /// Drop a whole room, e.g. after its conversation was deleted
    pub async fn drop_room(&self, conversation_id: i64) {
        let mut guard = self.inner.write().await;
        guard.rooms.remove(&conversation_id);
    }

    /// Push a frame to every session in a room except the origin
    ///
    /// Each surviving session receives the frame at most once. Dead senders
    /// (where send fails) are cleaned up on the way.
    pub async fn broadcast(&self, conversation_id: i64, origin: Option<SessionId>, payload: &str) {
        let mut guard = self.inner.write().await;
        if let Some(members) = guard.rooms.get_mut(&conversation_id) {
            let before = members.len();

            members.retain(|member| {
                if Some(member.session_id) == origin {
                    return true;
                }
                member.sender.send(payload.to_string()).is_ok()
            });

            let after = members.len();
            if before != after {
                tracing::debug!(
                    "Broadcast to room {}: {} dead senders cleaned up, {} active",
                    conversation_id,
                    before - after,
                    after
                );
            }

            if members.is_empty() {
                guard.rooms.remove(&conversation_id);
            }
        }
    }

    /// Live session count for a room (for debugging and tests)
    pub async fn sessions_in_room(&self, conversation_id: i64) -> usize {
        let guard = self.inner.read().await;
        guard
            .rooms
            .get(&conversation_id)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}
