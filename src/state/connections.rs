use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::models::UserProfileEntity,
    dto::{room::ProfileSummary, ws::ServerMessage},
};

/// Identity resolved by the gateway and attached to a connection for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Stable user identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Level at connection time.
    pub level: u32,
    /// Experience at connection time.
    pub xp: u64,
}

impl From<UserProfileEntity> for UserProfile {
    fn from(value: UserProfileEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            level: value.level,
            xp: value.xp,
        }
    }
}

impl From<&UserProfile> for ProfileSummary {
    fn from(value: &UserProfile) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            level: value.level,
            xp: value.xp,
        }
    }
}

/// Handle used to push messages to one connected client.
#[derive(Clone)]
pub struct ClientConnection {
    /// Connection identifier, unique per websocket.
    pub id: Uuid,
    /// Authenticated user behind the connection.
    pub user: UserProfile,
    /// Writer channel drained by the websocket writer task.
    pub tx: mpsc::UnboundedSender<ServerMessage>,
    /// Code of the room the connection currently plays in.
    pub room: Option<String>,
}

/// Registry of live client connections keyed by connection id.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, ClientConnection>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly authenticated connection and return its session and
    /// the receiving end of its writer channel.
    pub fn register(
        &self,
        user: UserProfile,
    ) -> (ClientSession, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.connections.insert(
            id,
            ClientConnection {
                id,
                user: user.clone(),
                tx: tx.clone(),
                room: None,
            },
        );
        (ClientSession { id, user, tx }, rx)
    }

    /// Forget a connection.
    pub fn unregister(&self, id: Uuid) {
        self.connections.remove(&id);
    }

    /// Room the connection currently belongs to.
    pub fn room_of(&self, id: Uuid) -> Option<String> {
        self.connections.get(&id).and_then(|entry| entry.room.clone())
    }

    /// Record (or clear) the room a connection belongs to.
    pub fn set_room(&self, id: Uuid, room: Option<String>) {
        if let Some(mut entry) = self.connections.get_mut(&id) {
            entry.room = room;
        }
    }

    /// Push a message to one connection, ignoring closed writers.
    pub fn send(&self, id: Uuid, message: ServerMessage) {
        let Some(tx) = self.connections.get(&id).map(|entry| entry.tx.clone()) else {
            debug!(connection = %id, "dropping message for unknown connection");
            return;
        };
        if tx.send(message).is_err() {
            debug!(connection = %id, "writer closed; message dropped");
        }
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Per-connection context handed to the room services.
#[derive(Clone)]
pub struct ClientSession {
    /// Connection identifier.
    pub id: Uuid,
    /// Authenticated user.
    pub user: UserProfile,
    /// Direct writer channel of this connection.
    pub tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ClientSession {
    /// Push a message to this connection only.
    pub fn send(&self, message: ServerMessage) {
        let _ = self.tx.send(message);
    }
}
