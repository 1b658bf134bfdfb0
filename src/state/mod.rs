/// Live websocket connections and the profiles attached to them.
pub mod connections;
/// XP, level and badge rules applied after a match.
pub mod progression;
/// In-memory quiz and room settings.
pub mod quiz;
/// Code-keyed index of live rooms.
pub mod registry;
/// Room aggregate.
pub mod room;
/// Answer normalization and per-question points.
pub mod scoring;
/// Room lifecycle phases and transitions.
pub mod state_machine;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    config::AppConfig,
    dao::arena_store::ArenaStore,
    services::gateway::IdentityVerifier,
    state::{connections::ConnectionRegistry, registry::RoomRegistry},
};

/// Handle shared by every route and task.
pub type SharedState = Arc<AppState>;

/// Central application state: live rooms, live connections and the storage handle.
pub struct AppState {
    config: AppConfig,
    arena_store: RwLock<Option<Arc<dyn ArenaStore>>>,
    verifier: Arc<dyn IdentityVerifier>,
    rooms: RoomRegistry,
    connections: ConnectionRegistry,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, verifier: Arc<dyn IdentityVerifier>) -> SharedState {
        Arc::new(Self {
            config,
            arena_store: RwLock::new(None),
            verifier,
            rooms: RoomRegistry::new(),
            connections: ConnectionRegistry::new(),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Verifier used by the connection gateway.
    pub fn verifier(&self) -> &dyn IdentityVerifier {
        self.verifier.as_ref()
    }

    /// Registry of live rooms.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Registry of live websocket connections.
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn arena_store(&self) -> Option<Arc<dyn ArenaStore>> {
        let guard = self.arena_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a store implementation and leave degraded mode.
    pub async fn install_arena_store(&self, store: Arc<dyn ArenaStore>) {
        *self.arena_store.write().await = Some(store);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_arena_store(&self) {
        self.arena_store.write().await.take();
    }

    /// Degraded while no store is installed.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.arena_store.read().await;
        guard.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dao::arena_store::memory::MemoryArenaStore, services::gateway::JwtVerifier};

    #[tokio::test]
    async fn degraded_tracks_the_installed_store() {
        let state = AppState::new(AppConfig::default(), Arc::new(JwtVerifier::new("secret")));
        assert!(state.is_degraded().await);
        assert!(state.arena_store().await.is_none());

        state
            .install_arena_store(Arc::new(MemoryArenaStore::new()))
            .await;
        assert!(!state.is_degraded().await);
        assert!(state.arena_store().await.is_some());

        state.clear_arena_store().await;
        assert!(state.is_degraded().await);
    }
}
