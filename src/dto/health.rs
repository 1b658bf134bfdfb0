use serde::Serialize;
use utoipa::ToSchema;

/// Payload of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok`, or `degraded` while no storage backend is installed.
    pub status: String,
    /// Rooms currently registered.
    pub active_rooms: usize,
    /// Open player connections.
    pub connected_players: usize,
}

impl HealthResponse {
    /// Build a response from the degraded flag and live counters.
    pub fn new(degraded: bool, active_rooms: usize, connected_players: usize) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            active_rooms,
            connected_players,
        }
    }
}
