use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the store, when installed, and report live counters.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.arena_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (degraded mode)"),
    }

    HealthResponse::new(
        state.is_degraded().await,
        state.rooms().len(),
        state.connections().len(),
    )
}
