use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::public::{MultiplayerStatsResponse, UserIdPath},
    error::AppError,
    services::public_service,
    state::SharedState,
};

/// Player statistics endpoints.
pub fn router() -> Router<SharedState> {
    Router::new().route("/users/{userId}/multiplayer-stats", get(get_multiplayer_stats))
}

#[utoipa::path(
    get,
    path = "/users/{userId}/multiplayer-stats",
    tag = "users",
    params(UserIdPath),
    responses(
        (status = 200, description = "Games played, wins and win rate", body = MultiplayerStatsResponse),
        (status = 404, description = "Unknown user"),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Return the multiplayer record of a user.
pub async fn get_multiplayer_stats(
    State(state): State<SharedState>,
    Valid(Path(path)): Valid<Path<UserIdPath>>,
) -> Result<Json<MultiplayerStatsResponse>, AppError> {
    let stats = public_service::multiplayer_stats(&state, &path.user_id).await?;
    Ok(Json(stats))
}
