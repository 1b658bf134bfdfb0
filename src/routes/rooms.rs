use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::{
        public::{RoomCodePath, WaitingRoomsResponse},
        room::RoomSnapshot,
    },
    error::AppError,
    services::public_service,
    state::SharedState,
};

/// Room discovery endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/{code}", get(get_room))
}

#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    responses((status = 200, description = "Rooms waiting for players, oldest first", body = WaitingRoomsResponse))
)]
/// List the rooms that can still be joined.
pub async fn list_rooms(State(state): State<SharedState>) -> Json<WaitingRoomsResponse> {
    Json(public_service::list_waiting_rooms(&state).await)
}

#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(RoomCodePath),
    responses(
        (status = 200, description = "Room state", body = RoomSnapshot),
        (status = 400, description = "Malformed room code"),
        (status = 404, description = "Unknown room")
    )
)]
/// Return the status, players and progress of one room.
pub async fn get_room(
    State(state): State<SharedState>,
    Valid(Path(path)): Valid<Path<RoomCodePath>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = public_service::room_status(&state, &path.code).await?;
    Ok(Json(snapshot))
}
