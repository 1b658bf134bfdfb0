use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};

use crate::{
    dto::ws::WsAuthQuery,
    error::{AppError, ServiceError},
    services::{gateway, websocket_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "realtime",
    params(WsAuthQuery),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "Missing, invalid or unknown token"),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Authenticate the caller, then upgrade into a player WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let token =
        gateway::extract_token(&headers, query.token.as_deref()).map_err(ServiceError::from)?;
    let user = gateway::authenticate(&state, &token).await?;
    Ok(ws.on_upgrade(move |socket| websocket_service::handle_socket(state, user, socket)))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
