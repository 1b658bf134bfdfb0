use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the quiz arena backend.
#[openapi(
    info(
        title = "Quiz Arena",
        description = "Real-time multiplayer quiz rooms. Gameplay happens over `/ws`; \
                       frames are `{ \"event\": ..., \"data\": ... }` JSON objects."
    ),
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::get_room,
        crate::routes::users::get_multiplayer_stats,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::public::WaitingRoomsResponse,
            crate::dto::public::MultiplayerStatsResponse,
            crate::dto::room::RoomSnapshot,
            crate::dto::room::RoomSummary,
            crate::dto::ws::CreateRoomRequest,
            crate::dto::ws::JoinRoomRequest,
            crate::dto::ws::SubmitAnswerRequest,
            crate::dto::ws::ChatMessageRequest,
            crate::dto::ws::NewQuestionEvent,
            crate::dto::ws::QuestionResultsEvent,
            crate::dto::ws::QuizFinishedEvent,
            crate::dto::ws::ErrorEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room discovery"),
        (name = "users", description = "Player statistics"),
        (name = "realtime", description = "WebSocket gameplay channel"),
    )
)]
pub struct ApiDoc;
