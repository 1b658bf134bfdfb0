//! Frames exchanged over the `/ws` endpoint.
//!
//! Every frame is a JSON object `{ "event": "<name>", "data": { ... } }`.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::dao::models::AnswerValue;
use crate::dto::room::{
    LeaderboardEntry, PlayerQuestionResult, PlayerSummary, ProfileSummary, QuestionPrompt,
    RoomSnapshot,
};

/// Query parameters of the `/ws` upgrade request.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WsAuthQuery {
    /// Bearer token, for clients that cannot set an `Authorization` header.
    pub token: Option<String>,
}

/// Messages accepted from players.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a room around a quiz and become its host.
    CreateRoom(CreateRoomRequest),
    /// Join a waiting room by code.
    JoinRoom(JoinRoomRequest),
    /// Host only: start the match.
    StartQuiz {},
    /// Answer the open question.
    SubmitAnswer(SubmitAnswerRequest),
    /// Leave the current room.
    LeaveRoom {},
    /// Send a chat line to the current room.
    ChatMessage(ChatMessageRequest),
}

impl ClientMessage {
    /// Parse a text frame. A missing or `null` `data` reads as `{}`, so
    /// `{"event":"start_quiz"}` is accepted.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        let mut frame: serde_json::Value = serde_json::from_str(text)?;
        if let Some(object) = frame.as_object_mut() {
            let data = object
                .entry("data")
                .or_insert(serde_json::Value::Null);
            if data.is_null() {
                *data = serde_json::Value::Object(serde_json::Map::new());
            }
        }
        serde_json::from_value(frame)
    }

    /// Event name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::CreateRoom(_) => "create_room",
            ClientMessage::JoinRoom(_) => "join_room",
            ClientMessage::StartQuiz {} => "start_quiz",
            ClientMessage::SubmitAnswer(_) => "submit_answer",
            ClientMessage::LeaveRoom {} => "leave_room",
            ClientMessage::ChatMessage(_) => "chat_message",
        }
    }
}

/// Payload of `create_room`.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Quiz to play.
    #[validate(length(min = 1, max = 128))]
    pub quiz_id: String,
    /// Room settings.
    #[serde(default)]
    #[validate(nested)]
    pub settings: RoomSettingsInput,
}

/// Optional room settings; omitted values use the configured defaults.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettingsInput {
    /// Player cap.
    #[validate(range(min = 2, max = 50))]
    pub max_players: Option<u32>,
    /// Seconds per question.
    #[validate(range(min = 5, max = 300))]
    pub time_per_question: Option<u32>,
    /// Questions played.
    #[validate(range(min = 1, max = 100))]
    pub question_count: Option<u32>,
}

/// Payload of `join_room`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    /// Room code, case-insensitive.
    pub room_id: String,
}

/// Payload of `submit_answer`.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    /// Option index, option letter or option text.
    pub answer: AnswerValue,
    /// Seconds the player took; measured server-side when omitted.
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub time_spent: Option<f64>,
}

/// Payload of `chat_message` sent by a player.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    /// Message text.
    #[validate(length(min = 1, max = 500))]
    pub message: String,
}

/// Messages pushed to players.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame after a successful handshake.
    Authenticated(AuthenticatedEvent),
    /// Sent to the creator of a room.
    RoomCreated(RoomCreatedEvent),
    /// Sent to a player who just joined.
    RoomJoined(RoomJoinedEvent),
    /// Broadcast when a player joins.
    PlayerJoined(PlayerJoinedEvent),
    /// Broadcast when a player leaves or disconnects.
    PlayerLeft(PlayerLeftEvent),
    /// Broadcast when host privileges move to another player.
    HostChanged(HostChangedEvent),
    /// Sent to a player whose `leave_room` was processed.
    LeftRoom(LeftRoomEvent),
    /// Broadcast when a question opens.
    NewQuestion(NewQuestionEvent),
    /// Broadcast when a player answers (the answer itself stays hidden).
    AnswerSubmitted(AnswerSubmittedEvent),
    /// Broadcast when a question is settled.
    QuestionResults(QuestionResultsEvent),
    /// Broadcast when the match ends.
    QuizFinished(QuizFinishedEvent),
    /// Broadcast chat line.
    ChatMessage(ChatEvent),
    /// Sent to the requesting client when an action is rejected.
    Error(ErrorEvent),
}

impl ServerMessage {
    /// Build an `error` frame.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorEvent {
            message: message.into(),
        })
    }
}

/// Data of `authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedEvent {
    /// Profile of the authenticated user.
    pub profile: ProfileSummary,
}

/// Data of `room_created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreatedEvent {
    /// Room code.
    pub room_id: String,
    /// Room state.
    pub room: RoomSnapshot,
}

/// Data of `room_joined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinedEvent {
    /// Room state.
    pub room: RoomSnapshot,
}

/// Data of `player_joined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedEvent {
    /// The player who joined.
    pub player: PlayerSummary,
    /// Present players in join order.
    pub players: Vec<PlayerSummary>,
    /// Number of present players.
    pub player_count: usize,
}

/// Data of `player_left`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftEvent {
    /// Player identifier.
    pub player_id: String,
    /// Player display name.
    pub player_name: String,
    /// Present players in join order.
    pub players: Vec<PlayerSummary>,
    /// Number of present players.
    pub player_count: usize,
}

/// Data of `host_changed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostChangedEvent {
    /// Identifier of the new host.
    pub new_host_id: String,
    /// Display name of the new host.
    pub new_host_name: String,
}

/// Data of `left_room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeftRoomEvent {
    /// Room code.
    pub room_id: String,
}

/// Data of `new_question`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestionEvent {
    /// Zero-based question index.
    pub question_index: usize,
    /// Prompt text.
    pub question: QuestionPrompt,
    /// Seconds.
    pub time_limit: u64,
}

/// Data of `answer_submitted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmittedEvent {
    /// Player identifier.
    pub player_id: String,
    /// Player display name.
    pub player_name: String,
    /// Players who answered so far.
    pub answered_count: usize,
    /// Players present.
    pub total_players: usize,
}

/// Data of `question_results`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResultsEvent {
    /// Zero-based question index.
    pub question_index: usize,
    /// Canonical zero-based index of the correct option, `None` if the stored
    /// answer matches no option.
    pub correct_answer: Option<usize>,
    /// Letter of the correct option (`"B"`).
    pub correct_letter: Option<String>,
    /// Explanation revealed with the results.
    pub explanation: Option<String>,
    /// Per-player outcomes in join order.
    pub results: Vec<PlayerQuestionResult>,
    /// Standings after this question.
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Data of `quiz_finished`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizFinishedEvent {
    /// Standings after this question.
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Questions in the match.
    pub total_questions: usize,
    /// Seconds between start and finish.
    pub duration: u64,
}

/// Data of a broadcast `chat_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    /// Player identifier.
    pub player_id: String,
    /// Player display name.
    pub player_name: String,
    /// Message text.
    pub message: String,
    /// RFC 3339 send time.
    pub timestamp: String,
}

/// Data of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    /// Message text.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_frames() {
        let create = ClientMessage::from_json_str(
            r#"{"event":"create_room","data":{"quizId":"q1","settings":{"maxPlayers":4}}}"#,
        )
        .unwrap();
        match create {
            ClientMessage::CreateRoom(request) => {
                assert_eq!(request.quiz_id, "q1");
                assert_eq!(request.settings.max_players, Some(4));
                assert_eq!(request.settings.time_per_question, None);
            }
            other => panic!("unexpected message {other:?}"),
        }

        let start = ClientMessage::from_json_str(r#"{"event":"start_quiz","data":{}}"#).unwrap();
        assert!(matches!(start, ClientMessage::StartQuiz {}));

        let submit = ClientMessage::from_json_str(
            r#"{"event":"submit_answer","data":{"answer":"B","timeSpent":5}}"#,
        )
        .unwrap();
        match submit {
            ClientMessage::SubmitAnswer(request) => {
                assert_eq!(request.answer, AnswerValue::Text("B".into()));
                assert_eq!(request.time_spent, Some(5.0));
            }
            other => panic!("unexpected message {other:?}"),
        }

        let by_index =
            ClientMessage::from_json_str(r#"{"event":"submit_answer","data":{"answer":0}}"#)
                .unwrap();
        match by_index {
            ClientMessage::SubmitAnswer(request) => {
                assert_eq!(request.answer, AnswerValue::Index(0));
                assert_eq!(request.time_spent, None);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn create_room_settings_default_when_omitted() {
        let message =
            ClientMessage::from_json_str(r#"{"event":"create_room","data":{"quizId":"q1"}}"#)
                .unwrap();
        let ClientMessage::CreateRoom(request) = message else {
            panic!("expected create_room");
        };
        assert!(request.validate().is_ok());
        assert_eq!(request.settings.max_players, None);
    }

    #[test]
    fn settings_out_of_bounds_fail_validation() {
        let request = CreateRoomRequest {
            quiz_id: "q1".into(),
            settings: RoomSettingsInput {
                max_players: Some(1),
                time_per_question: Some(2),
                question_count: None,
            },
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn frames_without_data_default_to_an_empty_payload() {
        let start = ClientMessage::from_json_str(r#"{"event":"start_quiz"}"#).unwrap();
        assert!(matches!(start, ClientMessage::StartQuiz {}));
        let leave =
            ClientMessage::from_json_str(r#"{"event":"leave_room","data":null}"#).unwrap();
        assert!(matches!(leave, ClientMessage::LeaveRoom {}));
        // payload fields stay mandatory where the event needs them
        assert!(ClientMessage::from_json_str(r#"{"event":"join_room"}"#).is_err());
        assert!(ClientMessage::from_json_str("[1, 2]").is_err());
    }

    #[test]
    fn rejects_unknown_events() {
        assert!(ClientMessage::from_json_str(r#"{"event":"kick","data":{}}"#).is_err());
    }

    #[test]
    fn server_frames_use_event_and_camel_case_data() {
        let frame = ServerMessage::AnswerSubmitted(AnswerSubmittedEvent {
            player_id: "u1".into(),
            player_name: "Ada".into(),
            answered_count: 1,
            total_players: 2,
        });
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["event"], "answer_submitted");
        assert_eq!(json["data"]["answeredCount"], 1);
        assert_eq!(json["data"]["playerName"], "Ada");

        let error = serde_json::to_value(ServerMessage::error("room is full")).unwrap();
        assert_eq!(error["event"], "error");
        assert_eq!(error["data"]["message"], "room is full");
    }
}
