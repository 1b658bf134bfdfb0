//! Room projections shared by the websocket protocol and the REST surface.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{dao::models::AnswerValue, dto::phase::VisibleRoomStatus};

/// Public part of an authenticated user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current level.
    pub level: u32,
    /// Experience points.
    pub xp: u64,
}

/// Player as displayed in lobbies and scoreboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Level snapshot taken at join time, display only.
    pub level: u32,
    /// Experience points.
    pub xp: u64,
    /// Whether this player hosts the room.
    pub is_host: bool,
    /// Score in this room.
    pub score: u32,
    /// RFC 3339 join time.
    pub joined_at: String,
}

/// Settings a room was created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettingsSummary {
    /// Player cap.
    pub max_players: usize,
    /// Seconds.
    pub time_per_question: u64,
    /// Questions played.
    pub question_count: usize,
}

/// Quiz attached to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    /// Identifier.
    pub id: String,
    /// Quiz title.
    pub title: String,
    /// Questions in the match.
    pub total_questions: usize,
}

/// Full room state sent on create/join and by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Identifier.
    pub id: String,
    /// Current host.
    pub host_id: String,
    /// Public lifecycle status.
    pub status: VisibleRoomStatus,
    /// Room settings.
    pub settings: RoomSettingsSummary,
    /// Quiz being played.
    pub quiz: QuizSummary,
    /// Present players in join order.
    pub players: Vec<PlayerSummary>,
    /// Number of present players.
    pub player_count: usize,
    /// Zero-based index of the current question.
    pub current_question_index: usize,
    /// RFC 3339 creation time.
    pub created_at: String,
}

/// Entry of the public waiting room listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// Identifier.
    pub id: String,
    /// Display name of the host.
    pub host_name: String,
    /// Title of the quiz.
    pub quiz_title: String,
    /// Questions in the match.
    pub total_questions: usize,
    /// Number of present players.
    pub player_count: usize,
    /// Player cap.
    pub max_players: usize,
    /// RFC 3339 creation time.
    pub created_at: String,
}

/// Question as broadcast to players, without its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPrompt {
    /// Prompt text.
    pub question: String,
    /// Options in display order.
    pub options: Vec<String>,
    /// 1-based.
    pub question_number: usize,
    /// Questions in the match.
    pub total_questions: usize,
}

/// One player's outcome for a settled question.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerQuestionResult {
    /// Player identifier.
    pub player_id: String,
    /// Player display name.
    pub player_name: String,
    /// Submitted answer, `None` when the player did not answer.
    pub answer: Option<AnswerValue>,
    /// Seconds counted for the answer.
    pub time_spent: Option<f64>,
    /// Whether the answer was right.
    pub is_correct: bool,
    /// Points earned on this question.
    pub points: u32,
    /// Score after this question.
    pub total_score: u32,
}

/// Standing of a player, ordered by score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based.
    pub rank: usize,
    /// Player identifier.
    pub player_id: String,
    /// Player display name.
    pub player_name: String,
    /// Total score.
    pub score: u32,
    /// Correct answers so far.
    pub correct_answers: u32,
}
