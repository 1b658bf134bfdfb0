use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Answer value as stored with a quiz or sent by a client.
///
/// Quizzes authored through different clients store the correct answer either
/// as a zero-based option index or as an option letter, and players submit
/// both forms too. Both are kept verbatim here and reconciled by
/// [`crate::state::scoring::normalize_answer`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Zero-based option index (`0` is the first option).
    Index(u32),
    /// Option letter (`"B"`), numeric string (`"1"`) or exact option text.
    Text(String),
}

/// Quiz definition as read from persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizEntity {
    /// Stable identifier of the quiz.
    pub id: String,
    /// Human readable quiz title.
    pub title: String,
    /// Ordered questions of the quiz.
    pub questions: Vec<QuestionEntity>,
}

/// Single multiple-choice question of a quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntity {
    /// Question prompt.
    pub question: String,
    /// Answer options, in display order.
    pub options: Vec<String>,
    /// Correct answer in whichever representation the quiz author used.
    pub correct_answer: AnswerValue,
    /// Optional explanation revealed with the results.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Persistent user profile fields the multiplayer subsystem reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileEntity {
    /// Stable identifier of the user.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current level, derived from `xp`.
    #[serde(default = "default_level")]
    pub level: u32,
    /// Accumulated experience points.
    #[serde(default)]
    pub xp: u64,
    /// Badge identifiers already earned.
    #[serde(default)]
    pub badges: Vec<String>,
    /// Multiplayer counters.
    #[serde(default)]
    pub multiplayer_stats: MultiplayerStatsEntity,
}

/// Multiplayer win/loss counters stored on the profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MultiplayerStatsEntity {
    /// Number of finished matches the user took part in.
    #[serde(default)]
    pub games_played: u32,
    /// Number of matches won.
    #[serde(default)]
    pub wins: u32,
}

/// Profile fields rewritten after a match, applied as a single update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileProgressEntity {
    /// New experience total.
    pub xp: u64,
    /// New level.
    pub level: u32,
    /// Complete badge list.
    pub badges: Vec<String>,
    /// Updated multiplayer counters.
    pub multiplayer_stats: MultiplayerStatsEntity,
}

fn default_level() -> u32 {
    1
}

impl From<&UserProfileEntity> for ProfileProgressEntity {
    fn from(value: &UserProfileEntity) -> Self {
        Self {
            xp: value.xp,
            level: value.level,
            badges: value.badges.clone(),
            multiplayer_stats: value.multiplayer_stats.clone(),
        }
    }
}
