use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::dto::{room::RoomSummary, validation::validate_room_code};

/// Response payload listing the rooms that can still be joined.
#[derive(Debug, Serialize, ToSchema)]
pub struct WaitingRoomsResponse {
    /// Joinable rooms, oldest first.
    pub rooms: Vec<RoomSummary>,
}

/// Path parameters identifying a room.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Path)]
pub struct RoomCodePath {
    /// Six character room code.
    #[validate(custom(function = "validate_room_code"))]
    pub code: String,
}

/// Path parameters identifying a user.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Path, rename_all = "camelCase")]
pub struct UserIdPath {
    /// Stored user identifier.
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
}

/// Multiplayer counters of one user.
#[derive(Debug, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultiplayerStatsResponse {
    pub user_id: String,
    pub games_played: u32,
    pub wins: u32,
    /// Percentage of games won, one decimal.
    pub win_rate: f64,
}
