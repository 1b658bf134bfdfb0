use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::RoomPhase;

/// Room status exposed to clients (websocket and REST).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleRoomStatus {
    /// Lobby, players may still join.
    Waiting,
    /// Match running.
    InProgress,
    /// Final standings available.
    Finished,
}

impl From<&RoomPhase> for VisibleRoomStatus {
    fn from(value: &RoomPhase) -> Self {
        match value {
            RoomPhase::Waiting => VisibleRoomStatus::Waiting,
            RoomPhase::InProgress(_) => VisibleRoomStatus::InProgress,
            RoomPhase::Finished => VisibleRoomStatus::Finished,
        }
    }
}
