//! Read-only projections served over REST.

use crate::{
    dto::{
        public::{MultiplayerStatsResponse, WaitingRoomsResponse},
        room::RoomSnapshot,
    },
    error::ServiceError,
    state::SharedState,
};

/// Rooms still accepting players, oldest first.
pub async fn list_waiting_rooms(state: &SharedState) -> WaitingRoomsResponse {
    WaitingRoomsResponse {
        rooms: state.rooms().list_waiting().await,
    }
}

/// Current state of one room.
pub async fn room_status(state: &SharedState, code: &str) -> Result<RoomSnapshot, ServiceError> {
    let handle = state
        .rooms()
        .get(code)
        .ok_or_else(|| ServiceError::NotFound(format!("room {code}")))?;
    let slot = handle.lock().await;
    if slot.dissolved {
        return Err(ServiceError::NotFound(format!("room {code}")));
    }
    Ok(slot.room.snapshot())
}

/// Multiplayer counters of a stored profile.
pub async fn multiplayer_stats(
    state: &SharedState,
    user_id: &str,
) -> Result<MultiplayerStatsResponse, ServiceError> {
    let store = state.arena_store().await.ok_or(ServiceError::Degraded)?;
    let profile = store
        .find_profile(user_id.to_owned())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user {user_id}")))?;
    let stats = profile.multiplayer_stats;
    Ok(MultiplayerStatsResponse {
        user_id: profile.id,
        games_played: stats.games_played,
        wins: stats.wins,
        win_rate: win_rate(stats.games_played, stats.wins),
    })
}

/// Percentage of games won, rounded to one decimal.
pub fn win_rate(games_played: u32, wins: u32) -> f64 {
    if games_played == 0 {
        return 0.0;
    }
    (f64::from(wins) / f64::from(games_played) * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_rate_has_one_decimal() {
        assert_eq!(win_rate(0, 0), 0.0);
        assert_eq!(win_rate(3, 1), 33.3);
        assert_eq!(win_rate(3, 2), 66.7);
        assert_eq!(win_rate(4, 4), 100.0);
    }
}
