use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::{
    dao::{arena_store::ArenaStore, storage::StorageError},
    state::{
        AppState,
        progression::{MatchReward, apply_match_result},
        room::Standing,
    },
};

/// Outcome of persisting the rewards of one match.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    /// Players whose profile was updated.
    pub rewarded: Vec<String>,
    /// Players whose update failed.
    pub failed: Vec<String>,
    /// Set when no store was installed and nothing was written.
    pub skipped: bool,
}

/// Persist the rewards of a finished match, if a store is installed.
pub async fn settle_match(state: &AppState, room: &str, standings: &[Standing]) -> SettlementReport {
    let Some(store) = state.arena_store().await else {
        warn!(room, players = standings.len(), "storage unavailable; match rewards skipped");
        return SettlementReport {
            skipped: true,
            ..SettlementReport::default()
        };
    };
    persist_rewards(store, room, standings).await
}

/// Write every participant's rewards concurrently. A failed write only affects
/// that participant.
pub async fn persist_rewards(
    store: Arc<dyn ArenaStore>,
    room: &str,
    standings: &[Standing],
) -> SettlementReport {
    let writes = standings.iter().map(|standing| {
        let store = store.clone();
        async move {
            let result = reward_player(store.as_ref(), standing).await;
            (standing, result)
        }
    });

    let mut report = SettlementReport::default();
    for (standing, result) in join_all(writes).await {
        match result {
            Ok(reward) => {
                info!(
                    room,
                    player = %standing.player_id,
                    rank = standing.rank,
                    xp_gained = reward.xp_gained,
                    new_level = ?reward.new_level,
                    badge_granted = reward.badge_granted,
                    "match rewards saved"
                );
                report.rewarded.push(standing.player_id.clone());
            }
            Err(err) => {
                warn!(
                    room,
                    player = %standing.player_id,
                    error = %err,
                    "failed to save match rewards"
                );
                report.failed.push(standing.player_id.clone());
            }
        }
    }
    report
}

async fn reward_player(
    store: &dyn ArenaStore,
    standing: &Standing,
) -> Result<MatchReward, StorageError> {
    let profile = store
        .find_profile(standing.player_id.clone())
        .await?
        .ok_or_else(|| StorageError::Missing(format!("user `{}`", standing.player_id)))?;
    let reward = apply_match_result(&profile, standing.rank);
    store
        .save_progress(standing.player_id.clone(), reward.progress.clone())
        .await?;
    Ok(reward)
}
