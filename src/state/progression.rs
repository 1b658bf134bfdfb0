//! End-of-match rewards applied to persistent profiles.

use crate::dao::models::{ProfileProgressEntity, UserProfileEntity};

/// Badge granted on a player's first multiplayer win.
pub const CHAMPION_BADGE: &str = "multiplayer_champion";

const WINNER_XP: u64 = 100;
const XP_STEP_PER_RANK: u64 = 25;
const MIN_MATCH_XP: u64 = 25;
const XP_PER_LEVEL_UNIT: u64 = 100;

/// XP for finishing at `rank` (1-based): 100, 75, 50, then 25 for everyone else.
pub fn rank_xp(rank: usize) -> u64 {
    let penalty = XP_STEP_PER_RANK.saturating_mul(rank.saturating_sub(1) as u64);
    WINNER_XP.saturating_sub(penalty).max(MIN_MATCH_XP)
}

/// Level reached with `xp` experience points: `floor(sqrt(xp / 100)) + 1`.
pub fn level_for_xp(xp: u64) -> u32 {
    let units = xp / XP_PER_LEVEL_UNIT;
    let mut root = (units as f64).sqrt() as u64;
    // Float rounding can be off by one for large values.
    while root * root > units {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= units {
        root += 1;
    }
    u32::try_from(root + 1).unwrap_or(u32::MAX)
}

/// What a match changed on one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReward {
    /// Fields to persist.
    pub progress: ProfileProgressEntity,
    /// XP gained in this match.
    pub xp_gained: u64,
    /// New level when the player levelled up.
    pub new_level: Option<u32>,
    /// Whether the champion badge was granted by this match.
    pub badge_granted: bool,
}

/// Compute the progression of `profile` after finishing a match at `rank`.
pub fn apply_match_result(profile: &UserProfileEntity, rank: usize) -> MatchReward {
    let mut progress = ProfileProgressEntity::from(profile);
    let won = rank == 1;
    let xp_gained = rank_xp(rank);

    progress.xp = progress.xp.saturating_add(xp_gained);
    progress.multiplayer_stats.games_played += 1;
    if won {
        progress.multiplayer_stats.wins += 1;
    }

    let level = level_for_xp(progress.xp);
    let new_level = (level > profile.level).then_some(level);
    progress.level = level.max(profile.level);

    let badge_granted = won && !progress.badges.iter().any(|badge| badge == CHAMPION_BADGE);
    if badge_granted {
        progress.badges.push(CHAMPION_BADGE.to_owned());
    }

    MatchReward {
        progress,
        xp_gained,
        new_level,
        badge_granted,
    }
}
