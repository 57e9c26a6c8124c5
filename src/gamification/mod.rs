//! XP, levels, badges, and challenge progress.

mod badges;
mod challenges;
mod xp;

pub use badges::{BADGES, Badge, RankBadge, badges_for_level, rank_badge};
pub use challenges::{ChallengeProgress, ChallengeStatus, MAX_DURATION_DAYS, evaluate};
pub use xp::{
    LEVEL_SIZE, LevelInfo, XP_ACTIVITY_LOGGED, XP_CHALLENGE_COMPLETED, XP_SCENARIO_CREATED,
    level_for, level_info,
};
