mod kinds;
mod models;

pub use kinds::{Category, ChallengeType, LeaderboardKind, Role};
pub use models::*;
