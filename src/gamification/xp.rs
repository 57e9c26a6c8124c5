use serde::Serialize;

/// XP needed per level.
pub const LEVEL_SIZE: i64 = 500;

pub const XP_SCENARIO_CREATED: i64 = 25;
pub const XP_ACTIVITY_LOGGED: i64 = 10;
pub const XP_CHALLENGE_COMPLETED: i64 = 100;

/// Level and progress derived from an XP total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub xp_total: i64,
    pub level: i64,
    pub level_size: i64,
    pub xp_in_level: i64,
    pub xp_progress_pct: i64,
}

#[must_use]
pub fn level_for(xp_total: i64) -> i64 {
    xp_total.max(0) / LEVEL_SIZE + 1
}

#[must_use]
pub fn level_info(xp_total: i64) -> LevelInfo {
    let xp_total = xp_total.max(0);
    let xp_in_level = xp_total % LEVEL_SIZE;
    LevelInfo {
        xp_total,
        level: level_for(xp_total),
        level_size: LEVEL_SIZE,
        xp_in_level,
        xp_progress_pct: xp_in_level * 100 / LEVEL_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(499), 1);
        assert_eq!(level_for(500), 2);
        assert_eq!(level_for(2750), 6);
    }

    #[test]
    fn test_progress() {
        let info = level_info(1125);
        assert_eq!(info.level, 3);
        assert_eq!(info.xp_in_level, 125);
        assert_eq!(info.xp_progress_pct, 25);
    }
}
