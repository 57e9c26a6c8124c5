use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct BadgeDef {
    pub key: &'static str,
    pub name: &'static str,
    pub level_required: i64,
    pub icon: &'static str,
}

pub const BADGES: &[BadgeDef] = &[
    BadgeDef {
        key: "sprout",
        name: "Starter Seed",
        level_required: 1,
        icon: "🌱",
    },
    BadgeDef {
        key: "leaf_learner",
        name: "Leaf Learner",
        level_required: 3,
        icon: "🍃",
    },
    BadgeDef {
        key: "green_rookie",
        name: "Green Rookie",
        level_required: 5,
        icon: "🟢",
    },
    BadgeDef {
        key: "eco_explorer",
        name: "Eco Explorer",
        level_required: 10,
        icon: "🧭",
    },
    BadgeDef {
        key: "carbon_cutter",
        name: "Carbon Cutter",
        level_required: 15,
        icon: "✂️",
    },
    BadgeDef {
        key: "planet_protector",
        name: "Planet Protector",
        level_required: 20,
        icon: "🛡️",
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct Badge {
    pub key: &'static str,
    pub name: &'static str,
    pub level_required: i64,
    pub icon: &'static str,
    pub earned: bool,
}

/// The badge catalog with `earned` set for a user at `level`.
#[must_use]
pub fn badges_for_level(level: i64) -> Vec<Badge> {
    BADGES
        .iter()
        .map(|b| Badge {
            key: b.key,
            name: b.name,
            level_required: b.level_required,
            icon: b.icon,
            earned: level >= b.level_required,
        })
        .collect()
}

/// Decoration shown next to a leaderboard rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankBadge {
    pub icon: &'static str,
    pub color: &'static str,
    pub title: &'static str,
}

const PARTICIPANT: RankBadge = RankBadge {
    icon: "fas fa-user",
    color: "#6c757d",
    title: "Participant",
};

#[must_use]
pub fn rank_badge(kind: crate::types::LeaderboardKind, rank: usize) -> RankBadge {
    use crate::types::LeaderboardKind::*;

    let badge = |icon, color, title| RankBadge { icon, color, title };
    match (kind, rank) {
        (Scenarios, 1) => badge("fas fa-crown", "#FFD700", "Scenario Master"),
        (Scenarios, 2) => badge("fas fa-medal", "#C0C0C0", "Scenario Expert"),
        (Scenarios, 3) => badge("fas fa-award", "#CD7F32", "Scenario Pro"),
        (Reduction, 1) => badge("fas fa-leaf", "#28a745", "Eco Champion"),
        (Reduction, 2) => badge("fas fa-seedling", "#20c997", "Green Warrior"),
        (Reduction, 3) => badge("fas fa-tree", "#6f42c1", "Carbon Saver"),
        (Activities, 1) => badge("fas fa-fire", "#dc3545", "Activity King"),
        (Activities, 2) => badge("fas fa-bolt", "#fd7e14", "Data Tracker"),
        (Activities, 3) => badge("fas fa-star", "#ffc107", "Active User"),
        _ => PARTICIPANT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LeaderboardKind;

    #[test]
    fn test_badges_earned_by_level() {
        let badges = badges_for_level(5);
        let earned: Vec<_> = badges.iter().filter(|b| b.earned).map(|b| b.key).collect();
        assert_eq!(earned, vec!["sprout", "leaf_learner", "green_rookie"]);
        assert_eq!(badges.len(), 6);
    }

    #[test]
    fn test_rank_badges() {
        assert_eq!(rank_badge(LeaderboardKind::Scenarios, 1).title, "Scenario Master");
        assert_eq!(rank_badge(LeaderboardKind::Reduction, 3).color, "#6f42c1");
        assert_eq!(rank_badge(LeaderboardKind::Activities, 4).title, "Participant");
    }
}
