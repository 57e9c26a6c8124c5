use std::fmt;

use serde::{Deserialize, Serialize};

/// Account role. Admins may use the `/api/admin` routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity category. Every activity and emission factor belongs to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Transport,
    Diet,
    Energy,
    Waste,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Transport,
        Category::Diet,
        Category::Energy,
        Category::Waste,
    ];

    pub fn parse(s: &str) -> Option<Category> {
        match s {
            "transport" => Some(Self::Transport),
            "diet" => Some(Self::Diet),
            "energy" => Some(Self::Energy),
            "waste" => Some(Self::Waste),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Diet => "diet",
            Self::Energy => "energy",
            Self::Waste => "waste",
        }
    }

    /// Comma separated list of all category names, for error messages.
    #[must_use]
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a challenge target is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    /// Every day in the window stays at or under the target (kg CO2e).
    #[default]
    DailyLimit,
    /// The whole window stays at or under the target (kg CO2e).
    TotalLimit,
    /// At least `target` activities are logged in the window.
    ActivityCount,
}

impl ChallengeType {
    pub fn parse(s: &str) -> Option<ChallengeType> {
        match s {
            "daily_limit" => Some(Self::DailyLimit),
            "total_limit" => Some(Self::TotalLimit),
            "activity_count" => Some(Self::ActivityCount),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DailyLimit => "daily_limit",
            Self::TotalLimit => "total_limit",
            Self::ActivityCount => "activity_count",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranking used by the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardKind {
    /// Most active scenarios.
    #[default]
    Scenarios,
    /// Lowest average scenario footprint.
    Reduction,
    /// Most logged activities.
    Activities,
}

impl LeaderboardKind {
    pub fn parse(s: &str) -> Option<LeaderboardKind> {
        match s {
            "scenarios" => Some(Self::Scenarios),
            "reduction" => Some(Self::Reduction),
            "activities" => Some(Self::Activities),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scenarios => "scenarios",
            Self::Reduction => "reduction",
            Self::Activities => "activities",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_roundtrip() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("Transport"), None);
        assert_eq!(Category::parse("shopping"), None);
    }

    #[test]
    fn test_category_names() {
        assert_eq!(Category::names(), "transport, diet, energy, waste");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn test_challenge_type_serde() {
        let json = serde_json::to_string(&ChallengeType::ActivityCount).unwrap();
        assert_eq!(json, "\"activity_count\"");
        assert_eq!(ChallengeType::parse("total_limit"), Some(ChallengeType::TotalLimit));
    }
}
