use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, ChallengeType, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub country: String,
    pub household_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub baseline_calculated: bool,
    pub baseline_co2e: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub total_co2e: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub scenario_id: i64,
    pub category: Category,
    pub activity_type: String,
    pub value: f64,
    pub unit: String,
    pub co2e_amount: f64,
    pub api_source: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioWithActivities {
    #[serde(flatten)]
    pub scenario: Scenario,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionFactor {
    pub id: i64,
    pub category: Category,
    pub activity_type: String,
    pub region: String,
    pub co2e_per_unit: f64,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpRecord {
    pub user_id: i64,
    pub xp_total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tip {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub tip_type: String,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipWithAuthor {
    #[serde(flatten)]
    pub tip: Tip,
    pub username: String,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub challenge_type: ChallengeType,
    pub target_value: f64,
    pub target_unit: String,
    pub duration_days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserChallenge {
    pub user_id: i64,
    pub challenge_id: i64,
    pub joined_at: DateTime<Utc>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-user aggregate used by the leaderboard and the milestone feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAggregate {
    pub user_id: i64,
    pub username: String,
    pub profile_picture: Option<String>,
    pub scenario_count: i64,
    pub activity_count: i64,
    pub total_emissions: f64,
    pub avg_emissions: f64,
    pub last_update: Option<DateTime<Utc>>,
}

/// One logged activity reduced to what time-series statistics need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPoint {
    pub user_id: i64,
    pub scenario_id: i64,
    pub category: Category,
    pub activity_type: String,
    pub co2e_amount: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileWithUsername {
    #[serde(flatten)]
    pub profile: Profile,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioWithOwner {
    #[serde(flatten)]
    pub scenario: Scenario,
    pub username: String,
}

// Store inputs

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub user_id: i64,
    pub country: String,
    pub household_size: i64,
    pub baseline_calculated: bool,
    pub baseline_co2e: f64,
}

impl NewProfile {
    #[must_use]
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id,
            country: "US".to_string(),
            household_size: 1,
            baseline_calculated: false,
            baseline_co2e: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub country: Option<String>,
    pub household_size: Option<i64>,
    pub baseline_calculated: Option<bool>,
    pub baseline_co2e: Option<f64>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.country.is_none()
            && self.household_size.is_none()
            && self.baseline_calculated.is_none()
            && self.baseline_co2e.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub scenario_id: i64,
    pub category: Category,
    pub activity_type: String,
    pub value: f64,
    pub unit: String,
    pub co2e_amount: f64,
    pub api_source: String,
}

#[derive(Debug, Clone)]
pub struct NewEmissionFactor {
    pub category: Category,
    pub activity_type: String,
    pub region: String,
    pub co2e_per_unit: f64,
    pub unit: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EmissionFactorUpdate {
    pub category: Option<Category>,
    pub activity_type: Option<String>,
    pub region: Option<String>,
    pub co2e_per_unit: Option<f64>,
    pub unit: Option<String>,
    pub source: Option<String>,
}

impl EmissionFactorUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.activity_type.is_none()
            && self.region.is_none()
            && self.co2e_per_unit.is_none()
            && self.unit.is_none()
            && self.source.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub name: String,
    pub description: Option<String>,
    pub challenge_type: ChallengeType,
    pub target_value: f64,
    pub target_unit: String,
    pub duration_days: i64,
    pub badge_name: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ChallengeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub challenge_type: Option<ChallengeType>,
    pub target_value: Option<f64>,
    pub target_unit: Option<String>,
    pub duration_days: Option<i64>,
    pub badge_name: Option<String>,
    pub is_active: Option<bool>,
}

impl ChallengeUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.challenge_type.is_none()
            && self.target_value.is_none()
            && self.target_unit.is_none()
            && self.duration_days.is_none()
            && self.badge_name.is_none()
            && self.is_active.is_none()
    }
}
