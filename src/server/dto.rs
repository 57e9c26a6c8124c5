use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gamification::{Badge, ChallengeProgress, LevelInfo, RankBadge};
use crate::types::{
    Activity, Challenge, LeaderboardKind, Profile, Role, Scenario, TipWithAuthor, User,
};

// Query parameters

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FactorSearchParams {
    pub query: Option<String>,
    pub category: Option<String>,
}

// Account

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(alias = "lastName")]
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub country: Option<String>,
    pub household_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserSummary,
    pub profile: Option<Profile>,
}

#[derive(Debug, Serialize)]
pub struct BadgesResponse {
    pub level: i64,
    pub xp_total: i64,
    pub badges: Vec<Badge>,
}

// Scenarios and activities

#[derive(Debug, Default, Deserialize)]
pub struct CreateScenarioRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Activity payload. `value` accepts a number or a numeric string.
#[derive(Debug, Default, Deserialize)]
pub struct ActivityRequest {
    pub category: Option<String>,
    pub activity_type: Option<String>,
    pub value: Option<Value>,
    pub unit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateActivityRequest {
    pub value: Option<Value>,
    pub unit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    #[serde(flatten)]
    pub activity: Activity,
    pub scenario_total: f64,
}

#[derive(Debug, Serialize)]
pub struct ScenarioTotalResponse {
    pub scenario_total: f64,
}

#[derive(Debug, Serialize)]
pub struct CatalogItem {
    pub activity_type: &'static str,
    pub unit: &'static str,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub category: String,
    pub activity_type: String,
    pub value: f64,
    pub unit: String,
    pub co2e_amount: f64,
    pub source: String,
}

// Leaderboard

/// A count or an amount, serialized as a bare JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metric {
    Count(i64),
    Amount(f64),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub username: String,
    pub profile_picture: Option<String>,
    pub metric: Metric,
    pub metric_label: &'static str,
    pub secondary_metric: Metric,
    pub secondary_label: &'static str,
    pub badge: RankBadge,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    #[serde(rename = "type")]
    pub kind: LeaderboardKind,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub updated: DateTime<Utc>,
}

// Stats and report

#[derive(Debug, Serialize)]
pub struct StatsSummary {
    pub scenarios: i64,
    pub activities: i64,
    pub badges: i64,
    #[serde(flatten)]
    pub level: LevelInfo,
}

#[derive(Debug, Serialize)]
pub struct WeeklyChart {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct CategoryChange {
    pub category: String,
    pub current: f64,
    pub previous: f64,
    pub change_pct: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct WeeklyComparison {
    pub current_start: DateTime<Utc>,
    pub previous_start: DateTime<Utc>,
    pub current_total: f64,
    pub previous_total: f64,
    /// None when the previous week is empty.
    pub change_pct: Option<f64>,
    pub categories: Vec<CategoryChange>,
}

#[derive(Debug, Serialize)]
pub struct ActivityTypeTotal {
    pub category: String,
    pub activity_type: String,
    pub count: i64,
    pub co2e: f64,
}

#[derive(Debug, Serialize)]
pub struct ReportTotals {
    pub scenarios: i64,
    pub activities: i64,
    pub co2e: f64,
    pub avg_per_scenario: f64,
    pub last_7_days: f64,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub user: UserSummary,
    pub profile: Option<Profile>,
    pub level: LevelInfo,
    pub totals: ReportTotals,
    pub by_category: BTreeMap<String, f64>,
    pub top_activities: Vec<ActivityTypeTotal>,
    pub scenarios: Vec<Scenario>,
    pub generated_at: DateTime<Utc>,
}

// Challenges

#[derive(Debug, Serialize)]
pub struct MyChallenge {
    #[serde(flatten)]
    pub challenge: Challenge,
    pub joined_at: DateTime<Utc>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: ChallengeProgress,
}

// Social

#[derive(Debug, Default, Deserialize)]
pub struct MilestoneLikeRequest {
    pub milestone_user_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTipRequest {
    pub content: Option<String>,
    pub tip_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TipLikeRequest {
    pub tip_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct Milestone {
    pub id: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MilestoneUser {
    pub id: i64,
    pub username: String,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MilestoneStats {
    pub scenarios: i64,
    pub activities: i64,
    pub avg_emissions: f64,
}

#[derive(Debug, Serialize)]
pub struct MilestoneEntry {
    pub user: MilestoneUser,
    pub stats: MilestoneStats,
    pub milestones: Vec<Milestone>,
    pub last_update: Option<DateTime<Utc>>,
    pub like_count: i64,
    pub liked: bool,
}

#[derive(Debug, Serialize)]
pub struct MilestoneFeed {
    pub feed: Vec<MilestoneEntry>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MilestoneLikes {
    pub liked: Vec<i64>,
    pub counts: BTreeMap<i64, i64>,
}

#[derive(Debug, Serialize)]
pub struct TipEntry {
    #[serde(flatten)]
    pub tip: TipWithAuthor,
    pub liked: bool,
}

#[derive(Debug, Serialize)]
pub struct TipsResponse {
    pub tips: Vec<TipEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MotivationRequest {
    /// Non-numeric values are ignored and the weekly total is computed.
    #[serde(alias = "userCarbonData")]
    pub user_carbon_data: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub mode: Option<String>,
}

// Admin

#[derive(Debug, Default, Deserialize)]
pub struct AdminCreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminProfileRequest {
    pub user_id: Option<i64>,
    pub country: Option<String>,
    pub household_size: Option<i64>,
    pub baseline_calculated: Option<bool>,
    pub baseline_co2e: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChallengeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub challenge_type: Option<String>,
    pub target_value: Option<f64>,
    pub target_unit: Option<String>,
    pub duration_days: Option<i64>,
    pub badge_name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FactorRequest {
    pub category: Option<String>,
    pub activity_type: Option<String>,
    pub region: Option<String>,
    pub co2e_per_unit: Option<f64>,
    pub unit: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FactorSearchResult {
    pub id: String,
    pub name: String,
    pub category: String,
    pub source: String,
    pub region: String,
    pub co2e_per_unit: f64,
    pub unit: String,
    pub description: String,
    pub source_type: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateChallengeRequest {
    pub activity_id: Option<String>,
    pub activity_name: Option<String>,
    /// Number or numeric string.
    pub co2e_per_unit: Option<Value>,
    pub unit: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChallengeSuggestion {
    pub name: String,
    pub description: String,
    pub challenge_type: &'static str,
    pub target_value: f64,
    pub target_unit: &'static str,
    pub duration_days: i64,
    pub badge_name: String,
    pub reasoning: String,
}

#[derive(Debug, Serialize)]
pub struct ActivityInfo {
    pub activity_id: Option<String>,
    pub activity_name: String,
    pub co2e_per_unit: f64,
    pub unit: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GeneratedChallenges {
    pub suggestions: BTreeMap<&'static str, ChallengeSuggestion>,
    pub activity_info: ActivityInfo,
}

#[derive(Debug, Serialize)]
pub struct DailyRange {
    pub avg_daily: f64,
    pub min_daily: f64,
    pub max_daily: f64,
}

#[derive(Debug, Serialize)]
pub struct CategoryAverage {
    pub avg_emission: f64,
    pub activity_count: i64,
}

#[derive(Debug, Serialize)]
pub struct EmissionEstimates {
    pub overall: DailyRange,
    pub by_category: BTreeMap<String, CategoryAverage>,
    pub suggestions: BTreeMap<&'static str, f64>,
}
