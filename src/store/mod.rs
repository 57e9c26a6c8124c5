mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Every activity mutation recomputes the owning scenario's `total_co2e`
/// inside the same transaction and returns the new total.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &NewUser) -> Result<User>;
    fn get_user(&self, id: i64) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn list_users(&self, limit: i64) -> Result<Vec<User>>;
    fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User>;
    fn has_admin_user(&self) -> Result<bool>;

    // Profile operations
    fn create_profile(&self, profile: &NewProfile) -> Result<Profile>;
    fn get_profile(&self, id: i64) -> Result<Option<Profile>>;
    fn get_profile_by_user(&self, user_id: i64) -> Result<Option<Profile>>;
    fn list_profiles(&self, limit: i64) -> Result<Vec<ProfileWithUsername>>;
    fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<Profile>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>>;
    fn delete_session(&self, id: &str) -> Result<bool>;
    fn delete_expired_sessions(&self) -> Result<usize>;
    fn update_session_last_used(&self, id: &str) -> Result<()>;

    // Scenario operations
    fn create_scenario(&self, user_id: i64, name: &str, description: &str) -> Result<Scenario>;
    fn get_scenario(&self, id: i64) -> Result<Option<Scenario>>;
    fn list_scenarios(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Scenario>>;
    fn count_active_scenarios(&self, user_id: i64) -> Result<i64>;
    fn deactivate_scenario(&self, id: i64) -> Result<bool>;
    fn list_active_scenarios_with_owner(&self, limit: i64) -> Result<Vec<ScenarioWithOwner>>;

    // Activity operations
    fn get_activity(&self, id: i64) -> Result<Option<Activity>>;
    fn list_activities(&self, scenario_id: i64) -> Result<Vec<Activity>>;
    fn insert_activity(&self, activity: &NewActivity) -> Result<(Activity, f64)>;
    fn update_activity(
        &self,
        id: i64,
        value: f64,
        unit: &str,
        co2e_amount: f64,
        api_source: &str,
    ) -> Result<(Activity, f64)>;
    fn delete_activity(&self, id: i64) -> Result<f64>;
    fn count_user_activities(&self, user_id: i64) -> Result<i64>;
    /// Activities in active scenarios, oldest first. `user_id = None` covers everyone.
    fn list_activity_points(
        &self,
        user_id: Option<i64>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ActivityPoint>>;
    /// Mean per-user total since `since`, over users with an active scenario.
    fn community_average_since(&self, since: DateTime<Utc>) -> Result<f64>;

    // Emission factor operations
    /// Rows for `(category, activity_type)` in `region` or `global`, exact region first.
    fn find_emission_factors(
        &self,
        category: Category,
        activity_type: &str,
        region: &str,
    ) -> Result<Vec<EmissionFactor>>;
    fn has_emission_factor(&self, category: Category, activity_type: &str) -> Result<bool>;
    fn get_emission_factor(&self, id: i64) -> Result<Option<EmissionFactor>>;
    fn list_emission_factors(&self, limit: i64) -> Result<Vec<EmissionFactor>>;
    fn search_emission_factors(
        &self,
        query: &str,
        category: Option<Category>,
        limit: i64,
    ) -> Result<Vec<EmissionFactor>>;
    fn create_emission_factor(&self, factor: &NewEmissionFactor) -> Result<EmissionFactor>;
    fn update_emission_factor(&self, id: i64, update: &EmissionFactorUpdate)
    -> Result<EmissionFactor>;

    // XP operations
    fn add_xp(&self, user_id: i64, amount: i64) -> Result<XpRecord>;
    fn get_xp(&self, user_id: i64) -> Result<XpRecord>;

    // Aggregates
    fn leaderboard(&self, kind: LeaderboardKind, limit: i64) -> Result<Vec<UserAggregate>>;
    /// Active users ordered by most recent activity.
    fn milestone_aggregates(&self, limit: i64) -> Result<Vec<UserAggregate>>;

    // Milestone likes
    /// Flips the like and returns `(liked, like_count)` afterwards.
    fn toggle_milestone_like(&self, user_id: i64, milestone_user_id: i64) -> Result<(bool, i64)>;
    fn list_liked_milestones(&self, user_id: i64) -> Result<Vec<i64>>;
    fn milestone_like_counts(&self) -> Result<Vec<(i64, i64)>>;

    // Tip operations
    fn create_tip(&self, user_id: i64, content: &str, tip_type: &str) -> Result<Tip>;
    fn get_tip(&self, id: i64) -> Result<Option<Tip>>;
    fn list_tips(&self, limit: i64) -> Result<Vec<TipWithAuthor>>;
    fn list_liked_tips(&self, user_id: i64) -> Result<Vec<i64>>;
    /// Flips the like and returns `(liked, likes_count)` afterwards.
    fn toggle_tip_like(&self, user_id: i64, tip_id: i64) -> Result<(bool, i64)>;

    // Challenge operations
    fn create_challenge(&self, challenge: &NewChallenge) -> Result<Challenge>;
    fn get_challenge(&self, id: i64) -> Result<Option<Challenge>>;
    fn list_challenges(&self, active_only: bool) -> Result<Vec<Challenge>>;
    fn update_challenge(&self, id: i64, update: &ChallengeUpdate) -> Result<Challenge>;
    fn delete_challenge(&self, id: i64) -> Result<bool>;
    fn count_challenge_participants(&self, challenge_id: i64) -> Result<i64>;
    fn join_challenge(&self, user_id: i64, challenge_id: i64) -> Result<UserChallenge>;
    fn list_user_challenges(&self, user_id: i64) -> Result<Vec<UserChallenge>>;
    /// Marks a joined challenge completed. Returns false if it already was.
    fn complete_challenge(
        &self,
        user_id: i64,
        challenge_id: i64,
        at: DateTime<Utc>,
    ) -> Result<bool>;
    fn count_completed_challenges(&self, user_id: i64) -> Result<i64>;
}
