use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{
    LikeToggle, LimitParams, Milestone, MilestoneEntry, MilestoneFeed, MilestoneLikeRequest,
    MilestoneLikes, MilestoneStats, MilestoneUser,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::clamp_limit;
use crate::types::UserAggregate;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Milestones a user has reached.
fn milestones_for(scenarios: i64, activities: i64, avg_emissions: f64) -> Vec<Milestone> {
    let mut reached = Vec::new();
    if scenarios >= 1 {
        reached.push(Milestone { id: "first_scenario", label: "First Scenario" });
    }
    if scenarios >= 5 {
        reached.push(Milestone { id: "five_scenarios", label: "5 Scenarios" });
    }
    if activities >= 10 {
        reached.push(Milestone { id: "ten_activities", label: "10 Activities" });
    }
    if avg_emissions > 0.0 && avg_emissions < 100.0 {
        reached.push(Milestone { id: "low_avg", label: "Avg CO₂e < 100" });
    }
    reached
}

fn feed_entry(row: UserAggregate, like_count: i64, liked: bool) -> MilestoneEntry {
    MilestoneEntry {
        milestones: milestones_for(row.scenario_count, row.activity_count, row.avg_emissions),
        stats: MilestoneStats {
            scenarios: row.scenario_count,
            activities: row.activity_count,
            avg_emissions: round1(row.avg_emissions),
        },
        user: MilestoneUser {
            id: row.user_id,
            username: row.username,
            profile_picture: row.profile_picture,
        },
        last_update: row.last_update,
        like_count,
        liked,
    }
}

pub async fn feed(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);

    let rows = state
        .store
        .milestone_aggregates(limit)
        .api_err("Failed to load milestones")?;
    let counts: BTreeMap<i64, i64> = state
        .store
        .milestone_like_counts()
        .api_err("Failed to load milestones")?
        .into_iter()
        .collect();
    let liked: HashSet<i64> = state
        .store
        .list_liked_milestones(auth.user.id)
        .api_err("Failed to load milestones")?
        .into_iter()
        .collect();

    let feed = rows
        .into_iter()
        .map(|row| {
            let id = row.user_id;
            feed_entry(
                row,
                counts.get(&id).copied().unwrap_or(0),
                liked.contains(&id),
            )
        })
        .collect();

    Ok(Json(ApiResponse::success(MilestoneFeed {
        feed,
        updated: Utc::now(),
    })))
}

pub async fn toggle_like(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<MilestoneLikeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let milestone_user_id = req
        .milestone_user_id
        .ok_or_else(|| ApiError::bad_request("milestone_user_id is required"))?;

    state
        .store
        .get_user(milestone_user_id)
        .api_err("Failed to toggle like")?
        .or_not_found("User not found")?;

    let (liked, count) = state
        .store
        .toggle_milestone_like(auth.user.id, milestone_user_id)
        .api_err("Failed to toggle like")?;

    Ok(Json(ApiResponse::success(LikeToggle { liked, count })))
}

pub async fn likes(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let liked = state
        .store
        .list_liked_milestones(auth.user.id)
        .api_err("Failed to get likes")?;
    let counts = state
        .store
        .milestone_like_counts()
        .api_err("Failed to get likes")?
        .into_iter()
        .collect();

    Ok(Json(ApiResponse::success(MilestoneLikes { liked, counts })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(m: &[Milestone]) -> Vec<&'static str> {
        m.iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_milestones_for() {
        assert!(milestones_for(0, 0, 0.0).is_empty());
        assert_eq!(ids(&milestones_for(1, 3, 250.0)), vec!["first_scenario"]);
        assert_eq!(
            ids(&milestones_for(5, 10, 42.0)),
            vec!["first_scenario", "five_scenarios", "ten_activities", "low_avg"]
        );
    }

    #[test]
    fn test_feed_entry_rounds_average() {
        let row = UserAggregate {
            user_id: 7,
            username: "sam".to_string(),
            profile_picture: None,
            scenario_count: 2,
            activity_count: 4,
            total_emissions: 20.0,
            avg_emissions: 12.345,
            last_update: None,
        };
        let entry = feed_entry(row, 3, true);
        assert_eq!(entry.user.id, 7);
        assert_eq!(entry.stats.avg_emissions, 12.3);
        assert_eq!(entry.like_count, 3);
        assert!(entry.liked);
    }
}
