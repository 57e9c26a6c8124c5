use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::auth::RequireUser;
use crate::gamification::rank_badge;
use crate::server::AppState;
use crate::server::dto::{LeaderboardEntry, LeaderboardParams, LeaderboardResponse, Metric};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::clamp_limit;
use crate::types::{LeaderboardKind, UserAggregate};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn entry(kind: LeaderboardKind, rank: usize, row: UserAggregate) -> LeaderboardEntry {
    let avg = Metric::Amount(round1(row.avg_emissions));
    let scenarios = Metric::Count(row.scenario_count);
    let (metric, metric_label, secondary_metric, secondary_label) = match kind {
        LeaderboardKind::Scenarios => (scenarios, "scenarios", avg, "avg CO₂e"),
        LeaderboardKind::Reduction => (avg, "avg CO₂e", scenarios, "scenarios"),
        LeaderboardKind::Activities => (
            Metric::Count(row.activity_count),
            "activities",
            scenarios,
            "scenarios",
        ),
    };

    LeaderboardEntry {
        rank,
        username: row.username,
        profile_picture: row.profile_picture,
        metric,
        metric_label,
        secondary_metric,
        secondary_label,
        badge: rank_badge(kind, rank),
    }
}

pub async fn get_leaderboard(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = match params.kind.as_deref() {
        None | Some("") => LeaderboardKind::default(),
        Some(s) => LeaderboardKind::parse(s).ok_or_else(|| {
            ApiError::bad_request(
                "Invalid leaderboard type. Must be one of: scenarios, reduction, activities",
            )
        })?,
    };
    let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);

    let leaderboard = state
        .store
        .leaderboard(kind, limit)
        .api_err("An error occurred while fetching leaderboard data")?
        .into_iter()
        .enumerate()
        .map(|(i, row)| entry(kind, i + 1, row))
        .collect();

    Ok(Json(ApiResponse::success(LeaderboardResponse {
        kind,
        leaderboard,
        updated: Utc::now(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> UserAggregate {
        UserAggregate {
            user_id: 1,
            username: "jane".to_string(),
            profile_picture: None,
            scenario_count: 3,
            activity_count: 12,
            total_emissions: 100.0,
            avg_emissions: 33.333,
            last_update: None,
        }
    }

    #[test]
    fn test_reduction_entry_swaps_metrics() {
        let e = entry(LeaderboardKind::Reduction, 1, row());
        assert_eq!(e.metric, Metric::Amount(33.3));
        assert_eq!(e.secondary_metric, Metric::Count(3));
        assert_eq!(e.badge.title, "Eco Champion");
    }

    #[test]
    fn test_activities_entry_beyond_podium() {
        let e = entry(LeaderboardKind::Activities, 4, row());
        assert_eq!(e.metric, Metric::Count(12));
        assert_eq!(e.metric_label, "activities");
        assert_eq!(e.badge.title, "Participant");
    }
}
