mod activities;
mod challenges;
mod leaderboard;
mod scenarios;
mod stats;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::server::AppState;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        // Scenarios
        .route("/scenarios", post(scenarios::create_scenario))
        .route("/scenarios", get(scenarios::list_scenarios))
        .route("/scenarios/{id}", get(scenarios::get_scenario))
        .route("/scenarios/{id}", delete(scenarios::delete_scenario))
        // Activities
        .route(
            "/scenarios/{id}/activities",
            post(activities::add_activity),
        )
        .route("/activities/{id}", put(activities::update_activity))
        .route("/activities/{id}", delete(activities::delete_activity))
        // Factor catalog and calculation preview
        .route("/emission-factors", get(activities::list_emission_factors))
        .route("/calculate-preview", post(activities::calculate_preview))
        // Leaderboard
        .route("/leaderboard", get(leaderboard::get_leaderboard))
        // Stats
        .route("/stats/summary", get(stats::summary))
        .route("/stats/weekly-chart", get(stats::weekly_chart))
        .route("/stats/weekly-comparison", get(stats::weekly_comparison))
        .route("/me/report", get(stats::report))
        // Challenges
        .route("/challenges", get(challenges::list_challenges))
        .route("/challenges/mine", get(challenges::my_challenges))
        .route("/challenges/{id}/join", post(challenges::join_challenge))
}

/// Adds XP for a user action. XP is a side effect, so failures are logged
/// and the request still succeeds.
pub(crate) fn award_xp(state: &AppState, user_id: i64, amount: i64) {
    if let Err(e) = state.store.add_xp(user_id, amount) {
        tracing::warn!(user_id, amount, "Failed to award XP: {e}");
    }
}
