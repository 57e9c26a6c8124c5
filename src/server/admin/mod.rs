mod challenges;
mod factors;
mod insights;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // Users and profiles
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/{id}", put(users::update_user))
        .route("/profiles", get(users::list_profiles))
        .route("/profiles", post(users::create_profile))
        .route("/profiles/{id}", put(users::update_profile))
        // Challenges
        .route("/challenges", get(challenges::list_challenges))
        .route("/challenges", post(challenges::create_challenge))
        .route(
            "/challenges/{id}",
            put(challenges::update_challenge).delete(challenges::delete_challenge),
        )
        // Emission factors
        .route("/emission-factors", get(factors::list_factors))
        .route("/emission-factors", post(factors::create_factor))
        .route("/emission-factors/{id}", put(factors::update_factor))
        .route("/factor-search", get(factors::search_factors))
        // Overview and challenge planning
        .route("/scenarios", get(insights::scenarios_overview))
        .route("/emission-estimates", get(insights::emission_estimates))
        .route("/generate-challenge", post(insights::generate_challenge))
}
