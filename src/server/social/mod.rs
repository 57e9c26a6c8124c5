mod assistant;
mod milestones;
mod tips;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

pub fn social_router() -> Router<Arc<AppState>> {
    Router::new()
        // Milestone feed and likes
        .route("/milestones", get(milestones::feed))
        .route("/milestones/like", post(milestones::toggle_like))
        .route("/milestones/likes", get(milestones::likes))
        // Tips
        .route("/tips", get(tips::list_tips))
        .route("/tips", post(tips::create_tip))
        .route("/tips/like", post(tips::toggle_like))
        // Assistant
        .route("/motivation", post(assistant::motivation))
        .route("/chat", post(assistant::chat))
}
