use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use chrono::{Duration, Utc};

use crate::assistant::{ChatContext, ChatMode};
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{ChatRequest, MotivationRequest};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};

/// Sum of the user's activities over the last seven days.
fn weekly_total(state: &AppState, user_id: i64) -> Result<f64, ApiError> {
    let since = Utc::now() - Duration::days(7);
    let points = state
        .store
        .list_activity_points(Some(user_id), Some(since))
        .api_err("Failed to load weekly emissions")?;
    Ok(points.iter().map(|p| p.co2e_amount).sum())
}

/// Body is optional; without a numeric `userCarbonData` the weekly total
/// is computed from stored activities.
pub async fn motivation(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    body: Option<Json<MotivationRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let provided = body.and_then(|Json(req)| req.user_carbon_data.and_then(|v| v.as_f64()));
    let user_weekly = match provided {
        Some(value) => value,
        None => weekly_total(&state, auth.user.id)?,
    };

    let community_avg = state
        .store
        .community_average_since(Utc::now() - Duration::days(7))
        .api_err("Failed to compute community average")?;

    let motivation = state.assistant.motivation(user_weekly, community_avg).await;
    Ok(Json(ApiResponse::success(motivation)))
}

pub async fn chat(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.message.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }
    let mode = ChatMode::parse(req.mode.as_deref());

    // Context only feeds tips; a lookup failure degrades to general advice.
    let context = match mode {
        ChatMode::Tips => chat_context(&state, auth.user.id).unwrap_or_else(|e| {
            tracing::warn!(user_id = auth.user.id, "Chat context unavailable: {}", e.message);
            ChatContext::default()
        }),
        ChatMode::Qa => ChatContext::default(),
    };

    let reply = state.assistant.chat(text, mode, context).await;
    Ok(Json(ApiResponse::success(reply)))
}

fn chat_context(state: &AppState, user_id: i64) -> Result<ChatContext, ApiError> {
    Ok(ChatContext {
        weekly_co2e: weekly_total(state, user_id)?,
        scenarios: state
            .store
            .count_active_scenarios(user_id)
            .api_err("Failed to load chat context")?,
        activities: state
            .store
            .count_user_activities(user_id)
            .api_err("Failed to load chat context")?,
    })
}
