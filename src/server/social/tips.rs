use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{
    CreateTipRequest, LikeToggle, LimitParams, TipEntry, TipLikeRequest, TipsResponse,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{clamp_limit, validate_tip};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;
const DEFAULT_TIP_TYPE: &str = "general";

pub async fn list_tips(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);

    let tips = state.store.list_tips(limit).api_err("Failed to get tips")?;
    let liked: HashSet<i64> = state
        .store
        .list_liked_tips(auth.user.id)
        .api_err("Failed to get tips")?
        .into_iter()
        .collect();

    let tips = tips
        .into_iter()
        .map(|tip| TipEntry {
            liked: liked.contains(&tip.tip.id),
            tip,
        })
        .collect();

    Ok(Json(ApiResponse::success(TipsResponse { tips })))
}

pub async fn create_tip(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTipRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = validate_tip(req.content.as_deref())?;
    let tip_type = req
        .tip_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TIP_TYPE);

    let tip = state
        .store
        .create_tip(auth.user.id, &content, tip_type)
        .api_err("Failed to create tip")?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(tip))))
}

pub async fn toggle_like(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<TipLikeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tip_id = req
        .tip_id
        .ok_or_else(|| ApiError::bad_request("tip_id is required"))?;

    state
        .store
        .get_tip(tip_id)
        .api_err("Failed to toggle like")?
        .or_not_found("Tip not found")?;

    let (liked, count) = state
        .store
        .toggle_tip_like(auth.user.id, tip_id)
        .api_err("Failed to toggle like")?;

    Ok(Json(ApiResponse::success(LikeToggle { liked, count })))
}
