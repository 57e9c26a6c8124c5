use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireAdmin;
use crate::error::Error;
use crate::gamification::MAX_DURATION_DAYS;
use crate::server::AppState;
use crate::server::dto::ChallengeRequest;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::{ChallengeType, ChallengeUpdate, NewChallenge};

const DEFAULT_TARGET_UNIT: &str = "kg_co2e";
const DEFAULT_DURATION_DAYS: i64 = 7;

fn parse_type(value: Option<&str>) -> Result<Option<ChallengeType>, ApiError> {
    value
        .map(|t| {
            ChallengeType::parse(t.trim()).ok_or_else(|| {
                ApiError::bad_request(
                    "challenge_type must be one of: daily_limit, total_limit, activity_count",
                )
            })
        })
        .transpose()
}

fn check_numbers(target_value: Option<f64>, duration_days: Option<i64>) -> Result<(), ApiError> {
    if target_value.is_some_and(|v| !v.is_finite() || v < 0.0) {
        return Err(ApiError::bad_request("target_value must be a non-negative number"));
    }
    if duration_days.is_some_and(|d| d < 1) {
        return Err(ApiError::bad_request("duration_days must be at least 1"));
    }
    if duration_days.is_some_and(|d| d > MAX_DURATION_DAYS) {
        return Err(ApiError::bad_request(format!(
            "duration_days must be at most {MAX_DURATION_DAYS}"
        )));
    }
    Ok(())
}

pub async fn list_challenges(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let challenges = state
        .store
        .list_challenges(false)
        .api_err("Failed to load challenges")?;
    Ok(Json(ApiResponse::success(challenges)))
}

pub async fn create_challenge(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChallengeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    let (false, Some(target_value)) = (name.is_empty(), req.target_value) else {
        return Err(ApiError::bad_request("name and target_value are required"));
    };
    check_numbers(Some(target_value), req.duration_days)?;

    let challenge = state
        .store
        .create_challenge(&NewChallenge {
            name: name.to_string(),
            description: req.description,
            challenge_type: parse_type(req.challenge_type.as_deref())?.unwrap_or_default(),
            target_value,
            target_unit: req
                .target_unit
                .unwrap_or_else(|| DEFAULT_TARGET_UNIT.to_string()),
            duration_days: req.duration_days.unwrap_or(DEFAULT_DURATION_DAYS),
            badge_name: req.badge_name,
            is_active: req.is_active.unwrap_or(true),
        })
        .api_err("Failed to create challenge")?;
    tracing::info!(challenge_id = challenge.id, name = %challenge.name, "Challenge created");

    Ok((StatusCode::CREATED, Json(ApiResponse::success(challenge))))
}

pub async fn update_challenge(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ChallengeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_numbers(req.target_value, req.duration_days)?;
    let update = ChallengeUpdate {
        name: req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        description: req.description,
        challenge_type: parse_type(req.challenge_type.as_deref())?,
        target_value: req.target_value,
        target_unit: req.target_unit,
        duration_days: req.duration_days,
        badge_name: req.badge_name,
        is_active: req.is_active,
    };

    let challenge = state.store.update_challenge(id, &update).map_err(|e| match e {
        Error::NotFound => ApiError::not_found("Challenge not found"),
        e => ApiError::from(e),
    })?;

    Ok(Json(ApiResponse::success(challenge).with_message("Challenge updated")))
}

/// Joined challenges cannot be deleted; admins hide them instead.
pub async fn delete_challenge(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_challenge(id)
        .api_err("Failed to delete challenge")?
        .or_not_found("Challenge not found")?;

    let participants = state
        .store
        .count_challenge_participants(id)
        .api_err("Failed to delete challenge")?;
    if participants > 0 {
        return Err(ApiError::bad_request(format!(
            "Cannot delete: {participants} user(s) have joined this challenge. Hide it instead."
        )));
    }

    state
        .store
        .delete_challenge(id)
        .api_err("Failed to delete challenge")?;

    Ok(Json(ApiResponse::message("Challenge deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_numbers() {
        assert!(check_numbers(Some(5.0), Some(7)).is_ok());
        assert!(check_numbers(None, None).is_ok());
        assert!(check_numbers(Some(-1.0), None).is_err());
        assert!(check_numbers(Some(f64::NAN), None).is_err());
        assert!(check_numbers(None, Some(0)).is_err());
        assert!(check_numbers(None, Some(MAX_DURATION_DAYS)).is_ok());
        assert!(check_numbers(Some(1.0), Some(200_000_000)).is_err());
    }

    #[test]
    fn test_parse_type_defaults_and_rejects() {
        assert_eq!(parse_type(None).unwrap(), None);
        assert_eq!(
            parse_type(Some("activity_count")).unwrap(),
            Some(ChallengeType::ActivityCount)
        );
        assert!(parse_type(Some("weekly")).is_err());
    }
}
