use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use super::award_xp;
use crate::auth::RequireUser;
use crate::error::Error;
use crate::gamification::{ChallengeStatus, XP_CHALLENGE_COMPLETED, evaluate};
use crate::server::AppState;
use crate::server::dto::MyChallenge;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};

pub async fn list_challenges(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let challenges = state
        .store
        .list_challenges(true)
        .api_err("Failed to fetch challenges")?;
    Ok(Json(ApiResponse::success(challenges)))
}

pub async fn join_challenge(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let challenge = state
        .store
        .get_challenge(id)
        .api_err("Failed to join challenge")?
        .filter(|c| c.is_active)
        .or_not_found("Challenge not found")?;

    let joined = match state.store.join_challenge(auth.user.id, challenge.id) {
        Ok(joined) => joined,
        Err(Error::AlreadyExists(_)) => {
            return Err(ApiError::conflict("Already joined this challenge"));
        }
        Err(e) => {
            tracing::error!("Failed to join challenge: {e}");
            return Err(ApiError::internal("Failed to join challenge"));
        }
    };
    tracing::info!(user_id = auth.user.id, challenge_id = challenge.id, "Challenge joined");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(joined).with_message("Challenge joined")),
    ))
}

/// Joined challenges with live progress. Challenges that have just been
/// met are marked completed and award XP once.
pub async fn my_challenges(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let now = Utc::now();

    let joined = state
        .store
        .list_user_challenges(user_id)
        .api_err("Failed to fetch your challenges")?;
    let since = joined.iter().map(|uc| uc.joined_at).min();
    let points = match since {
        Some(since) => state
            .store
            .list_activity_points(Some(user_id), Some(since))
            .api_err("Failed to fetch your challenges")?,
        None => Vec::new(),
    };

    let mut result = Vec::with_capacity(joined.len());
    for uc in joined {
        let Some(challenge) = state
            .store
            .get_challenge(uc.challenge_id)
            .api_err("Failed to fetch your challenges")?
        else {
            continue;
        };

        let progress = evaluate(&challenge, uc.joined_at, &points, now);
        let (mut completed, mut completed_at) = (uc.completed, uc.completed_at);

        if !completed && progress.status == ChallengeStatus::Completed {
            let newly = state
                .store
                .complete_challenge(user_id, challenge.id, now)
                .api_err("Failed to update challenge progress")?;
            if newly {
                award_xp(&state, user_id, XP_CHALLENGE_COMPLETED);
                tracing::info!(user_id, challenge_id = challenge.id, "Challenge completed");
            }
            completed = true;
            completed_at = Some(now);
        }

        result.push(MyChallenge {
            challenge,
            joined_at: uc.joined_at,
            completed,
            completed_at,
            progress,
        });
    }

    Ok(Json(ApiResponse::success(result)))
}
