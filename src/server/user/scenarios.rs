use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::award_xp;
use crate::auth::RequireUser;
use crate::gamification::XP_SCENARIO_CREATED;
use crate::server::AppState;
use crate::server::dto::{CreateScenarioRequest, PageParams};
use crate::server::response::{
    ApiError, ApiResponse, PaginatedResponse, Pagination, StoreOptionExt, StoreResultExt,
};
use crate::server::validation::{clamp_limit, validate_scenario};
use crate::types::{Scenario, ScenarioWithActivities};

const MAX_ACTIVE_SCENARIOS: i64 = 50;
const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Loads an active scenario owned by `user_id`. Other users' and deleted
/// scenarios are reported as missing.
pub(super) fn owned_scenario(
    state: &AppState,
    user_id: i64,
    id: i64,
) -> Result<Scenario, ApiError> {
    state
        .store
        .get_scenario(id)
        .api_err("An error occurred while fetching the scenario")?
        .filter(|s| s.user_id == user_id && s.is_active)
        .or_not_found("Scenario not found")
}

fn with_activities(
    state: &AppState,
    scenario: Scenario,
) -> Result<ScenarioWithActivities, ApiError> {
    let activities = state
        .store
        .list_activities(scenario.id)
        .api_err("Failed to load activities")?;
    Ok(ScenarioWithActivities {
        scenario,
        activities,
    })
}

pub async fn create_scenario(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateScenarioRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (name, description) = validate_scenario(req.name.as_deref(), req.description.as_deref())?;

    let count = state
        .store
        .count_active_scenarios(auth.user.id)
        .api_err("An error occurred while creating the scenario")?;
    if count >= MAX_ACTIVE_SCENARIOS {
        return Err(ApiError::bad_request(format!(
            "Maximum number of scenarios reached ({MAX_ACTIVE_SCENARIOS}). Please delete some scenarios first."
        )));
    }

    let scenario = state
        .store
        .create_scenario(auth.user.id, &name, &description)
        .api_err("An error occurred while creating the scenario")?;
    award_xp(&state, auth.user.id, XP_SCENARIO_CREATED);

    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::success(ScenarioWithActivities {
                scenario,
                activities: Vec::new(),
            })
            .with_message("Scenario created successfully"),
        ),
    ))
}

pub async fn list_scenarios(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = clamp_limit(params.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let page = params.page.unwrap_or(1).max(1);

    let total = state
        .store
        .count_active_scenarios(auth.user.id)
        .api_err("An error occurred while fetching scenarios")?;
    let pagination = Pagination::new(page, limit, total);

    let scenarios = state
        .store
        .list_scenarios(auth.user.id, limit, pagination.offset())
        .api_err("An error occurred while fetching scenarios")?
        .into_iter()
        .map(|s| with_activities(&state, s))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(PaginatedResponse::new(scenarios, pagination)))
}

pub async fn get_scenario(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let scenario = owned_scenario(&state, auth.user.id, id)?;
    Ok(Json(ApiResponse::success(with_activities(&state, scenario)?)))
}

pub async fn delete_scenario(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let scenario = owned_scenario(&state, auth.user.id, id)?;
    state
        .store
        .deactivate_scenario(scenario.id)
        .api_err("An error occurred while deleting the scenario")?;

    Ok(Json(ApiResponse::message("Scenario deleted successfully")))
}
