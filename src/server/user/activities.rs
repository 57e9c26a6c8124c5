use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::award_xp;
use super::scenarios::owned_scenario;
use crate::auth::RequireUser;
use crate::emissions::{catalog, validate_activity, validate_unit, validate_value};
use crate::error::Error;
use crate::gamification::XP_ACTIVITY_LOGGED;
use crate::server::AppState;
use crate::server::dto::{
    ActivityRequest, ActivityResponse, CatalogItem, PreviewResponse, ScenarioTotalResponse,
    UpdateActivityRequest,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::{Activity, Category, NewActivity};

/// Loads an activity whose scenario is active and owned by `user_id`.
fn owned_activity(state: &AppState, user_id: i64, id: i64) -> Result<Activity, ApiError> {
    let activity = state
        .store
        .get_activity(id)
        .api_err("An error occurred while fetching the activity")?
        .or_not_found("Activity not found")?;
    owned_scenario(state, user_id, activity.scenario_id)
        .map_err(|e| match e.status {
            StatusCode::NOT_FOUND => ApiError::not_found("Activity not found"),
            _ => e,
        })?;
    Ok(activity)
}

pub async fn add_activity(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(scenario_id): Path<i64>,
    Json(req): Json<ActivityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scenario = owned_scenario(&state, auth.user.id, scenario_id)?;

    let valid = validate_activity(
        &state.calculator,
        req.category.as_deref(),
        req.activity_type.as_deref(),
        req.value.as_ref(),
        req.unit.as_deref(),
    )?;
    let calculation = state
        .calculator
        .calculate(valid.category, &valid.activity_type, valid.value, &valid.unit, None)
        .await?;

    let (activity, scenario_total) = state
        .store
        .insert_activity(&NewActivity {
            scenario_id: scenario.id,
            category: valid.category,
            activity_type: valid.activity_type,
            value: valid.value,
            unit: valid.unit,
            co2e_amount: calculation.co2e,
            api_source: calculation.source,
        })
        .map_err(|e| match e {
            Error::NotFound => ApiError::not_found("Scenario not found"),
            e => {
                tracing::error!(error = %e, "An error occurred while adding the activity");
                ApiError::internal("An error occurred while adding the activity")
            }
        })?;
    award_xp(&state, auth.user.id, XP_ACTIVITY_LOGGED);

    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::success(ActivityResponse {
                activity,
                scenario_total,
            })
            .with_message("Activity added successfully"),
        ),
    ))
}

pub async fn update_activity(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateActivityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let activity = owned_activity(&state, auth.user.id, id)?;
    let value = validate_value(req.value.as_ref())?;
    let unit = validate_unit(req.unit.as_deref())?;

    let calculation = state
        .calculator
        .calculate(activity.category, &activity.activity_type, value, &unit, None)
        .await?;

    let (activity, scenario_total) = state
        .store
        .update_activity(id, value, &unit, calculation.co2e, &calculation.source)
        .api_err("An error occurred while updating the activity")?;

    Ok(Json(
        ApiResponse::success(ActivityResponse {
            activity,
            scenario_total,
        })
        .with_message("Activity updated successfully"),
    ))
}

pub async fn delete_activity(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let activity = owned_activity(&state, auth.user.id, id)?;
    let scenario_total = state
        .store
        .delete_activity(activity.id)
        .api_err("An error occurred while deleting the activity")?;

    Ok(Json(
        ApiResponse::success(ScenarioTotalResponse { scenario_total })
            .with_message("Activity deleted successfully"),
    ))
}

/// The built-in catalog grouped by category.
pub async fn list_emission_factors(_auth: RequireUser) -> impl IntoResponse {
    let factors: BTreeMap<&'static str, Vec<CatalogItem>> = Category::ALL
        .iter()
        .map(|&category| {
            let items = catalog::entries(category)
                .iter()
                .map(|entry| CatalogItem {
                    activity_type: entry.activity_type,
                    unit: entry.unit,
                    display_name: catalog::display_name(entry.activity_type),
                })
                .collect();
            (category.as_str(), items)
        })
        .collect();

    Json(ApiResponse::success(factors))
}

pub async fn calculate_preview(
    _auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActivityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let valid = validate_activity(
        &state.calculator,
        req.category.as_deref(),
        req.activity_type.as_deref(),
        req.value.as_ref(),
        req.unit.as_deref(),
    )?;
    let calculation = state
        .calculator
        .calculate(valid.category, &valid.activity_type, valid.value, &valid.unit, None)
        .await?;

    Ok(Json(ApiResponse::success(PreviewResponse {
        category: valid.category.to_string(),
        activity_type: valid.activity_type,
        value: valid.value,
        unit: valid.unit,
        co2e_amount: calculation.co2e,
        source: calculation.source,
    })))
}
