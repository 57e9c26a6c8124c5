use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireAdmin;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{FactorRequest, FactorSearchParams, FactorSearchResult};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::types::{Category, EmissionFactor, EmissionFactorUpdate, NewEmissionFactor};

const LIST_LIMIT: i64 = 500;
const SEARCH_LIMIT: i64 = 20;
const DEFAULT_REGION: &str = "global";

fn parse_category(value: Option<&str>) -> Result<Option<Category>, ApiError> {
    value
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| {
            Category::parse(c).ok_or_else(|| {
                ApiError::bad_request(format!("Invalid category. Must be one of: {}", Category::names()))
            })
        })
        .transpose()
}

fn check_factor(co2e_per_unit: Option<f64>) -> Result<(), ApiError> {
    if co2e_per_unit.is_some_and(|v| !v.is_finite() || v < 0.0) {
        return Err(ApiError::bad_request("co2e_per_unit must be a non-negative number"));
    }
    Ok(())
}

fn text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn search_result(factor: EmissionFactor) -> FactorSearchResult {
    FactorSearchResult {
        id: format!("local_{}", factor.id),
        description: format!("{} ({})", factor.activity_type, factor.region),
        name: factor.activity_type,
        category: factor.category.to_string(),
        source: factor.source.unwrap_or_else(|| "local".to_string()),
        region: factor.region,
        co2e_per_unit: factor.co2e_per_unit,
        unit: factor.unit,
        source_type: "local",
    }
}

pub async fn list_factors(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let factors = state
        .store
        .list_emission_factors(LIST_LIMIT)
        .api_err("Failed to load emission factors")?;
    Ok(Json(ApiResponse::success(factors)))
}

pub async fn create_factor(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<FactorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(req.category.as_deref())?;
    let (Some(category), Some(activity_type), Some(co2e_per_unit), Some(unit)) = (
        category,
        text(req.activity_type),
        req.co2e_per_unit,
        text(req.unit),
    ) else {
        return Err(ApiError::bad_request(
            "category, activity_type, co2e_per_unit, unit are required",
        ));
    };
    check_factor(Some(co2e_per_unit))?;

    let factor = state
        .store
        .create_emission_factor(&NewEmissionFactor {
            category,
            activity_type,
            region: text(req.region).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            co2e_per_unit,
            unit,
            source: text(req.source),
        })
        .map_err(|e| match e {
            Error::AlreadyExists(_) => {
                ApiError::conflict("Duplicate factor for category/activity/region")
            }
            e => ApiError::from(e),
        })?;
    tracing::info!(
        factor_id = factor.id,
        category = %factor.category,
        activity_type = %factor.activity_type,
        region = %factor.region,
        "Emission factor created"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(factor))))
}

pub async fn update_factor(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<FactorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_factor(req.co2e_per_unit)?;
    let update = EmissionFactorUpdate {
        category: parse_category(req.category.as_deref())?,
        activity_type: text(req.activity_type),
        region: text(req.region),
        co2e_per_unit: req.co2e_per_unit,
        unit: text(req.unit),
        source: text(req.source),
    };

    let factor = state
        .store
        .update_emission_factor(id, &update)
        .map_err(|e| match e {
            Error::NotFound => ApiError::not_found("Emission factor not found"),
            Error::AlreadyExists(_) => {
                ApiError::conflict("Duplicate factor for category/activity/region")
            }
            e => ApiError::from(e),
        })?;

    Ok(Json(
        ApiResponse::success(factor).with_message("Emission factor updated"),
    ))
}

/// Searches the local factor table by activity, unit, or source.
pub async fn search_factors(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<FactorSearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(params.category.as_deref())?;
    let query = params.query.as_deref().map(str::trim).unwrap_or_default();

    let results: Vec<FactorSearchResult> = state
        .store
        .search_emission_factors(query, category, SEARCH_LIMIT)
        .api_err("Failed to search activities")?
        .into_iter()
        .map(search_result)
        .collect();

    Ok(Json(ApiResponse::success(results)))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_search_result_shape() {
        let result = search_result(EmissionFactor {
            id: 12,
            category: Category::Energy,
            activity_type: "electricity".to_string(),
            region: "US".to_string(),
            co2e_per_unit: 0.385,
            unit: "kWh".to_string(),
            source: None,
            last_updated: Utc::now(),
        });
        assert_eq!(result.id, "local_12");
        assert_eq!(result.name, "electricity");
        assert_eq!(result.category, "energy");
        assert_eq!(result.source, "local");
        assert_eq!(result.description, "electricity (US)");
    }

    #[test]
    fn test_parse_category() {
        assert_eq!(parse_category(None).unwrap(), None);
        assert_eq!(parse_category(Some("  ")).unwrap(), None);
        assert_eq!(parse_category(Some("diet")).unwrap(), Some(Category::Diet));
        assert_eq!(
            parse_category(Some("space")).unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
    }
}
