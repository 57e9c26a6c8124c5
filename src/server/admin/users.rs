use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::{RequireAdmin, hash_password};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{AdminCreateUserRequest, AdminProfileRequest, AdminUpdateUserRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{validate_email, validate_household_size, validate_username};
use crate::types::{NewProfile, NewUser, ProfileUpdate, Role, UserUpdate};

const LIST_LIMIT: i64 = 200;

fn parse_role(role: Option<&str>) -> Result<Option<Role>, ApiError> {
    role.map(|r| {
        Role::parse(r.trim()).ok_or_else(|| ApiError::bad_request("Role must be one of: user, admin"))
    })
    .transpose()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn hash(password: &str) -> Result<String, ApiError> {
    hash_password(password).api_err("Failed to hash password")
}

pub async fn list_users(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .store
        .list_users(LIST_LIMIT)
        .api_err("Failed to load users")?;
    Ok(Json(ApiResponse::success(users)))
}

pub async fn create_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(username), Some(email), Some(password)) = (
        non_empty(req.username.as_deref()),
        non_empty(req.email.as_deref()),
        req.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request(
            "username, email, password are required",
        ));
    };
    validate_username(username)?;
    let email = email.to_lowercase();
    validate_email(&email)?;

    let new_user = NewUser {
        username: username.to_string(),
        email,
        password_hash: hash(password)?,
        role: parse_role(req.role.as_deref())?.unwrap_or_default(),
        is_active: req.is_active.unwrap_or(true),
    };

    let user = match state.store.create_user(&new_user) {
        Ok(user) => user,
        Err(Error::AlreadyExists(_)) => {
            return Err(ApiError::bad_request("Username or email already exists"));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create user");
            return Err(ApiError::internal("Failed to create user"));
        }
    };
    tracing::info!(user_id = user.id, username = %user.username, "User created by admin");

    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

pub async fn update_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = non_empty(req.username.as_deref());
    if let Some(username) = username {
        validate_username(username)?;
    }
    let email = non_empty(req.email.as_deref()).map(str::to_lowercase);
    if let Some(email) = &email {
        validate_email(email)?;
    }
    let password_hash = match req.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(hash(password)?),
        None => None,
    };

    let update = UserUpdate {
        username: username.map(str::to_string),
        email,
        password_hash,
        role: parse_role(req.role.as_deref())?,
        is_active: req.is_active,
    };

    let user = state.store.update_user(id, &update).map_err(|e| match e {
        Error::NotFound => ApiError::not_found("User not found"),
        Error::AlreadyExists(_) => ApiError::conflict("Username or email already exists"),
        e => ApiError::from(e),
    })?;

    Ok(Json(ApiResponse::success(user).with_message("User updated")))
}

pub async fn list_profiles(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let profiles = state
        .store
        .list_profiles(LIST_LIMIT)
        .api_err("Failed to load profiles")?;
    Ok(Json(ApiResponse::success(profiles)))
}

pub async fn create_profile(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = req
        .user_id
        .ok_or_else(|| ApiError::bad_request("user_id is required"))?;
    state
        .store
        .get_user(user_id)
        .api_err("Failed to create profile")?
        .or_not_found("User not found")?;

    let mut profile = NewProfile::for_user(user_id);
    if let Some(country) = non_empty(req.country.as_deref()) {
        profile.country = country.to_string();
    }
    if let Some(size) = req.household_size {
        validate_household_size(size)?;
        profile.household_size = size;
    }
    profile.baseline_calculated = req.baseline_calculated.unwrap_or(false);
    profile.baseline_co2e = req.baseline_co2e.unwrap_or(0.0);

    let profile = state.store.create_profile(&profile).map_err(|e| match e {
        Error::AlreadyExists(_) => ApiError::conflict("User already has a profile"),
        e => ApiError::from(e),
    })?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(profile))))
}

pub async fn update_profile(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AdminProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(size) = req.household_size {
        validate_household_size(size)?;
    }
    let update = ProfileUpdate {
        country: non_empty(req.country.as_deref()).map(str::to_string),
        household_size: req.household_size,
        baseline_calculated: req.baseline_calculated,
        baseline_co2e: req.baseline_co2e,
    };

    let profile = state.store.update_profile(id, &update).map_err(|e| match e {
        Error::NotFound => ApiError::not_found("Profile not found"),
        e => ApiError::from(e),
    })?;

    Ok(Json(ApiResponse::success(profile).with_message("Profile updated")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role(None).unwrap(), None);
        assert_eq!(parse_role(Some(" admin ")).unwrap(), Some(Role::Admin));
        let err = parse_role(Some("root")).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
