use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Duration;
use rand::Rng;

use crate::auth::{RequireUser, hash_password, issue_session, verify_password};
use crate::error::Error;
use crate::gamification::{badges_for_level, level_for};
use crate::server::AppState;
use crate::server::dto::{
    BadgesResponse, LoginRequest, MeResponse, RegisterRequest, UpdateProfileRequest, UserSummary,
};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::{
    validate_email, validate_household_size, validate_password, validate_username,
};
use crate::types::{NewProfile, NewUser, Profile, ProfileUpdate, Role, User, UserUpdate};

const USERNAME_ATTEMPTS: usize = 10;

pub fn account_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/me/badges", get(my_badges))
        .route("/profile", put(update_profile))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lowercase ASCII letters and digits of a name part.
fn slug(part: &str) -> String {
    let slug: String = part
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    if slug.is_empty() {
        "user".to_string()
    } else {
        slug
    }
}

fn duplicate_user_error(message: &str) -> ApiError {
    if message.contains("email") {
        ApiError::bad_request("Email already in use")
    } else {
        ApiError::bad_request("Username already taken")
    }
}

fn insert_user(state: &AppState, new_user: &NewUser) -> Result<User, ApiError> {
    state.store.create_user(new_user).map_err(|e| match e {
        Error::AlreadyExists(msg) => duplicate_user_error(&msg),
        e => {
            tracing::error!(error = %e, "failed to create user");
            ApiError::internal("An error occurred during registration")
        }
    })
}

/// Returns the user's profile, creating the default one if it is missing.
fn ensure_profile(state: &AppState, user_id: i64) -> Result<Profile, ApiError> {
    if let Some(profile) = state
        .store
        .get_profile_by_user(user_id)
        .api_err("Failed to load profile")?
    {
        return Ok(profile);
    }
    state
        .store
        .create_profile(&NewProfile::for_user(user_id))
        .api_err("Failed to create profile")
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(first_name), Some(last_name), Some(email), Some(password)) = (
        non_empty(req.first_name),
        non_empty(req.last_name),
        non_empty(req.email),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Please provide all required fields"));
    };

    let email = email.to_lowercase();
    validate_email(&email)?;
    validate_password(&password)?;

    if state
        .store
        .get_user_by_email(&email)
        .api_err("Failed to check email")?
        .is_some()
    {
        return Err(ApiError::bad_request("Email already in use"));
    }

    let password_hash = hash_password(&password).api_err("Failed to hash password")?;
    let mut new_user = NewUser {
        username: String::new(),
        email,
        password_hash,
        role: Role::User,
        is_active: true,
    };

    let user = match non_empty(req.username) {
        Some(username) => {
            validate_username(&username)?;
            if state
                .store
                .get_user_by_username(&username)
                .api_err("Failed to check username")?
                .is_some()
            {
                return Err(ApiError::bad_request("Username already taken"));
            }
            new_user.username = username;
            insert_user(&state, &new_user)?
        }
        None => {
            let base = format!("{}_{}", slug(&first_name), slug(&last_name));
            let mut created = None;
            for _ in 0..USERNAME_ATTEMPTS {
                new_user.username = format!("{base}{}", rand::thread_rng().gen_range(0..100));
                match state.store.create_user(&new_user) {
                    Ok(user) => {
                        created = Some(user);
                        break;
                    }
                    Err(Error::AlreadyExists(msg)) if msg.contains("username") => continue,
                    Err(Error::AlreadyExists(msg)) => return Err(duplicate_user_error(&msg)),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to create user");
                        return Err(ApiError::internal("An error occurred during registration"));
                    }
                }
            }
            created.ok_or_else(|| {
                ApiError::bad_request("Could not generate a unique username, please choose one")
            })?
        }
    };

    ensure_profile(&state, user.id)?;

    let ttl = Duration::hours(state.auth.session_ttl_hours);
    let (token, _) =
        issue_session(state.store.as_ref(), user.id, Some(ttl)).api_err("Failed to create session")?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::success(UserSummary::from(&user))
                .with_message("User registered successfully")
                .with_token(token),
        ),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(password)) = (non_empty(req.email), req.password) else {
        return Err(ApiError::bad_request("Please provide email and password"));
    };

    let user = state
        .store
        .get_user_by_email(&email.to_lowercase())
        .api_err("An error occurred during login")?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !verify_password(&password, &user.password_hash).api_err("An error occurred during login")? {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    if !user.is_active {
        return Err(ApiError::unauthorized("Your account has been deactivated"));
    }

    if let Err(e) = state.store.delete_expired_sessions() {
        tracing::warn!("Failed to prune expired sessions: {e}");
    }

    let ttl = if req.remember {
        Duration::days(state.auth.remember_ttl_days)
    } else {
        Duration::hours(state.auth.session_ttl_hours)
    };
    let (token, _) =
        issue_session(state.store.as_ref(), user.id, Some(ttl)).api_err("Failed to create session")?;

    Ok(Json(
        ApiResponse::success(UserSummary::from(&user)).with_token(token),
    ))
}

pub async fn logout(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .delete_session(&auth.session.id)
        .api_err("Failed to end session")?;

    Ok(Json(ApiResponse::message("Logged out successfully")))
}

pub async fn me(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .store
        .get_profile_by_user(auth.user.id)
        .api_err("An error occurred while retrieving profile")?;

    Ok(Json(ApiResponse::success(MeResponse {
        user: UserSummary::from(&auth.user),
        profile,
    })))
}

pub async fn update_profile(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut user = auth.user;

    if let Some(username) = non_empty(req.username).filter(|u| *u != user.username) {
        validate_username(&username)?;
        if state
            .store
            .get_user_by_username(&username)
            .api_err("Failed to check username")?
            .is_some_and(|existing| existing.id != user.id)
        {
            return Err(ApiError::bad_request("Username already taken"));
        }
        let update = UserUpdate {
            username: Some(username),
            ..Default::default()
        };
        user = state.store.update_user(user.id, &update).map_err(|e| match e {
            Error::AlreadyExists(_) => ApiError::bad_request("Username already taken"),
            e => ApiError::from(e),
        })?;
    }

    if let Some(size) = req.household_size {
        validate_household_size(size)?;
    }
    let country = match req.country {
        Some(country) => Some(
            non_empty(Some(country)).ok_or_else(|| ApiError::bad_request("Country cannot be empty"))?,
        ),
        None => None,
    };

    let mut profile = ensure_profile(&state, user.id)?;
    let update = ProfileUpdate {
        country,
        household_size: req.household_size,
        ..Default::default()
    };
    if !update.is_empty() {
        profile = state.store.update_profile(profile.id, &update)?;
    }

    Ok(Json(
        ApiResponse::success(MeResponse {
            user: UserSummary::from(&user),
            profile: Some(profile),
        })
        .with_message("Profile updated successfully"),
    ))
}

pub async fn my_badges(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let xp = state
        .store
        .get_xp(auth.user.id)
        .api_err("Failed to load badges")?;
    let level = level_for(xp.xp_total);

    Ok(Json(ApiResponse::success(BadgesResponse {
        level,
        xp_total: xp.xp_total,
        badges: badges_for_level(level),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_keeps_ascii_alphanumerics() {
        assert_eq!(slug("Jane"), "jane");
        assert_eq!(slug("O'Brien-Smith"), "obriensmith");
        assert_eq!(slug("  "), "user");
    }

    #[test]
    fn test_duplicate_error_names_the_column() {
        assert_eq!(
            duplicate_user_error("UNIQUE constraint failed: users.email").message,
            "Email already in use"
        );
        assert_eq!(
            duplicate_user_error("UNIQUE constraint failed: users.username").message,
            "Username already taken"
        );
    }
}
