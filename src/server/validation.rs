use std::sync::LazyLock;

use regex::Regex;

use crate::server::response::ApiError;

const MAX_USERNAME_LEN: usize = 50;
const MAX_SCENARIO_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_TIP_LEN: usize = 1000;
const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_HOUSEHOLD_SIZE: i64 = 50;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

fn is_valid_name_char(c: char, allow_period: bool) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || (allow_period && c == '.')
}

fn validate_name(
    name: &str,
    entity: &str,
    max_len: usize,
    allow_period: bool,
    forbid_leading_special: bool,
) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{entity} cannot be empty"));
    }
    if name.chars().count() > max_len {
        return Err(format!("{entity} cannot exceed {max_len} characters"));
    }
    if !name.chars().all(|c| is_valid_name_char(c, allow_period)) {
        let mut allowed = "letters, numbers, hyphens, and underscores".to_string();
        if allow_period {
            allowed.push_str(", and periods");
        }
        return Err(format!("{entity} can only contain {allowed}"));
    }
    if forbid_leading_special && (name.starts_with('-') || name.starts_with('_')) {
        return Err(format!("{entity} cannot start with a hyphen or underscore"));
    }
    Ok(())
}

pub fn validate_username(name: &str) -> Result<(), ApiError> {
    validate_name(name, "Username", MAX_USERNAME_LEN, true, true).map_err(ApiError::bad_request)
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(ApiError::bad_request("Please provide a valid email address"))
    }
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Returns the trimmed scenario name and description.
pub fn validate_scenario(
    name: Option<&str>,
    description: Option<&str>,
) -> Result<(String, String), ApiError> {
    let name = name.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::bad_request(
            "Scenario name is required and must be a non-empty string",
        ));
    }
    if name.chars().count() > MAX_SCENARIO_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Scenario name must be {MAX_SCENARIO_NAME_LEN} characters or less"
        )));
    }

    let description = description.map(str::trim).unwrap_or_default();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::bad_request(format!(
            "Description must be {MAX_DESCRIPTION_LEN} characters or less"
        )));
    }

    Ok((name.to_string(), description.to_string()))
}

pub fn validate_household_size(size: i64) -> Result<(), ApiError> {
    if !(1..=MAX_HOUSEHOLD_SIZE).contains(&size) {
        return Err(ApiError::bad_request(format!(
            "Household size must be between 1 and {MAX_HOUSEHOLD_SIZE}"
        )));
    }
    Ok(())
}

/// Returns the trimmed tip content.
pub fn validate_tip(content: Option<&str>) -> Result<String, ApiError> {
    let content = content.map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(ApiError::bad_request("Content is required"));
    }
    if content.chars().count() > MAX_TIP_LEN {
        return Err(ApiError::bad_request(format!(
            "Content must be {MAX_TIP_LEN} characters or less"
        )));
    }
    Ok(content.to_string())
}

/// Clamps a requested page size into `1..=max`, using `default` when absent.
#[must_use]
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}
