use chrono::{Duration, Utc};

use super::{TokenGenerator, parse_token};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Session, User};

#[derive(Debug)]
pub enum TokenValidationError {
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    UserInactive,
    InternalError,
}

pub struct ValidatedSession {
    pub session: Session,
    pub user: User,
}

/// Extracts the token from a `Bearer` authorization header.
/// Returns None if no auth header is present.
pub fn extract_token_from_header(
    auth_header: Option<&str>,
) -> std::result::Result<Option<String>, TokenValidationError> {
    match auth_header {
        Some(header) => header
            .strip_prefix("Bearer ")
            .map(|t| Some(t.trim().to_string()))
            .ok_or(TokenValidationError::InvalidScheme),
        None => Ok(None),
    }
}

/// Validates a raw token string against the store and loads its user.
pub fn validate_session(
    store: &dyn Store,
    raw_token: &str,
) -> std::result::Result<ValidatedSession, TokenValidationError> {
    let (lookup, _secret) =
        parse_token(raw_token).map_err(|_| TokenValidationError::InvalidToken)?;

    let session = store
        .get_session_by_lookup(&lookup)
        .map_err(|_| TokenValidationError::InternalError)?
        .ok_or(TokenValidationError::InvalidToken)?;

    let generator = TokenGenerator::new();
    if !generator
        .verify(raw_token, &session.token_hash)
        .map_err(|_| TokenValidationError::InternalError)?
    {
        return Err(TokenValidationError::InvalidToken);
    }

    if let Some(expires_at) = &session.expires_at {
        if expires_at < &Utc::now() {
            return Err(TokenValidationError::TokenExpired);
        }
    }

    let user = store
        .get_user(session.user_id)
        .map_err(|_| TokenValidationError::InternalError)?
        .ok_or(TokenValidationError::InvalidToken)?;

    if !user.is_active {
        return Err(TokenValidationError::UserInactive);
    }

    if let Err(e) = store.update_session_last_used(&session.id) {
        tracing::warn!("Failed to update session last_used_at: {e}");
    }

    Ok(ValidatedSession { session, user })
}

/// Creates a session for `user_id` and returns the raw bearer token.
/// `ttl = None` issues a session that never expires.
pub fn issue_session(
    store: &dyn Store,
    user_id: i64,
    ttl: Option<Duration>,
) -> Result<(String, Session)> {
    let generator = TokenGenerator::new();

    // Lookup prefixes are 8 random chars; retry the rare collision.
    for _ in 0..3 {
        let (raw_token, lookup, hash) = generator.generate()?;
        let now = Utc::now();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            token_hash: hash,
            token_lookup: lookup,
            user_id,
            created_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
            last_used_at: None,
        };

        match store.create_session(&session) {
            Ok(()) => return Ok((raw_token, session)),
            Err(Error::TokenLookupCollision) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(Error::TokenLookupCollision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{NewUser, Role, UserUpdate};
    use tempfile::TempDir;

    fn setup() -> (TempDir, SqliteStore, User) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        let user = store
            .create_user(&NewUser {
                username: "sam".to_string(),
                email: "sam@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::User,
                is_active: true,
            })
            .unwrap();
        (temp, store, user)
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(
            extract_token_from_header(Some("Bearer abc")).unwrap(),
            Some("abc".to_string())
        );
        assert!(extract_token_from_header(None).unwrap().is_none());
        assert!(matches!(
            extract_token_from_header(Some("Basic abc")),
            Err(TokenValidationError::InvalidScheme)
        ));
    }

    #[test]
    fn test_issue_and_validate() {
        let (_temp, store, user) = setup();
        let (token, session) = issue_session(&store, user.id, Some(Duration::hours(1))).unwrap();

        let validated = validate_session(&store, &token).unwrap();
        assert_eq!(validated.session.id, session.id);
        assert_eq!(validated.user.id, user.id);

        let tampered = format!("{}0", &token[..token.len() - 1]);
        if tampered != token {
            assert!(validate_session(&store, &tampered).is_err());
        }
    }

    #[test]
    fn test_expired_session_rejected() {
        let (_temp, store, user) = setup();
        let (token, _) = issue_session(&store, user.id, Some(Duration::seconds(-5))).unwrap();
        assert!(matches!(
            validate_session(&store, &token),
            Err(TokenValidationError::TokenExpired)
        ));
    }

    #[test]
    fn test_inactive_user_rejected() {
        let (_temp, store, user) = setup();
        let (token, _) = issue_session(&store, user.id, None).unwrap();
        store
            .update_user(
                user.id,
                &UserUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(matches!(
            validate_session(&store, &token),
            Err(TokenValidationError::UserInactive)
        ));
    }
}
