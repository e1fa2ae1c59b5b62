//! Credential service: password hashing and signed session tokens.
//!
//! Session tokens are HS256 JWTs carrying the subject id and role. Device
//! tokens are a separate credential entirely (opaque strings resolved by the
//! ingestion pipeline) and never pass through this module.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ApiError;

/// Closed role set; checked by exhaustive matching, never string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Operator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "operator" => Some(Role::Operator),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: String,
    iat: i64,
    exp: i64,
}

/// Verified token contents: the authenticated subject and its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenData {
    pub user_id: i64,
    pub role: Role,
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| ApiError::Database(format!("bcrypt hash failed: {}", e)))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}

pub fn create_access_token(secret: &str, user_id: i64, role: Role, ttl: Duration) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        iat: now,
        exp: now + ttl.as_secs() as i64,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Database(format!("token signing failed: {}", e)))
}

/// Fails with `InvalidToken` on a bad signature, expiry, or missing/garbled
/// `sub`/`role` claims.
pub fn decode_access_token(secret: &str, token: &str) -> Result<TokenData, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::InvalidToken)?;

    let user_id = data.claims.sub.parse::<i64>().map_err(|_| ApiError::InvalidToken)?;
    let role = Role::parse(&data.claims.role).ok_or(ApiError::InvalidToken)?;
    Ok(TokenData { user_id, role })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn role_round_trips_and_rejects_unknown() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("operator"), Some(Role::Operator));
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse(Role::Admin.as_str()), Some(Role::Admin));
    }

    #[test]
    fn password_hash_verifies_but_is_salted() {
        let first = hash_password("hunter2").unwrap();
        let second = hash_password("hunter2").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("hunter2", &first));
        assert!(verify_password("hunter2", &second));
        assert!(!verify_password("hunter3", &first));
    }

    #[test]
    fn verify_tolerates_malformed_hash() {
        assert!(!verify_password("hunter2", "not-a-bcrypt-hash"));
    }

    #[test]
    fn token_round_trips_subject_and_role() {
        let token = create_access_token(SECRET, 42, Role::Operator, Duration::from_secs(3600)).unwrap();
        let data = decode_access_token(SECRET, &token).unwrap();
        assert_eq!(data.user_id, 42);
        assert_eq!(data.role, Role::Operator);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = create_access_token("other-secret", 42, Role::Admin, Duration::from_secs(3600)).unwrap();
        assert!(matches!(
            decode_access_token(SECRET, &token),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the default 60s validation leeway.
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "42".to_string(),
            role: "operator".to_string(),
            iat: now - 600,
            exp: now - 300,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            decode_access_token(SECRET, &token),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn token_with_unknown_role_is_rejected() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "42".to_string(),
            role: "superuser".to_string(),
            iat: now,
            exp: now + 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            decode_access_token(SECRET, &token),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn token_with_non_numeric_subject_is_rejected() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "forty-two".to_string(),
            role: "admin".to_string(),
            iat: now,
            exp: now + 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            decode_access_token(SECRET, &token),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(matches!(
            decode_access_token(SECRET, "not.a.jwt"),
            Err(ApiError::InvalidToken)
        ));
    }
}
