//! Request error taxonomy shared by all services and handlers.
//!
//! Every variant maps to a terminal HTTP response; nothing here is fatal to
//! the process. `InvalidToken` intentionally surfaces as 401 so callers
//! cannot distinguish a malformed session token from a missing one.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    /// Missing/invalid session or device token.
    Unauthorized(String),
    /// Authenticated but not permitted (non-owner mutating another's farm).
    Forbidden(String),
    /// Referenced entity absent.
    NotFound(String),
    /// Cross-entity consistency violation or invalid request data.
    BadRequest(String),
    /// Malformed, expired, or unsigned session token.
    InvalidToken,
    /// Store failure; details are logged server-side only.
    Database(String),
}

impl core::fmt::Display for ApiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ApiError::Unauthorized(m) => write!(f, "unauthorized: {}", m),
            ApiError::Forbidden(m) => write!(f, "forbidden: {}", m),
            ApiError::NotFound(m) => write!(f, "not found: {}", m),
            ApiError::BadRequest(m) => write!(f, "bad request: {}", m),
            ApiError::InvalidToken => write!(f, "invalid token"),
            ApiError::Database(m) => write!(f, "database error: {}", m),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<diesel::result::Error> for ApiError {
    fn from(value: diesel::result::Error) -> Self {
        ApiError::Database(value.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(value: diesel::r2d2::PoolError) -> Self {
        ApiError::Database(value.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Unauthorized(m) => ErrorBody {
                code: "unauthorized",
                message: m.clone(),
            },
            ApiError::Forbidden(m) => ErrorBody {
                code: "forbidden",
                message: m.clone(),
            },
            ApiError::NotFound(m) => ErrorBody {
                code: "not_found",
                message: m.clone(),
            },
            ApiError::BadRequest(m) => ErrorBody {
                code: "bad_request",
                message: m.clone(),
            },
            ApiError::InvalidToken => ErrorBody {
                code: "unauthorized",
                message: "invalid token".to_string(),
            },
            // Store details stay in the log, not the response.
            ApiError::Database(_) => ErrorBody {
                code: "internal",
                message: "internal server error".to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if let ApiError::Database(detail) = &self {
            log::error!("store failure: {}", detail);
        }
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Database("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn database_details_are_not_leaked() {
        let body = ApiError::Database("connection refused".into()).body();
        assert_eq!(body.message, "internal server error");
    }
}
