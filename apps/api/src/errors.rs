use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Authentication failure codes surfaced to clients in `error.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    Unauthorized,
    InvalidToken,
    WrongTokenType,
    TokenBlacklisted,
    AccessTokenExpired,
    NoRefreshToken,
    InvalidRefreshToken,
    RefreshTokenExpired,
    SessionExpired,
    SessionInvalid,
    UserNotFound,
    UserDeactivated,
    InvalidCredentials,
}

impl AuthErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthErrorCode::Unauthorized => "UNAUTHORIZED",
            AuthErrorCode::InvalidToken => "INVALID_TOKEN",
            AuthErrorCode::WrongTokenType => "WRONG_TOKEN_TYPE",
            AuthErrorCode::TokenBlacklisted => "TOKEN_BLACKLISTED",
            AuthErrorCode::AccessTokenExpired => "ACCESS_TOKEN_EXPIRED",
            AuthErrorCode::NoRefreshToken => "NO_REFRESH_TOKEN",
            AuthErrorCode::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AuthErrorCode::RefreshTokenExpired => "REFRESH_TOKEN_EXPIRED",
            AuthErrorCode::SessionExpired => "SESSION_EXPIRED",
            AuthErrorCode::SessionInvalid => "SESSION_INVALID",
            AuthErrorCode::UserNotFound => "USER_NOT_FOUND",
            AuthErrorCode::UserDeactivated => "USER_DEACTIVATED",
            AuthErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            AuthErrorCode::Unauthorized => "Authentication required",
            AuthErrorCode::InvalidToken => "Invalid token",
            AuthErrorCode::WrongTokenType => "Token is not an access token",
            AuthErrorCode::TokenBlacklisted => "Token has been revoked",
            AuthErrorCode::AccessTokenExpired => "Access token expired, refresh and retry",
            AuthErrorCode::NoRefreshToken => "Refresh token not found, please log in again",
            AuthErrorCode::InvalidRefreshToken => "Invalid refresh token, please log in again",
            AuthErrorCode::RefreshTokenExpired => "Refresh token expired, please log in again",
            AuthErrorCode::SessionExpired => "Session expired, please log in again",
            AuthErrorCode::SessionInvalid => "Session is no longer valid",
            AuthErrorCode::UserNotFound => "Member not found",
            AuthErrorCode::UserDeactivated => "Account is not active",
            AuthErrorCode::InvalidCredentials => "Invalid email or password",
        }
    }

    /// Only an expired access token with a live session is worth a refresh-and-retry.
    pub fn can_retry(self) -> bool {
        matches!(self, AuthErrorCode::AccessTokenExpired)
    }

    /// Codes after which the client's token cookies are useless and get cleared.
    pub fn clears_cookies(self) -> bool {
        matches!(
            self,
            AuthErrorCode::InvalidToken
                | AuthErrorCode::NoRefreshToken
                | AuthErrorCode::InvalidRefreshToken
                | AuthErrorCode::RefreshTokenExpired
                | AuthErrorCode::SessionExpired
                | AuthErrorCode::UserNotFound
        )
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid fields: {0:?}")]
    InvalidFields(BTreeMap<String, String>),

    #[error("Email already registered: {0}")]
    EmailAlreadyExists(String),

    /// `clear_cookies` holds ready-made `Set-Cookie` values expiring the token cookies.
    #[error("Authentication failed: {}", .code.as_str())]
    Auth {
        code: AuthErrorCode,
        clear_cookies: Vec<String>,
    },

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Session store error: {0}")]
    SessionStore(#[from] redis::RedisError),

    #[error("AI analysis failed: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Not implemented")]
    NotImplemented,
}

impl AppError {
    pub fn auth(code: AuthErrorCode) -> Self {
        AppError::Auth {
            code,
            clear_cookies: Vec::new(),
        }
    }

    pub fn unauthorized() -> Self {
        AppError::auth(AuthErrorCode::Unauthorized)
    }

    /// Attaches cookie deletions to auth failures whose code calls for it.
    pub fn with_cleared_cookies(self, deletions: impl FnOnce() -> Vec<String>) -> Self {
        match self {
            AppError::Auth { code, .. } if code.clears_cookies() => AppError::Auth {
                code,
                clear_cookies: deletions(),
            },
            other => other,
        }
    }

    pub fn auth_code(&self) -> Option<AuthErrorCode> {
        match self {
            AppError::Auth { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut can_retry = false;
        let mut field_errors = None;
        let mut cookies = Vec::new();

        let (status, code, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::InvalidFields(errors) => {
                field_errors = Some(errors);
                (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "Invalid input".to_string(),
                )
            }
            AppError::EmailAlreadyExists(email) => (
                StatusCode::CONFLICT,
                "EMAIL_ALREADY_EXISTS",
                format!("Email {email} is already registered"),
            ),
            AppError::Auth {
                code,
                clear_cookies,
            } => {
                tracing::debug!("Rejecting request: {}", code.as_str());
                can_retry = code.can_retry();
                cookies = clear_cookies;
                (
                    StatusCode::UNAUTHORIZED,
                    code.as_str(),
                    code.message().to_string(),
                )
            }
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::SessionStore(e) => {
                tracing::error!("Session store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SESSION_STORE_ERROR",
                    "A session storage error occurred".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                can_retry = true;
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AI_ANALYSIS_FAILED",
                    "AI analysis failed, please try again".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
            AppError::NotImplemented => (
                StatusCode::NOT_IMPLEMENTED,
                "NOT_IMPLEMENTED",
                "This endpoint is not enabled".to_string(),
            ),
        };

        let mut body = json!({
            "error": {
                "code": code,
                "message": message,
                "can_retry": can_retry
            }
        });
        if let Some(errors) = field_errors {
            body["errors"] = json!(errors);
        }

        let mut response = (status, Json(body)).into_response();
        for cookie in cookies {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        response
    }
}
