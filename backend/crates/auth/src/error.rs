//! Auth Error Types
//!
//! The closed set of failures of the auth core. Converts into the unified
//! `kernel::error::AppError` at the HTTP edge.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::crypto::CryptoError;
use platform::rate_limit::RateLimitError;
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Enumerable reason attached to the login page redirect
/// (`/login?error=<code>`). Never carries upstream text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum LoginErrorCode {
    #[display("state_mismatch")]
    StateMismatch,
    #[display("token_exchange_failed")]
    TokenExchangeFailed,
    #[display("userinfo_failed")]
    UserInfoFailed,
    #[display("provider_denied")]
    ProviderDenied,
    #[display("account_inactive")]
    AccountInactive,
    #[display("configuration")]
    Configuration,
    #[display("server_error")]
    ServerError,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Provider credentials missing or invalid; login must not proceed
    #[error("Auth configuration error: {0}")]
    Configuration(String),

    /// OAuth state absent, expired, reused or different
    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("User info request failed: {0}")]
    UserInfoFailed(String),

    /// The provider redirected back with `error=...`
    #[error("Provider denied authorization: {error}")]
    ProviderDenied {
        error: String,
        description: Option<String>,
    },

    /// Unknown, expired or revoked session token or API key
    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("CSRF validation failed")]
    CsrfValidationFailed,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Configuration(_) => ErrorKind::ServiceUnavailable,
            AuthError::StateMismatch | AuthError::BadRequest(_) => ErrorKind::BadRequest,
            AuthError::TokenExchangeFailed(_) | AuthError::UserInfoFailed(_) => {
                ErrorKind::BadGateway
            }
            AuthError::ProviderDenied { .. }
            | AuthError::InvalidCredential
            | AuthError::NotAuthenticated => ErrorKind::Unauthorized,
            AuthError::AccountInactive
            | AuthError::PermissionDenied(_)
            | AuthError::CsrfValidationFailed => ErrorKind::Forbidden,
            AuthError::RateLimitExceeded { .. } => ErrorKind::TooManyRequests,
            AuthError::NotFound(_) => ErrorKind::NotFound,
            AuthError::Database(_) | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Configuration(_) => "configuration",
            AuthError::StateMismatch => "state_mismatch",
            AuthError::TokenExchangeFailed(_) => "token_exchange_failed",
            AuthError::UserInfoFailed(_) => "userinfo_failed",
            AuthError::ProviderDenied { .. } => "provider_denied",
            AuthError::InvalidCredential => "invalid_credential",
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::AccountInactive => "account_inactive",
            AuthError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            AuthError::PermissionDenied(_) => "permission_denied",
            AuthError::CsrfValidationFailed => "csrf_validation_failed",
            AuthError::NotFound(_) => "not_found",
            AuthError::BadRequest(_) => "bad_request",
            AuthError::Database(_) | AuthError::Internal(_) => "server_error",
        }
    }

    pub fn login_error_code(&self) -> LoginErrorCode {
        match self {
            AuthError::StateMismatch => LoginErrorCode::StateMismatch,
            AuthError::TokenExchangeFailed(_) => LoginErrorCode::TokenExchangeFailed,
            AuthError::UserInfoFailed(_) => LoginErrorCode::UserInfoFailed,
            AuthError::ProviderDenied { .. } => LoginErrorCode::ProviderDenied,
            AuthError::AccountInactive => LoginErrorCode::AccountInactive,
            AuthError::Configuration(_) => LoginErrorCode::Configuration,
            _ => LoginErrorCode::ServerError,
        }
    }

    /// Message shown to callers. Upstream and internal detail stays in the logs.
    fn public_message(&self) -> String {
        match self {
            AuthError::Configuration(_) => "Sign-in is not available".to_string(),
            AuthError::TokenExchangeFailed(_) | AuthError::UserInfoFailed(_) => {
                "Sign-in with the identity provider failed, please try again".to_string()
            }
            AuthError::ProviderDenied { .. } => "Sign-in was cancelled or denied".to_string(),
            AuthError::Database(_) => "Database error".to_string(),
            other => other.to_string(),
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        AppError::new(self.kind(), self.public_message()).with_code(self.code())
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::Configuration(msg) => {
                tracing::error!(message = %msg, "Auth configuration error");
            }
            AuthError::TokenExchangeFailed(detail) | AuthError::UserInfoFailed(detail) => {
                tracing::error!(code = self.code(), detail = %detail, "Identity provider failure");
            }
            AuthError::StateMismatch => {
                tracing::warn!("OAuth state mismatch on callback");
            }
            AuthError::CsrfValidationFailed => {
                tracing::warn!("CSRF validation failed");
            }
            AuthError::InvalidCredential => {
                tracing::warn!("Invalid credential presented");
            }
            AuthError::RateLimitExceeded { retry_after_secs } => {
                tracing::warn!(retry_after_secs, "Request rate limited");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }

    /// Log and render. Server-side messages are replaced with a generic one
    /// unless `debug` is set.
    pub fn render(self, debug: bool) -> Response {
        self.log();

        let app_error = if debug {
            AppError::new(self.kind(), self.to_string()).with_code(self.code())
        } else {
            self.to_app_error().redacted()
        };

        let mut response = app_error.into_response();
        if let AuthError::RateLimitExceeded { retry_after_secs } = &self
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.render(false)
    }
}

impl From<RateLimitError> for AuthError {
    fn from(err: RateLimitError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<CryptoError> for AuthError {
    fn from(err: CryptoError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::StateMismatch.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::NotAuthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::CsrfValidationFailed.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::PermissionDenied("manage_users".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::RateLimitExceeded { retry_after_secs: 3 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::TokenExchangeFailed("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(AuthError::NotFound("API key").status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_login_error_codes() {
        assert_eq!(
            AuthError::StateMismatch.login_error_code().to_string(),
            "state_mismatch"
        );
        assert_eq!(
            AuthError::UserInfoFailed("no sub".into()).login_error_code(),
            LoginErrorCode::UserInfoFailed
        );
        assert_eq!(
            AuthError::Internal("boom".into()).login_error_code().to_string(),
            "server_error"
        );
    }

    #[test]
    fn test_upstream_detail_not_public() {
        let err = AuthError::TokenExchangeFailed("status 401 from https://idp/token".into());
        let app = err.to_app_error();
        assert!(!app.message().contains("idp"));
        assert_eq!(app.code(), Some("token_exchange_failed"));
    }

    #[test]
    fn test_rate_limit_response_has_retry_after() {
        let response = AuthError::RateLimitExceeded { retry_after_secs: 42 }.render(false);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
