//! Application Error
//!
//! [`AppError`] is what crosses the HTTP boundary. Domain crates keep their own
//! error enums and convert into this type at the edge.

use std::borrow::Cow;
use std::fmt;

use super::kind::ErrorKind;

/// Unified error type
///
/// * `kind` - classification, decides the status code
/// * `message` - safe to show to the caller
/// * `code` - stable machine-readable code (e.g. `state_mismatch`)
///
/// ```rust
/// use kernel::error::{app_error::AppError, kind::ErrorKind};
///
/// let err = AppError::new(ErrorKind::Forbidden, "Missing permission").with_code("permission_denied");
/// assert_eq!(err.status_code(), 403);
/// assert_eq!(err.code(), Some("permission_denied"));
/// ```
#[derive(Debug)]
pub struct AppError {
    kind: ErrorKind,
    message: Cow<'static, str>,
    code: Option<&'static str>,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    /// Attach a stable code callers can branch on instead of parsing the message.
    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&'static str> {
        self.code
    }

    /// Replace the message of a server error with a generic one.
    ///
    /// Client errors keep their message; it was written for the caller.
    pub fn redacted(mut self) -> Self {
        if self.kind.is_server_error() {
            self.message = Cow::Borrowed("An internal error occurred");
        }
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_error() {
        let err = AppError::new(ErrorKind::NotFound, "API key not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.message(), "API key not found");
        assert!(err.code().is_none());
    }

    #[test]
    fn test_redacted_hides_server_detail_only() {
        let err = AppError::new(ErrorKind::BadGateway, "token endpoint returned 500").redacted();
        assert_eq!(err.message(), "An internal error occurred");

        let err = AppError::new(ErrorKind::Forbidden, "Missing permission")
            .with_code("permission_denied")
            .redacted();
        assert_eq!(err.message(), "Missing permission");
        assert_eq!(err.code(), Some("permission_denied"));
    }

    #[test]
    fn test_display() {
        let err = AppError::new(ErrorKind::TooManyRequests, "Slow down");
        assert_eq!(err.to_string(), "[Too Many Requests] Slow down");
    }
}
