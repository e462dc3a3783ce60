//! Application Layer
//!
//! Use cases and application services.

pub mod account_admin;
pub mod api_key;
pub mod audit;
pub mod config;
pub mod csrf;
pub mod housekeeping;
pub mod identity;
pub mod oauth_login;
pub mod session_manager;

// Re-exports
pub use account_admin::AccountAdmin;
pub use api_key::{ApiKeyAuthenticator, NewApiKey};
pub use audit::AuditLog;
pub use config::{AuthConfig, OAuthConfig};
pub use csrf::CsrfGuard;
pub use housekeeping::{Housekeeping, HousekeepingReport};
pub use identity::{AuthMethod, Guard, Identity, IdentityResolver};
pub use oauth_login::{CallbackParams, LoginSuccess, OAuthLoginUseCase, safe_redirect};
pub use session_manager::{IssuedSession, LogoutTarget, SessionManager, ValidatedSession};
