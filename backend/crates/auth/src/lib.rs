//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository and provider traits
//! - `application/` - Use cases and application services
//! - `infra/` - Postgres and in-memory stores, provider HTTP transport
//! - `presentation/` - HTTP handlers, DTOs, middleware, router
//!
//! ## Features
//! - Sign-in through the identity provider (OAuth 2.0 authorization code)
//! - Server-side sessions with cookie-based tokens and "Remember Me"
//! - CSRF tokens bound to a signed browser context cookie
//! - Role-based access (User, Moderator, Admin, SuperAdmin) and permissions
//! - API keys with per-key rate limiting
//!
//! ## Security Model
//! - Session tokens and API keys are stored only as SHA-256 hashes
//! - OAuth state is single use and deleted before it is compared
//! - Login failures surface as enumerable codes, never upstream text
//! - Rate limit counters are checked and incremented in one atomic step

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::{AuthConfig, OAuthConfig};
pub use error::{AuthError, AuthResult};
pub use infra::http_transport::ReqwestTransport;
pub use infra::memory::MemoryAuthStore;
pub use infra::postgres::PgAuthRepository;
pub use presentation::handlers::AuthAppState;
pub use presentation::router::{api_router, auth_router};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
