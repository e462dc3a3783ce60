//! Domain Layer
//!
//! Contains entities, value objects, the provider contract and repository traits.

pub mod entity;
pub mod provider;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{api_key::ApiKey, session::Session, user::User};
pub use repository::{
    ApiKeyRepository, AuditRepository, AuthStore, CsrfRepository, LoginRepository,
    MaintenanceRepository, OAuthStateRepository, SessionRepository, UserRepository,
};
