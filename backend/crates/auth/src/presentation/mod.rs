//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::AuthAppState;
pub use middleware::{CurrentIdentity, Surface, api_auth, enforce, resolve_identity};
pub use router::{api_router, auth_router};
