//! Value Object Module

pub mod context_id;
pub mod login_phase;
pub mod permission;
pub mod role;
pub mod user_status;

pub use kernel::id::{ApiKeyId, SessionId, UserId};
