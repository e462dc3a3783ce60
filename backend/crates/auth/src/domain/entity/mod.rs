//! Entity Module

pub mod api_key;
pub mod audit_event;
pub mod csrf_token;
pub mod oauth_state;
pub mod session;
pub mod user;
