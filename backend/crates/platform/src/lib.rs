//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations with no knowledge of users or sessions:
//! - Token primitives (random tokens, SHA-256, HMAC, constant-time comparison)
//! - Redacted, zeroized secrets
//! - An injectable clock
//! - Fixed-window rate limiting contract and an in-process store
//! - Cookie policy and client context extraction

pub mod client;
pub mod clock;
pub mod cookie;
pub mod crypto;
pub mod rate_limit;
pub mod secret;
