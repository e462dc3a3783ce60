//! Shared Kernel
//!
//! The smallest vocabulary shared by every BluFox backend crate:
//! - The unified HTTP-facing error ([`error::app_error::AppError`]) and its kinds
//! - Typed identifiers ([`id::Id`])
//!
//! Only things that mean the same thing in every crate belong here.

pub mod error {
    pub mod app_error;
    pub mod kind;
    #[cfg(feature = "axum")]
    pub mod response;
}
pub mod id;
