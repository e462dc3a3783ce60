//! Infrastructure Layer
//!
//! Database implementations and external service integrations.

pub mod http_transport;
pub mod memory;
pub mod postgres;

pub use http_transport::ReqwestTransport;
pub use memory::MemoryAuthStore;
pub use postgres::PgAuthRepository;
