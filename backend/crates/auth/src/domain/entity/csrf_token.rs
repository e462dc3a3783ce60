use chrono::{DateTime, Duration, Utc};

/// Anti-forgery token bound to a browser context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    pub context_key: String,
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl CsrfToken {
    /// Expired once strictly more than `ttl` has passed since issuance.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.issued_at > ttl
    }
}
