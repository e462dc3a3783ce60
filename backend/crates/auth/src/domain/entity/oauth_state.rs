use chrono::{DateTime, Utc};

/// Pending authorization request, one per browser context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    pub context_key: String,
    pub state: String,
    pub nonce: String,
    /// Same-site path to land on after login
    pub redirect_to: String,
    pub remember_me: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OAuthState {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
