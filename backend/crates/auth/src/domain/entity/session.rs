//! Session Entity
//!
//! One row per signed-in browser. The raw token lives only in the client
//! cookie; rows are found by its hash.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{SessionId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: UserId,
    /// Hex SHA-256 of the raw token
    pub token_hash: String,
    pub remember_me: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Valid up to and including `expires_at`.
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Remember-me sessions slide forward once less than half of `long_ttl` is left.
    pub fn needs_extension(&self, now: DateTime<Utc>, long_ttl: Duration) -> bool {
        self.remember_me && self.expires_at - now < long_ttl / 2
    }
}

/// What the owner sees when listing their sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub remember_me: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// The session making the request
    pub current: bool,
}

impl SessionInfo {
    pub fn from_session(session: &Session, current_hash: Option<&str>) -> Self {
        Self {
            session_id: session.session_id,
            remember_me: session.remember_me,
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
            created_at: session.created_at,
            last_activity_at: session.last_activity_at,
            expires_at: session.expires_at,
            current: current_hash.is_some_and(|h| h == session.token_hash),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(remember_me: bool, expires_at: DateTime<Utc>) -> Session {
        let now = expires_at - Duration::days(1);
        Session {
            session_id: SessionId::new(),
            user_id: UserId::new(),
            token_hash: "h".into(),
            remember_me,
            ip_address: None,
            user_agent: None,
            created_at: now,
            last_activity_at: now,
            expires_at,
        }
    }

    #[test]
    fn test_expiry_is_inclusive() {
        let expires = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let s = session(false, expires);
        assert!(!s.is_expired(expires - Duration::seconds(1)));
        assert!(!s.is_expired(expires));
        assert!(s.is_expired(expires + Duration::seconds(1)));
    }

    #[test]
    fn test_needs_extension() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let long = Duration::days(30);

        assert!(session(true, now + Duration::days(10)).needs_extension(now, long));
        assert!(!session(true, now + Duration::days(20)).needs_extension(now, long));
        assert!(!session(false, now + Duration::hours(1)).needs_extension(now, long));
    }
}
