//! In-memory storage implementation
//!
//! Single-process store behind one async mutex, so every operation is atomic
//! with respect to the others. Used by tests and local runs without Postgres.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::rate_limit::{
    MemoryRateLimitStore, RateLimitConfig, RateLimitError, RateLimitKey, RateLimitResult,
    RateLimitStore,
};
use serde_json::json;
use tokio::sync::Mutex;

use crate::domain::entity::{
    api_key::ApiKey,
    audit_event::{AuditAction, AuditEvent},
    csrf_token::CsrfToken,
    oauth_state::OAuthState,
    session::Session,
    user::User,
};
use crate::domain::repository::{
    ApiKeyRepository, AuditRepository, CsrfRepository, LoginRecord, LoginRepository,
    MaintenanceRepository, OAuthStateRepository, SessionRepository, UserRepository,
};
use crate::domain::value_object::{ApiKeyId, SessionId, UserId, role::Role, user_status::UserStatus};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    /// Keyed by token hash
    sessions: HashMap<String, Session>,
    api_keys: HashMap<ApiKeyId, ApiKey>,
    csrf_tokens: HashMap<String, CsrfToken>,
    oauth_states: HashMap<String, OAuthState>,
    audit: Vec<AuditEvent>,
}

/// In-memory auth store
#[derive(Debug, Clone, Default)]
pub struct MemoryAuthStore {
    state: Arc<Mutex<State>>,
    rate_limits: MemoryRateLimitStore,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user directly.
    pub async fn seed_user(&self, user: User) {
        self.state.lock().await.users.insert(user.user_id, user);
    }

    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.state.lock().await.audit.clone()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }

    pub async fn api_key(&self, key_id: &ApiKeyId) -> Option<ApiKey> {
        self.state.lock().await.api_keys.get(key_id).cloned()
    }

    pub async fn oauth_state(&self, context_key: &str) -> Option<OAuthState> {
        self.state.lock().await.oauth_states.get(context_key).cloned()
    }
}

impl UserRepository for MemoryAuthStore {
    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> AuthResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn update_user_role(
        &self,
        user_id: &UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        Ok(match state.users.get_mut(user_id) {
            Some(user) => {
                user.role = role;
                user.updated_at = now;
                1
            }
            None => 0,
        })
    }

    async fn update_user_status(
        &self,
        user_id: &UserId,
        status: UserStatus,
        now: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        Ok(match state.users.get_mut(user_id) {
            Some(user) => {
                user.status = status;
                user.updated_at = now;
                1
            }
            None => 0,
        })
    }

    async fn delete_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        if state.users.remove(user_id).is_none() {
            return Ok(0);
        }
        state.sessions.retain(|_, s| s.user_id != *user_id);
        state.api_keys.retain(|_, k| k.user_id != *user_id);
        Ok(1)
    }
}

impl SessionRepository for MemoryAuthStore {
    async fn insert_session(&self, session: &Session) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        if state.sessions.contains_key(&session.token_hash) {
            return Err(AuthError::Internal("duplicate session token".into()));
        }
        state
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn find_session_by_token_hash(&self, token_hash: &str) -> AuthResult<Option<Session>> {
        Ok(self.state.lock().await.sessions.get(token_hash).cloned())
    }

    async fn touch_session(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
        new_expires_at: Option<DateTime<Utc>>,
    ) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        if let Some(session) = state
            .sessions
            .values_mut()
            .find(|s| s.session_id == *session_id)
        {
            session.last_activity_at = now;
            if let Some(expires_at) = new_expires_at {
                session.expires_at = expires_at;
            }
        }
        Ok(())
    }

    async fn delete_session_by_hash(&self, token_hash: &str) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        Ok(u64::from(state.sessions.remove(token_hash).is_some()))
    }

    async fn delete_sessions_for_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.user_id != *user_id);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn revoke_session(&self, session_id: &SessionId, user_id: &UserId) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state
            .sessions
            .retain(|_, s| !(s.session_id == *session_id && s.user_id == *user_id));
        Ok((before - state.sessions.len()) as u64)
    }

    async fn list_sessions(&self, user_id: &UserId, now: DateTime<Utc>) -> AuthResult<Vec<Session>> {
        let state = self.state.lock().await;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| s.user_id == *user_id && !s.is_expired(now))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(sessions)
    }
}

impl LoginRepository for MemoryAuthStore {
    async fn record_login(&self, record: LoginRecord) -> AuthResult<(User, Session)> {
        let LoginRecord {
            profile,
            new_user_id,
            mut session,
            replaced_token_hash,
            client,
            now,
        } = record;

        let mut state = self.state.lock().await;

        let existing = state
            .users
            .values()
            .find(|u| u.external_id == profile.subject)
            .cloned();

        let (user, new_user) = match existing {
            Some(mut user) => {
                if !user.is_active() {
                    return Err(AuthError::AccountInactive);
                }
                user.apply_profile(&profile, now);
                (user, false)
            }
            None => (User::from_profile(new_user_id, &profile, now), true),
        };
        state.users.insert(user.user_id, user.clone());

        if let Some(token_hash) = &replaced_token_hash {
            state.sessions.remove(token_hash);
        }

        session.user_id = user.user_id;
        state
            .sessions
            .insert(session.token_hash.clone(), session.clone());

        state.audit.push(
            AuditEvent::new(AuditAction::Login, Some(user.user_id), now)
                .from_client(&client)
                .with_details(json!({
                    "session_id": session.session_id,
                    "remember_me": session.remember_me,
                    "new_user": new_user,
                })),
        );

        Ok((user, session))
    }
}

impl ApiKeyRepository for MemoryAuthStore {
    async fn insert_api_key(&self, key: &ApiKey) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        state.api_keys.insert(key.key_id, key.clone());
        Ok(())
    }

    async fn find_api_key_by_hash(&self, key_hash: &str) -> AuthResult<Option<ApiKey>> {
        let state = self.state.lock().await;
        Ok(state
            .api_keys
            .values()
            .find(|k| k.key_hash == key_hash)
            .cloned())
    }

    async fn list_api_keys(&self, user_id: &UserId) -> AuthResult<Vec<ApiKey>> {
        let state = self.state.lock().await;
        let mut keys: Vec<ApiKey> = state
            .api_keys
            .values()
            .filter(|k| k.user_id == *user_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn revoke_api_key(&self, key_id: &ApiKeyId, user_id: &UserId) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        Ok(match state.api_keys.get_mut(key_id) {
            Some(key) if key.user_id == *user_id && key.is_active => {
                key.is_active = false;
                1
            }
            _ => 0,
        })
    }

    async fn record_api_key_usage(&self, key_id: &ApiKeyId, now: DateTime<Utc>) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        if let Some(key) = state.api_keys.get_mut(key_id) {
            key.usage_count += 1;
            key.last_used_at = Some(now);
        }
        Ok(())
    }

    async fn deactivate_api_keys_for_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let mut updated = 0;
        for key in state.api_keys.values_mut() {
            if key.user_id == *user_id && key.is_active {
                key.is_active = false;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

impl CsrfRepository for MemoryAuthStore {
    async fn issue_csrf_token(
        &self,
        candidate: &CsrfToken,
        stale_before: DateTime<Utc>,
    ) -> AuthResult<CsrfToken> {
        let mut state = self.state.lock().await;
        let current = state
            .csrf_tokens
            .entry(candidate.context_key.clone())
            .and_modify(|existing| {
                if existing.issued_at < stale_before {
                    *existing = candidate.clone();
                }
            })
            .or_insert_with(|| candidate.clone());
        Ok(current.clone())
    }

    async fn find_csrf_token(&self, context_key: &str) -> AuthResult<Option<CsrfToken>> {
        Ok(self.state.lock().await.csrf_tokens.get(context_key).cloned())
    }

    async fn delete_csrf_token(&self, context_key: &str) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        Ok(u64::from(state.csrf_tokens.remove(context_key).is_some()))
    }
}

impl OAuthStateRepository for MemoryAuthStore {
    async fn put_oauth_state(&self, oauth_state: &OAuthState) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        state
            .oauth_states
            .insert(oauth_state.context_key.clone(), oauth_state.clone());
        Ok(())
    }

    async fn take_oauth_state(&self, context_key: &str) -> AuthResult<Option<OAuthState>> {
        Ok(self.state.lock().await.oauth_states.remove(context_key))
    }
}

impl AuditRepository for MemoryAuthStore {
    async fn append_audit(&self, event: &AuditEvent) -> AuthResult<()> {
        self.state.lock().await.audit.push(event.clone());
        Ok(())
    }
}

impl MaintenanceRepository for MemoryAuthStore {
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - state.sessions.len()) as u64)
    }

    async fn purge_expired_api_keys(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let mut updated = 0;
        for key in state.api_keys.values_mut() {
            if key.is_active && key.is_expired(now) {
                key.is_active = false;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn purge_stale_csrf_tokens(&self, stale_before: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.csrf_tokens.len();
        state.csrf_tokens.retain(|_, t| t.issued_at >= stale_before);
        Ok((before - state.csrf_tokens.len()) as u64)
    }

    async fn purge_expired_oauth_states(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.oauth_states.len();
        state.oauth_states.retain(|_, s| !s.is_expired(now));
        Ok((before - state.oauth_states.len()) as u64)
    }
}

impl RateLimitStore for MemoryAuthStore {
    async fn check_and_increment(
        &self,
        key: &RateLimitKey,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        self.rate_limits.check_and_increment(key, config, now_ms).await
    }

    async fn peek(
        &self,
        key: &RateLimitKey,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        self.rate_limits.peek(key, config, now_ms).await
    }

    async fn purge_stale(&self, older_than_ms: i64) -> Result<u64, RateLimitError> {
        self.rate_limits.purge_stale(older_than_ms).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider::ProviderProfile;
    use chrono::Duration;
    use platform::client::ClientContext;

    fn profile(subject: &str, name: &str) -> ProviderProfile {
        ProviderProfile {
            subject: subject.to_string(),
            username: name.to_string(),
            display_name: name.to_string(),
            avatar_url: None,
        }
    }

    fn session(token_hash: &str, now: DateTime<Utc>) -> Session {
        Session {
            session_id: SessionId::new(),
            user_id: UserId::new(),
            token_hash: token_hash.to_string(),
            remember_me: false,
            ip_address: None,
            user_agent: None,
            created_at: now,
            last_activity_at: now,
            expires_at: now + Duration::days(1),
        }
    }

    fn login(subject: &str, name: &str, token_hash: &str, now: DateTime<Utc>) -> LoginRecord {
        LoginRecord {
            profile: profile(subject, name),
            new_user_id: UserId::new(),
            session: session(token_hash, now),
            replaced_token_hash: None,
            client: ClientContext::default(),
            now,
        }
    }

    #[tokio::test]
    async fn test_record_login_upserts_by_subject() {
        let store = MemoryAuthStore::new();
        let now = Utc::now();

        let (first, s1) = LoginRepository::record_login(&store, login("42", "old", "h1", now))
            .await
            .unwrap();
        let (second, s2) = LoginRepository::record_login(&store, login("42", "new", "h2", now))
            .await
            .unwrap();

        assert_eq!(first.user_id, second.user_id);
        assert_eq!(second.username, "new");
        assert_eq!(s1.user_id, first.user_id);
        assert_eq!(s2.user_id, first.user_id);
        assert_eq!(store.user_count().await, 1);
        assert_eq!(store.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_record_login_refuses_inactive_user_without_writes() {
        let store = MemoryAuthStore::new();
        let now = Utc::now();
        let (user, _) = LoginRepository::record_login(&store, login("7", "x", "h1", now))
            .await
            .unwrap();
        UserRepository::update_user_status(&store, &user.user_id, UserStatus::Inactive, now)
            .await
            .unwrap();

        let result = LoginRepository::record_login(&store, login("7", "x", "h2", now)).await;
        assert!(matches!(result, Err(AuthError::AccountInactive)));
        assert_eq!(store.session_count().await, 1);
        assert_eq!(store.audit_events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_csrf_issue_keeps_fresh_token() {
        let store = MemoryAuthStore::new();
        let now = Utc::now();
        let first = CsrfToken {
            context_key: "ctx".into(),
            token: "a".into(),
            issued_at: now,
        };
        let second = CsrfToken {
            token: "b".into(),
            ..first.clone()
        };

        let issued = CsrfRepository::issue_csrf_token(&store, &first, now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(issued.token, "a");

        let again = CsrfRepository::issue_csrf_token(&store, &second, now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(again.token, "a");

        let replaced =
            CsrfRepository::issue_csrf_token(&store, &second, now + Duration::seconds(1))
                .await
                .unwrap();
        assert_eq!(replaced.token, "b");
    }

    #[tokio::test]
    async fn test_take_oauth_state_is_single_use() {
        let store = MemoryAuthStore::new();
        let now = Utc::now();
        let pending = OAuthState {
            context_key: "ctx".into(),
            state: "s".into(),
            nonce: "n".into(),
            redirect_to: "/".into(),
            remember_me: false,
            created_at: now,
            expires_at: now + Duration::minutes(10),
        };
        OAuthStateRepository::put_oauth_state(&store, &pending)
            .await
            .unwrap();

        let taken = OAuthStateRepository::take_oauth_state(&store, "ctx")
            .await
            .unwrap();
        assert_eq!(taken, Some(pending));
        assert!(
            OAuthStateRepository::take_oauth_state(&store, "ctx")
                .await
                .unwrap()
                .is_none()
        );
    }
}
