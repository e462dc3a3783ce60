//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in the infra layer.
//! Method names are unique across traits so one store can implement them all.

use chrono::{DateTime, Utc};
use platform::client::ClientContext;
use platform::rate_limit::RateLimitStore;

use crate::domain::entity::{
    api_key::ApiKey, audit_event::AuditEvent, csrf_token::CsrfToken, oauth_state::OAuthState,
    session::Session, user::User,
};
use crate::domain::provider::ProviderProfile;
use crate::domain::value_object::{
    ApiKeyId, SessionId, UserId, role::Role, user_status::UserStatus,
};
use crate::error::AuthResult;

#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    async fn find_user_by_external_id(&self, external_id: &str) -> AuthResult<Option<User>>;

    async fn update_user_role(
        &self,
        user_id: &UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> AuthResult<u64>;

    async fn update_user_status(
        &self,
        user_id: &UserId,
        status: UserStatus,
        now: DateTime<Utc>,
    ) -> AuthResult<u64>;

    /// Hard delete; sessions and API keys go with the user.
    async fn delete_user(&self, user_id: &UserId) -> AuthResult<u64>;
}

#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    async fn insert_session(&self, session: &Session) -> AuthResult<()>;

    /// Returns the row even when expired; callers decide.
    async fn find_session_by_token_hash(&self, token_hash: &str) -> AuthResult<Option<Session>>;

    /// Record activity, optionally moving the expiry.
    async fn touch_session(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
        new_expires_at: Option<DateTime<Utc>>,
    ) -> AuthResult<()>;

    async fn delete_session_by_hash(&self, token_hash: &str) -> AuthResult<u64>;

    async fn delete_sessions_for_user(&self, user_id: &UserId) -> AuthResult<u64>;

    /// Owner-scoped: `user_id` is part of the delete predicate.
    async fn revoke_session(&self, session_id: &SessionId, user_id: &UserId) -> AuthResult<u64>;

    /// Unexpired sessions, newest activity first
    async fn list_sessions(&self, user_id: &UserId, now: DateTime<Utc>) -> AuthResult<Vec<Session>>;
}

/// Everything a completed provider login writes
#[derive(Debug)]
pub struct LoginRecord {
    pub profile: ProviderProfile,
    /// Used only if no user exists for the subject yet
    pub new_user_id: UserId,
    /// `user_id` is replaced with the upserted user's id
    pub session: Session,
    /// Session cookie presented on the callback request, if any
    pub replaced_token_hash: Option<String>,
    pub client: ClientContext,
    pub now: DateTime<Utc>,
}

#[trait_variant::make(LoginRepository: Send)]
pub trait LocalLoginRepository {
    /// In one transaction: upsert the user by subject id, refuse inactive
    /// accounts, drop the replaced session, insert the new one, audit.
    ///
    /// Fails with `AccountInactive` (nothing written) for inactive users.
    async fn record_login(&self, record: LoginRecord) -> AuthResult<(User, Session)>;
}

#[trait_variant::make(ApiKeyRepository: Send)]
pub trait LocalApiKeyRepository {
    async fn insert_api_key(&self, key: &ApiKey) -> AuthResult<()>;

    async fn find_api_key_by_hash(&self, key_hash: &str) -> AuthResult<Option<ApiKey>>;

    async fn list_api_keys(&self, user_id: &UserId) -> AuthResult<Vec<ApiKey>>;

    /// Owner-scoped deactivation; 0 means not found, not yours, or already revoked.
    async fn revoke_api_key(&self, key_id: &ApiKeyId, user_id: &UserId) -> AuthResult<u64>;

    async fn record_api_key_usage(&self, key_id: &ApiKeyId, now: DateTime<Utc>) -> AuthResult<()>;

    async fn deactivate_api_keys_for_user(&self, user_id: &UserId) -> AuthResult<u64>;
}

#[trait_variant::make(CsrfRepository: Send)]
pub trait LocalCsrfRepository {
    /// Store `candidate` unless a token issued at or after `stale_before`
    /// already exists for the context; returns whichever token is current.
    async fn issue_csrf_token(
        &self,
        candidate: &CsrfToken,
        stale_before: DateTime<Utc>,
    ) -> AuthResult<CsrfToken>;

    async fn find_csrf_token(&self, context_key: &str) -> AuthResult<Option<CsrfToken>>;

    async fn delete_csrf_token(&self, context_key: &str) -> AuthResult<u64>;
}

#[trait_variant::make(OAuthStateRepository: Send)]
pub trait LocalOAuthStateRepository {
    /// Replaces any pending state of the same context.
    async fn put_oauth_state(&self, state: &OAuthState) -> AuthResult<()>;

    /// Atomically remove and return the pending state.
    async fn take_oauth_state(&self, context_key: &str) -> AuthResult<Option<OAuthState>>;
}

#[trait_variant::make(AuditRepository: Send)]
pub trait LocalAuditRepository {
    async fn append_audit(&self, event: &AuditEvent) -> AuthResult<()>;
}

#[trait_variant::make(MaintenanceRepository: Send)]
pub trait LocalMaintenanceRepository {
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64>;

    async fn purge_expired_api_keys(&self, now: DateTime<Utc>) -> AuthResult<u64>;

    async fn purge_stale_csrf_tokens(&self, stale_before: DateTime<Utc>) -> AuthResult<u64>;

    async fn purge_expired_oauth_states(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// Every persistence concern of the auth core behind one handle.
pub trait AuthStore:
    UserRepository
    + SessionRepository
    + LoginRepository
    + ApiKeyRepository
    + CsrfRepository
    + OAuthStateRepository
    + AuditRepository
    + MaintenanceRepository
    + RateLimitStore
    + Clone
    + Send
    + Sync
    + 'static
{
}

impl<T> AuthStore for T where
    T: UserRepository
        + SessionRepository
        + LoginRepository
        + ApiKeyRepository
        + CsrfRepository
        + OAuthStateRepository
        + AuditRepository
        + MaintenanceRepository
        + RateLimitStore
        + Clone
        + Send
        + Sync
        + 'static
{
}
