//! Session Manager
//!
//! Issues, validates and revokes browser sessions. Multiple concurrent
//! sessions per user are allowed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use platform::client::ClientContext;
use platform::clock::Clock;
use platform::crypto::{hash_token, random_token_hex};
use platform::secret::Secret;
use serde_json::json;

use crate::application::audit::AuditLog;
use crate::application::config::AuthConfig;
use crate::domain::entity::audit_event::{AuditAction, AuditEvent};
use crate::domain::entity::session::{Session, SessionInfo};
use crate::domain::entity::user::User;
use crate::domain::repository::{AuditRepository, SessionRepository, UserRepository};
use crate::domain::value_object::{SessionId, UserId};
use crate::error::AuthResult;

/// A new session and the raw token for the cookie
#[derive(Debug)]
pub struct IssuedSession {
    pub session: Session,
    pub raw_token: Secret,
}

/// A session that passed validation, with its owner
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub user: User,
    pub session: Session,
}

#[derive(Debug, Clone, Copy)]
pub enum LogoutTarget<'a> {
    /// The session behind one raw token
    Token(&'a str),
    /// Every session of a user
    User(&'a UserId),
}

/// Build a session record and its raw token without persisting anything.
pub fn mint_session(
    user_id: UserId,
    remember_me: bool,
    client: &ClientContext,
    now: DateTime<Utc>,
    ttl: Duration,
) -> IssuedSession {
    let raw_token = Secret::new(random_token_hex(32));
    let session = Session {
        session_id: SessionId::new(),
        user_id,
        token_hash: hash_token(raw_token.expose()),
        remember_me,
        ip_address: client.ip_string(),
        user_agent: client.user_agent.clone(),
        created_at: now,
        last_activity_at: now,
        expires_at: now + ttl,
    };
    IssuedSession { session, raw_token }
}

pub struct SessionManager<R>
where
    R: SessionRepository + UserRepository + AuditRepository,
{
    repo: Arc<R>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
    audit: AuditLog<R>,
}

impl<R> SessionManager<R>
where
    R: SessionRepository + UserRepository + AuditRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            audit: AuditLog::new(repo.clone()),
            repo,
            config,
            clock,
        }
    }

    pub async fn create_session(
        &self,
        user_id: UserId,
        remember_me: bool,
        client: &ClientContext,
    ) -> AuthResult<IssuedSession> {
        let now = self.clock.now();
        let issued = mint_session(
            user_id,
            remember_me,
            client,
            now,
            self.config.session_ttl(remember_me),
        );
        self.repo.insert_session(&issued.session).await?;

        tracing::info!(
            user_id = %user_id,
            session_id = %issued.session.session_id,
            remember_me,
            "Session created"
        );

        Ok(issued)
    }

    /// `None` means unauthenticated: unknown token, expired session or
    /// inactive owner. Expired rows are deleted on sight.
    pub async fn validate(&self, raw_token: &str) -> AuthResult<Option<ValidatedSession>> {
        if raw_token.is_empty() {
            return Ok(None);
        }

        let token_hash = hash_token(raw_token);
        let Some(mut session) = self.repo.find_session_by_token_hash(&token_hash).await? else {
            return Ok(None);
        };

        let now = self.clock.now();
        if session.is_expired(now) {
            self.repo.delete_session_by_hash(&token_hash).await?;
            tracing::debug!(session_id = %session.session_id, "Expired session removed");
            return Ok(None);
        }

        let Some(user) = self.repo.find_user_by_id(&session.user_id).await? else {
            return Ok(None);
        };
        if !user.is_active() {
            tracing::debug!(user_id = %user.user_id, "Session of inactive user rejected");
            return Ok(None);
        }

        let long_ttl = self.config.session_ttl_long();
        let new_expires_at = session
            .needs_extension(now, long_ttl)
            .then(|| now + long_ttl);

        match self
            .repo
            .touch_session(&session.session_id, now, new_expires_at)
            .await
        {
            Ok(()) => {
                session.last_activity_at = now;
                if let Some(expires_at) = new_expires_at {
                    session.expires_at = expires_at;
                }
            }
            Err(e) => {
                tracing::warn!(session_id = %session.session_id, error = %e, "Failed to touch session");
            }
        }

        Ok(Some(ValidatedSession { user, session }))
    }

    /// Idempotent; returns the number of sessions removed.
    pub async fn logout(&self, target: LogoutTarget<'_>, client: &ClientContext) -> AuthResult<u64> {
        let (user_id, removed) = match target {
            LogoutTarget::Token(raw_token) => {
                let token_hash = hash_token(raw_token);
                let owner = self
                    .repo
                    .find_session_by_token_hash(&token_hash)
                    .await?
                    .map(|s| s.user_id);
                (owner, self.repo.delete_session_by_hash(&token_hash).await?)
            }
            LogoutTarget::User(user_id) => (
                Some(*user_id),
                self.repo.delete_sessions_for_user(user_id).await?,
            ),
        };

        if removed > 0 {
            tracing::info!(user_id = ?user_id, sessions_removed = removed, "Logged out");
            self.audit
                .record(
                    AuditEvent::new(AuditAction::Logout, user_id, self.clock.now())
                        .from_client(client)
                        .with_details(json!({ "sessions_removed": removed })),
                )
                .await;
        }

        Ok(removed)
    }

    /// Unexpired sessions of the user; `current_token` marks the caller's own.
    pub async fn list_sessions(
        &self,
        user_id: &UserId,
        current_token: Option<&str>,
    ) -> AuthResult<Vec<SessionInfo>> {
        let current_hash = current_token.map(hash_token);
        let sessions = self.repo.list_sessions(user_id, self.clock.now()).await?;
        Ok(sessions
            .iter()
            .map(|s| SessionInfo::from_session(s, current_hash.as_deref()))
            .collect())
    }

    /// Zero when the session does not exist or belongs to someone else.
    pub async fn revoke_session(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
        client: &ClientContext,
    ) -> AuthResult<u64> {
        let removed = self.repo.revoke_session(session_id, user_id).await?;
        if removed > 0 {
            tracing::info!(user_id = %user_id, session_id = %session_id, "Session revoked");
            self.audit
                .record(
                    AuditEvent::new(AuditAction::SessionRevoked, Some(*user_id), self.clock.now())
                        .from_client(client)
                        .with_details(json!({ "session_id": session_id })),
                )
                .await;
        }
        Ok(removed)
    }
}
