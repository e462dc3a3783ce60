//! Identity & Permission Resolver
//!
//! [`IdentityResolver`] lives for one request and resolves the session
//! credential at most once. [`Identity`] is the resolved snapshot handed to
//! handlers; [`Guard`] expresses what a handler requires of it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::secret::Secret;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::application::session_manager::{SessionManager, ValidatedSession};
use crate::domain::entity::api_key::ApiKey;
use crate::domain::entity::user::User;
use crate::domain::repository::{AuditRepository, SessionRepository, UserRepository};
use crate::domain::value_object::{
    ApiKeyId, SessionId, UserId,
    permission::{Permission, PermissionSet},
    role::Role,
};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Session,
    ApiKey,
}

/// An authenticated principal
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
    /// Effective permissions; for API keys, narrowed by the key
    pub permissions: PermissionSet,
    pub method: AuthMethod,
    pub session_id: Option<SessionId>,
    pub session_expires_at: Option<DateTime<Utc>>,
    pub api_key_id: Option<ApiKeyId>,
}

impl Identity {
    pub fn from_session(validated: &ValidatedSession) -> Self {
        Self {
            permissions: validated.user.permissions(),
            user: validated.user.clone(),
            method: AuthMethod::Session,
            session_id: Some(validated.session.session_id),
            session_expires_at: Some(validated.session.expires_at),
            api_key_id: None,
        }
    }

    /// A key can only narrow what the owner's role grants.
    pub fn from_api_key(user: User, key: &ApiKey) -> Self {
        Self {
            permissions: user.permissions().intersect(&key.permission_set()),
            user,
            method: AuthMethod::ApiKey,
            session_id: None,
            session_expires_at: None,
            api_key_id: Some(key.key_id),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user.user_id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.user.role.satisfies(required)
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }
}

/// What a handler requires of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Auth,
    Role(Role),
    Permission(Permission),
}

impl Guard {
    pub fn check<'a>(&self, identity: Option<&'a Identity>) -> AuthResult<&'a Identity> {
        match self {
            Guard::Auth => require_auth(identity),
            Guard::Role(role) => require_role(identity, *role),
            Guard::Permission(permission) => require_permission(identity, &permission.to_string()),
        }
    }
}

pub fn require_auth(identity: Option<&Identity>) -> AuthResult<&Identity> {
    identity.ok_or(AuthError::NotAuthenticated)
}

pub fn require_role(identity: Option<&Identity>, role: Role) -> AuthResult<&Identity> {
    let identity = require_auth(identity)?;
    if identity.has_role(role) {
        Ok(identity)
    } else {
        Err(AuthError::PermissionDenied(format!("requires role {role}")))
    }
}

pub fn require_permission<'a>(identity: Option<&'a Identity>, name: &str) -> AuthResult<&'a Identity> {
    let identity = require_auth(identity)?;
    if identity.has_permission(name) {
        Ok(identity)
    } else {
        Err(AuthError::PermissionDenied(format!("requires permission {name}")))
    }
}

/// Per-request resolver; the session lookup runs once and is cached.
pub struct IdentityResolver<R>
where
    R: SessionRepository + UserRepository + AuditRepository,
{
    sessions: Arc<SessionManager<R>>,
    raw_token: Option<Secret>,
    cache: OnceCell<Option<Identity>>,
}

impl<R> IdentityResolver<R>
where
    R: SessionRepository + UserRepository + AuditRepository,
{
    pub fn new(sessions: Arc<SessionManager<R>>, raw_token: Option<Secret>) -> Self {
        Self {
            sessions,
            raw_token,
            cache: OnceCell::new(),
        }
    }

    pub async fn current_user(&self) -> AuthResult<Option<&Identity>> {
        let resolved = self
            .cache
            .get_or_try_init(|| async {
                let Some(token) = &self.raw_token else {
                    return Ok::<_, AuthError>(None);
                };
                let validated = self.sessions.validate(token.expose()).await?;
                Ok(validated.as_ref().map(Identity::from_session))
            })
            .await?;
        Ok(resolved.as_ref())
    }

    pub async fn has_role(&self, role: Role) -> AuthResult<bool> {
        Ok(self.current_user().await?.is_some_and(|i| i.has_role(role)))
    }

    pub async fn has_permission(&self, name: &str) -> AuthResult<bool> {
        Ok(self
            .current_user()
            .await?
            .is_some_and(|i| i.has_permission(name)))
    }

    pub async fn require_auth(&self) -> AuthResult<&Identity> {
        require_auth(self.current_user().await?)
    }

    pub async fn require_role(&self, role: Role) -> AuthResult<&Identity> {
        require_role(self.current_user().await?, role)
    }

    pub async fn require_permission(&self, name: &str) -> AuthResult<&Identity> {
        require_permission(self.current_user().await?, name)
    }

    /// A token was sent but did not resolve to anyone.
    pub async fn token_rejected(&self) -> AuthResult<bool> {
        Ok(self.raw_token.is_some() && self.current_user().await?.is_none())
    }

    pub fn into_identity(self) -> Option<Identity> {
        self.cache.into_inner().flatten()
    }
}
