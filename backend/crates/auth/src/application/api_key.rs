//! API Key Authenticator
//!
//! Programmatic credentials with their own per-key rate limit, separate from
//! the anonymous per-IP limit.

use std::sync::Arc;

use chrono::Duration;
use platform::client::ClientContext;
use platform::clock::Clock;
use platform::crypto::{hash_token, random_token_hex};
use platform::rate_limit::{RateLimitKey, RateLimitResult, RateLimitStore, RateLimiter};
use platform::secret::Secret;
use serde_json::json;

use crate::application::audit::AuditLog;
use crate::application::config::AuthConfig;
use crate::application::identity::Identity;
use crate::domain::entity::api_key::{API_KEY_PREFIX, ApiKey, ApiKeyCreated, DISPLAY_PREFIX_LEN};
use crate::domain::entity::audit_event::{AuditAction, AuditEvent};
use crate::domain::repository::{ApiKeyRepository, AuditRepository, UserRepository};
use crate::domain::value_object::permission::{Permission, WILDCARD};
use crate::domain::value_object::{ApiKeyId, UserId};
use crate::error::{AuthError, AuthResult};

const MAX_NAME_LEN: usize = 100;
const MAX_EXPIRY_DAYS: u32 = 365;

/// Parameters of a new key
#[derive(Debug, Clone, Default)]
pub struct NewApiKey {
    pub name: String,
    /// Empty means "whatever the owner's role grants"
    pub permissions: Vec<String>,
    pub expires_in_days: Option<u32>,
}

pub struct ApiKeyAuthenticator<R>
where
    R: ApiKeyRepository + UserRepository + AuditRepository + RateLimitStore,
{
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    limiter: RateLimiter<R>,
    audit: AuditLog<R>,
}

impl<R> ApiKeyAuthenticator<R>
where
    R: ApiKeyRepository + UserRepository + AuditRepository + RateLimitStore,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            limiter: RateLimiter::with_clock(
                repo.clone(),
                config.api_key_rate_limit.clone(),
                clock.clone(),
            ),
            audit: AuditLog::new(repo.clone()),
            repo,
            clock,
        }
    }

    /// The raw key is in the result and nowhere else, ever.
    pub async fn create(
        &self,
        owner: &UserId,
        request: NewApiKey,
        client: &ClientContext,
    ) -> AuthResult<ApiKeyCreated> {
        let name = request.name.trim().to_string();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(AuthError::BadRequest(format!(
                "key name must be 1 to {MAX_NAME_LEN} characters"
            )));
        }
        if request
            .expires_in_days
            .is_some_and(|d| d == 0 || d > MAX_EXPIRY_DAYS)
        {
            return Err(AuthError::BadRequest(format!(
                "expiry must be 1 to {MAX_EXPIRY_DAYS} days"
            )));
        }

        let user = self
            .repo
            .find_user_by_id(owner)
            .await?
            .ok_or(AuthError::NotAuthenticated)?;
        if !user.is_active() {
            return Err(AuthError::AccountInactive);
        }

        let permissions = if request.permissions.is_empty() {
            vec![WILDCARD.to_string()]
        } else {
            let granted = user.permissions();
            let mut names = Vec::with_capacity(request.permissions.len());
            for name in request.permissions {
                let name = name.trim().to_string();
                if name != WILDCARD && Permission::parse(&name).is_none() {
                    return Err(AuthError::BadRequest(format!("unknown permission {name}")));
                }
                if name != WILDCARD && !granted.contains(&name) {
                    return Err(AuthError::PermissionDenied(format!(
                        "cannot delegate {name}"
                    )));
                }
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            names
        };

        let now = self.clock.now();
        let raw_key = Secret::new(format!("{API_KEY_PREFIX}{}", random_token_hex(32)));
        let key = ApiKey {
            key_id: ApiKeyId::new(),
            user_id: *owner,
            name,
            key_prefix: raw_key.expose().chars().take(DISPLAY_PREFIX_LEN).collect(),
            key_hash: hash_token(raw_key.expose()),
            permissions,
            is_active: true,
            expires_at: request
                .expires_in_days
                .map(|d| now + Duration::days(i64::from(d))),
            usage_count: 0,
            last_used_at: None,
            created_at: now,
        };
        self.repo.insert_api_key(&key).await?;

        tracing::info!(user_id = %owner, key_id = %key.key_id, prefix = %key.key_prefix, "API key created");
        self.audit
            .record(
                AuditEvent::new(AuditAction::ApiKeyCreated, Some(*owner), now)
                    .from_client(client)
                    .with_details(json!({ "key_id": key.key_id, "name": key.name })),
            )
            .await;

        Ok(ApiKeyCreated { key, raw_key })
    }

    /// Active, unexpired key for the raw value; `None` otherwise.
    pub async fn validate(&self, raw_key: &str) -> AuthResult<Option<ApiKey>> {
        if raw_key.is_empty() {
            return Ok(None);
        }
        let key = self.repo.find_api_key_by_hash(&hash_token(raw_key)).await?;
        Ok(key.filter(|k| k.is_usable(self.clock.now())))
    }

    /// Validate and resolve the owner. Does not consume rate limit.
    pub async fn authenticate(&self, raw_key: &str) -> AuthResult<Option<Identity>> {
        let Some(key) = self.validate(raw_key).await? else {
            return Ok(None);
        };
        let Some(user) = self.repo.find_user_by_id(&key.user_id).await? else {
            return Ok(None);
        };
        if !user.is_active() {
            return Ok(None);
        }
        Ok(Some(Identity::from_api_key(user, &key)))
    }

    pub async fn check_rate_limit(&self, key_id: &ApiKeyId) -> AuthResult<RateLimitResult> {
        Ok(self
            .limiter
            .attempt(&RateLimitKey::new(key_id.to_string(), "api_key"))
            .await?)
    }

    /// Observability only; failures are logged.
    pub async fn record_usage(&self, key_id: &ApiKeyId) {
        if let Err(e) = self.repo.record_api_key_usage(key_id, self.clock.now()).await {
            tracing::warn!(key_id = %key_id, error = %e, "Failed to record API key usage");
        }
    }

    /// Zero means "not found or not yours"; callers answer 404 either way.
    pub async fn revoke(
        &self,
        key_id: &ApiKeyId,
        owner: &UserId,
        client: &ClientContext,
    ) -> AuthResult<u64> {
        let affected = self.repo.revoke_api_key(key_id, owner).await?;
        if affected > 0 {
            tracing::info!(user_id = %owner, key_id = %key_id, "API key revoked");
            self.audit
                .record(
                    AuditEvent::new(AuditAction::ApiKeyRevoked, Some(*owner), self.clock.now())
                        .from_client(client)
                        .with_details(json!({ "key_id": key_id })),
                )
                .await;
        }
        Ok(affected)
    }

    pub async fn list(&self, owner: &UserId) -> AuthResult<Vec<ApiKey>> {
        self.repo.list_api_keys(owner).await
    }
}
