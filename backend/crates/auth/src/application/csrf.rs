//! CSRF Guard
//!
//! One token per browser context, reused until it expires. Verification
//! failure rejects the request; it never touches the session.

use std::sync::Arc;

use platform::clock::Clock;
use platform::crypto::{constant_time_eq, random_token_urlsafe};

use crate::application::config::AuthConfig;
use crate::domain::entity::csrf_token::CsrfToken;
use crate::domain::repository::CsrfRepository;
use crate::domain::value_object::context_id::ContextId;
use crate::error::AuthResult;

pub struct CsrfGuard<R: CsrfRepository> {
    repo: Arc<R>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<R: CsrfRepository> CsrfGuard<R> {
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            config,
            clock,
        }
    }

    /// Current token for the context, minting a new one if none is valid.
    pub async fn issue(&self, context: &ContextId) -> AuthResult<String> {
        let now = self.clock.now();
        let candidate = CsrfToken {
            context_key: context.storage_key(),
            token: random_token_urlsafe(32),
            issued_at: now,
        };
        let current = self
            .repo
            .issue_csrf_token(&candidate, now - self.config.csrf_ttl())
            .await?;
        Ok(current.token)
    }

    /// False when nothing was issued, the token expired (it is then cleared)
    /// or the candidate differs.
    pub async fn verify(&self, context: &ContextId, candidate: &str) -> AuthResult<bool> {
        let key = context.storage_key();
        let Some(stored) = self.repo.find_csrf_token(&key).await? else {
            return Ok(false);
        };

        if stored.is_expired(self.clock.now(), self.config.csrf_ttl()) {
            self.repo.delete_csrf_token(&key).await?;
            return Ok(false);
        }

        Ok(constant_time_eq(stored.token.as_bytes(), candidate.as_bytes()))
    }

    /// Drop the context's token, e.g. when the signed-in user changes.
    pub async fn clear(&self, context: &ContextId) -> AuthResult<()> {
        self.repo.delete_csrf_token(&context.storage_key()).await?;
        Ok(())
    }
}
