//! OAuth Login Use Case
//!
//! Authorization-code login against the identity provider:
//! build the authorize URL, consume the pending state on callback, exchange
//! the code, fetch the profile, then upsert the user and open a session in
//! one transaction.
//!
//! The pending state is deleted before it is compared, so every callback
//! consumes it whether or not it matches.

use std::sync::Arc;

use platform::client::ClientContext;
use platform::clock::Clock;
use platform::crypto::{constant_time_eq, hash_token, random_token_urlsafe};
use platform::secret::Secret;
use url::Url;

use crate::application::config::{AuthConfig, OAuthConfig};
use crate::application::session_manager::mint_session;
use crate::domain::entity::oauth_state::OAuthState;
use crate::domain::entity::session::Session;
use crate::domain::entity::user::User;
use crate::domain::provider::{OAuthTransport, ProviderProfile, TokenResponse};
use crate::domain::repository::{LoginRecord, LoginRepository, OAuthStateRepository};
use crate::domain::value_object::UserId;
use crate::domain::value_object::context_id::ContextId;
use crate::domain::value_object::login_phase::LoginPhase;
use crate::error::{AuthError, AuthResult};

const MAX_PROVIDER_TEXT: usize = 200;

/// Query parameters of the provider redirect
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Matched state plus the provider's tokens
#[derive(Debug)]
pub struct CallbackOutcome {
    pub tokens: TokenResponse,
    pub pending: OAuthState,
}

#[derive(Debug)]
pub struct LoginSuccess {
    pub user: User,
    pub session: Session,
    pub raw_token: Secret,
    pub redirect_to: String,
    pub remember_me: bool,
}

/// Tracks one login attempt through [`LoginPhase`].
#[derive(Debug, Clone, Copy)]
pub struct LoginFlow {
    phase: LoginPhase,
    failed_at: Option<LoginPhase>,
}

impl Default for LoginFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginFlow {
    pub fn new() -> Self {
        Self {
            phase: LoginPhase::Start,
            failed_at: None,
        }
    }

    pub fn phase(&self) -> LoginPhase {
        self.phase
    }

    /// Phase the attempt was in when it failed
    pub fn failed_at(&self) -> Option<LoginPhase> {
        self.failed_at
    }

    pub fn advance(&mut self, next: LoginPhase) -> AuthResult<()> {
        if !self.phase.can_advance_to(next) {
            return Err(AuthError::Internal(format!(
                "illegal login transition {} -> {}",
                self.phase, next
            )));
        }
        self.phase = next;
        Ok(())
    }

    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.failed_at = Some(self.phase);
            self.phase = LoginPhase::Failed;
        }
    }
}

/// Same-site relative path, or `fallback`.
///
/// Rejects absolute URLs, protocol-relative `//host` and backslash tricks.
pub fn safe_redirect(target: Option<&str>, fallback: &str) -> String {
    match target.map(str::trim) {
        Some(t)
            if t.starts_with('/')
                && !t.starts_with("//")
                && !t.contains('\\')
                && !t.chars().any(char::is_control) =>
        {
            t.to_string()
        }
        _ => fallback.to_string(),
    }
}

fn clip(text: &str) -> String {
    text.chars().take(MAX_PROVIDER_TEXT).collect()
}

pub struct OAuthLoginUseCase<R, T>
where
    R: OAuthStateRepository + LoginRepository,
    T: OAuthTransport,
{
    repo: Arc<R>,
    transport: Arc<T>,
    config: Arc<AuthConfig>,
    oauth: Arc<OAuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<R, T> OAuthLoginUseCase<R, T>
where
    R: OAuthStateRepository + LoginRepository,
    T: OAuthTransport,
{
    pub fn new(
        repo: Arc<R>,
        transport: Arc<T>,
        config: Arc<AuthConfig>,
        oauth: Arc<OAuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            transport,
            config,
            oauth,
            clock,
        }
    }

    /// Store a fresh state and nonce for the context and return the provider URL.
    pub async fn build_authorization_url(
        &self,
        context: &ContextId,
        redirect_to: Option<&str>,
        remember_me: bool,
    ) -> AuthResult<Url> {
        let now = self.clock.now();
        let pending = OAuthState {
            context_key: context.storage_key(),
            state: random_token_urlsafe(32),
            nonce: random_token_urlsafe(32),
            redirect_to: safe_redirect(redirect_to, &self.config.post_login_redirect),
            remember_me,
            created_at: now,
            expires_at: now + self.config.oauth_state_ttl(),
        };
        self.repo.put_oauth_state(&pending).await?;

        let mut url = self.oauth.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.oauth.client_id)
            .append_pair("redirect_uri", self.oauth.redirect_uri.as_str())
            .append_pair("scope", &self.oauth.scope_param())
            .append_pair("state", &pending.state)
            .append_pair("nonce", &pending.nonce);

        tracing::info!(remember_me, "Authorization requested");

        Ok(url)
    }

    /// Consume the pending state, compare, then exchange the code.
    pub async fn handle_callback(
        &self,
        context: &ContextId,
        code: &str,
        state: &str,
    ) -> AuthResult<CallbackOutcome> {
        let pending = self
            .repo
            .take_oauth_state(&context.storage_key())
            .await?
            .ok_or(AuthError::StateMismatch)?;

        if pending.is_expired(self.clock.now())
            || !constant_time_eq(pending.state.as_bytes(), state.as_bytes())
        {
            return Err(AuthError::StateMismatch);
        }

        let tokens = self.exchange_code(code).await?;

        // An id_token must carry our nonce; a missing claim or unreadable token fails.
        if tokens.id_token.is_some() {
            let nonce_ok = tokens
                .id_token_nonce()
                .is_some_and(|nonce| constant_time_eq(nonce.as_bytes(), pending.nonce.as_bytes()));
            if !nonce_ok {
                return Err(AuthError::StateMismatch);
            }
        }

        Ok(CallbackOutcome { tokens, pending })
    }

    async fn exchange_code(&self, code: &str) -> AuthResult<TokenResponse> {
        if code.trim().is_empty() {
            return Err(AuthError::TokenExchangeFailed("empty authorization code".into()));
        }

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.oauth.redirect_uri.as_str()),
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.expose()),
        ];

        let reply = self
            .transport
            .post_form(&self.oauth.token_url, &form)
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        if !reply.is_success() {
            return Err(AuthError::TokenExchangeFailed(format!(
                "token endpoint returned status {}",
                reply.status
            )));
        }

        TokenResponse::parse(&reply.body)
    }

    pub async fn fetch_user_info(&self, access_token: &Secret) -> AuthResult<ProviderProfile> {
        let reply = self
            .transport
            .get_bearer(&self.oauth.userinfo_url, access_token)
            .await
            .map_err(|e| AuthError::UserInfoFailed(e.to_string()))?;

        if !reply.is_success() {
            return Err(AuthError::UserInfoFailed(format!(
                "userinfo endpoint returned status {}",
                reply.status
            )));
        }

        ProviderProfile::parse(&reply.body)
    }

    /// Upsert the user and open a session in one transaction. A session
    /// token presented on the callback is superseded.
    pub async fn establish_session(
        &self,
        profile: ProviderProfile,
        remember_me: bool,
        client: &ClientContext,
        replaced_token: Option<&str>,
    ) -> AuthResult<(User, Session, Secret)> {
        let now = self.clock.now();
        let new_user_id = UserId::new();
        let issued = mint_session(
            new_user_id,
            remember_me,
            client,
            now,
            self.config.session_ttl(remember_me),
        );

        let record = LoginRecord {
            profile,
            new_user_id,
            session: issued.session,
            replaced_token_hash: replaced_token.map(hash_token),
            client: client.clone(),
            now,
        };
        let (user, session) = self.repo.record_login(record).await?;

        tracing::info!(
            user_id = %user.user_id,
            session_id = %session.session_id,
            remember_me,
            "Login completed"
        );

        Ok((user, session, issued.raw_token))
    }

    /// Run a whole callback. Errors carry the phase in the log and map to a
    /// [`crate::error::LoginErrorCode`] for the redirect.
    pub async fn complete(
        &self,
        context: Option<&ContextId>,
        params: CallbackParams,
        client: &ClientContext,
        replaced_token: Option<&str>,
    ) -> AuthResult<LoginSuccess> {
        let mut flow = LoginFlow::new();
        let result = self
            .run_callback(&mut flow, context, params, client, replaced_token)
            .await;

        if let Err(e) = &result {
            flow.fail();
            tracing::warn!(
                phase = %flow.failed_at().unwrap_or(LoginPhase::Start),
                code = %e.login_error_code(),
                "Login failed"
            );
        }

        result
    }

    async fn run_callback(
        &self,
        flow: &mut LoginFlow,
        context: Option<&ContextId>,
        params: CallbackParams,
        client: &ClientContext,
        replaced_token: Option<&str>,
    ) -> AuthResult<LoginSuccess> {
        flow.advance(LoginPhase::CallbackReceived)?;

        let Some(context) = context else {
            return Err(AuthError::StateMismatch);
        };

        if let Some(error) = params.error {
            self.repo.take_oauth_state(&context.storage_key()).await?;
            return Err(AuthError::ProviderDenied {
                error: clip(&error),
                description: params.error_description.as_deref().map(clip),
            });
        }

        let (code, state) = match (params.code, params.state) {
            (Some(code), Some(state)) => (code, state),
            (_, None) => {
                self.repo.take_oauth_state(&context.storage_key()).await?;
                return Err(AuthError::StateMismatch);
            }
            (None, Some(_)) => {
                self.repo.take_oauth_state(&context.storage_key()).await?;
                return Err(AuthError::ProviderDenied {
                    error: "missing_code".to_string(),
                    description: None,
                });
            }
        };

        let outcome = self.handle_callback(context, &code, &state).await?;
        flow.advance(LoginPhase::TokenExchanged)?;

        let profile = self.fetch_user_info(&outcome.tokens.access_token).await?;
        flow.advance(LoginPhase::UserInfoFetched)?;

        let remember_me = outcome.pending.remember_me;
        let (user, session, raw_token) = self
            .establish_session(profile, remember_me, client, replaced_token)
            .await?;
        flow.advance(LoginPhase::SessionEstablished)?;

        Ok(LoginSuccess {
            user,
            session,
            raw_token,
            redirect_to: outcome.pending.redirect_to,
            remember_me,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_redirect() {
        assert_eq!(safe_redirect(Some("/store/item/9?x=1"), "/d"), "/store/item/9?x=1");
        assert_eq!(safe_redirect(Some("https://evil.example"), "/d"), "/d");
        assert_eq!(safe_redirect(Some("//evil.example"), "/d"), "/d");
        assert_eq!(safe_redirect(Some("/\\evil.example"), "/d"), "/d");
        assert_eq!(safe_redirect(Some("/a\nb"), "/d"), "/d");
        assert_eq!(safe_redirect(None, "/d"), "/d");
    }

    #[test]
    fn test_login_flow_records_failure_phase() {
        let mut flow = LoginFlow::new();
        flow.advance(LoginPhase::CallbackReceived).unwrap();
        flow.advance(LoginPhase::TokenExchanged).unwrap();
        flow.fail();
        assert_eq!(flow.phase(), LoginPhase::Failed);
        assert_eq!(flow.failed_at(), Some(LoginPhase::TokenExchanged));
        assert!(flow.advance(LoginPhase::UserInfoFetched).is_err());
    }

    #[test]
    fn test_login_flow_rejects_skips() {
        let mut flow = LoginFlow::new();
        flow.advance(LoginPhase::CallbackReceived).unwrap();
        assert!(flow.advance(LoginPhase::SessionEstablished).is_err());
        assert_eq!(flow.phase(), LoginPhase::CallbackReceived);
    }
}
