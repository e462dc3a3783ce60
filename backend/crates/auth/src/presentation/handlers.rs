//! HTTP Handlers

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use platform::client::ClientContext;
use platform::clock::{Clock, SystemClock};
use uuid::Uuid;

use crate::application::{
    AccountAdmin, ApiKeyAuthenticator, AuthConfig, CallbackParams, CsrfGuard, Guard,
    Housekeeping, LogoutTarget, NewApiKey, OAuthConfig, OAuthLoginUseCase, SessionManager,
};
use crate::domain::provider::OAuthTransport;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::context_id::ContextId;
use crate::domain::value_object::permission::Permission;
use crate::domain::value_object::{ApiKeyId, SessionId, UserId};
use crate::error::{AuthError, AuthResult, LoginErrorCode};
use crate::presentation::dto::{
    ApiKeyCreatedResponse, ApiKeyResponse, CallbackQuery, CreateApiKeyRequest, CsrfResponse,
    LoginQuery, PrincipalResponse, SessionResponse, SessionStatusResponse, SetRoleRequest,
    SetStatusRequest,
};
use crate::presentation::middleware::{CurrentIdentity, Surface, enforce};

/// Header carrying the CSRF token on state-changing requests
pub const CSRF_HEADER: &str = "x-csrf-token";
/// Form field alternative to [`CSRF_HEADER`]
pub const CSRF_FORM_FIELD: &str = "csrf_token";

/// Handlers render their own errors so debug detail follows the config.
pub type HttpResult<T> = Result<T, Response>;

/// Shared state for auth handlers
pub struct AuthAppState<R, T>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    pub repo: Arc<R>,
    pub transport: Arc<T>,
    pub config: Arc<AuthConfig>,
    pub oauth: Arc<OAuthConfig>,
    pub clock: Arc<dyn Clock>,
}

impl<R, T> Clone for AuthAppState<R, T>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            transport: self.transport.clone(),
            config: self.config.clone(),
            oauth: self.oauth.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<R, T> AuthAppState<R, T>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    pub fn new(repo: R, transport: T, config: AuthConfig, oauth: OAuthConfig) -> Self {
        Self {
            repo: Arc::new(repo),
            transport: Arc::new(transport),
            config: Arc::new(config),
            oauth: Arc::new(oauth),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Log and render with the configured level of detail.
    pub fn reject(&self, error: AuthError) -> Response {
        error.render(self.config.debug_errors)
    }

    pub fn sessions(&self) -> SessionManager<R> {
        SessionManager::new(self.repo.clone(), self.config.clone(), self.clock.clone())
    }

    pub fn csrf(&self) -> CsrfGuard<R> {
        CsrfGuard::new(self.repo.clone(), self.config.clone(), self.clock.clone())
    }

    pub fn login(&self) -> OAuthLoginUseCase<R, T> {
        OAuthLoginUseCase::new(
            self.repo.clone(),
            self.transport.clone(),
            self.config.clone(),
            self.oauth.clone(),
            self.clock.clone(),
        )
    }

    pub fn api_keys(&self) -> ApiKeyAuthenticator<R> {
        ApiKeyAuthenticator::new(self.repo.clone(), self.config.clone(), self.clock.clone())
    }

    pub fn admin(&self) -> AccountAdmin<R> {
        AccountAdmin::new(self.repo.clone(), self.clock.clone())
    }

    pub fn housekeeping(&self) -> Housekeeping<R> {
        Housekeeping::new(self.repo.clone(), self.config.clone(), self.clock.clone())
    }

    /// Browser context from a correctly signed cookie
    fn context(&self, jar: &CookieJar) -> Option<ContextId> {
        jar.get(&self.config.context_cookie_name)
            .and_then(|c| ContextId::from_cookie(c.value(), &self.config.context_secret))
    }

    /// Existing context, or a new one with its cookie added to the jar.
    fn ensure_context(&self, jar: CookieJar) -> AuthResult<(ContextId, CookieJar)> {
        if let Some(context) = self.context(&jar) {
            return Ok((context, jar));
        }
        let context = ContextId::generate();
        let cookie = self.config.cookie_policy().build(
            &self.config.context_cookie_name,
            &context.to_cookie_value(&self.config.context_secret)?,
            None,
        );
        Ok((context, jar.add(cookie)))
    }

    fn session_token(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.config.session_cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    async fn require_csrf(
        &self,
        jar: &CookieJar,
        headers: &HeaderMap,
        form_token: Option<&str>,
    ) -> AuthResult<()> {
        let context = self.context(jar).ok_or(AuthError::CsrfValidationFailed)?;
        let candidate = headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .or(form_token)
            .ok_or(AuthError::CsrfValidationFailed)?;

        if self.csrf().verify(&context, candidate).await? {
            Ok(())
        } else {
            Err(AuthError::CsrfValidationFailed)
        }
    }

    async fn rotate_csrf(&self, jar: &CookieJar) {
        if let Some(context) = self.context(jar)
            && let Err(e) = self.csrf().clear(&context).await
        {
            tracing::warn!(error = %e, "Failed to clear CSRF token");
        }
    }

    fn login_failure_redirect(&self, code: LoginErrorCode) -> Redirect {
        Redirect::to(&format!("{}?error={}", self.config.login_path, code))
    }
}

fn form_field(body: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

// ============================================================================
// Login
// ============================================================================

/// GET|POST /auth/login
pub async fn login<R, T>(
    State(state): State<AuthAppState<R, T>>,
    jar: CookieJar,
    Query(query): Query<LoginQuery>,
) -> Response
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let (context, jar) = match state.ensure_context(jar) {
        Ok(pair) => pair,
        Err(e) => return state.reject(e),
    };

    let result = state
        .login()
        .build_authorization_url(&context, query.redirect.as_deref(), query.remember_me())
        .await;

    match result {
        Ok(url) => (jar, Redirect::to(url.as_str())).into_response(),
        Err(e) => {
            let code = e.login_error_code();
            e.log();
            (jar, state.login_failure_redirect(code)).into_response()
        }
    }
}

/// GET /auth/callback
pub async fn callback<R, T>(
    State(state): State<AuthAppState<R, T>>,
    jar: CookieJar,
    Extension(client): Extension<ClientContext>,
    Query(query): Query<CallbackQuery>,
) -> Response
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let context = state.context(&jar);
    let replaced = state.session_token(&jar);
    let params = CallbackParams {
        code: query.code,
        state: query.state,
        error: query.error,
        error_description: query.error_description,
    };

    let result = state
        .login()
        .complete(context.as_ref(), params, &client, replaced.as_deref())
        .await;

    match result {
        Ok(success) => {
            state.rotate_csrf(&jar).await;

            let max_age = if success.remember_me {
                state.config.session_ttl_long
            } else {
                state.config.session_ttl_short
            };
            let cookie = state.config.cookie_policy().build(
                &state.config.session_cookie_name,
                success.raw_token.expose(),
                Some(max_age),
            );
            (jar.add(cookie), Redirect::to(&success.redirect_to)).into_response()
        }
        Err(e) => {
            let code = e.login_error_code();
            e.log();
            (jar, state.login_failure_redirect(code)).into_response()
        }
    }
}

// ============================================================================
// Logout
// ============================================================================

/// POST /auth/logout
pub async fn logout<R, T>(
    State(state): State<AuthAppState<R, T>>,
    jar: CookieJar,
    headers: HeaderMap,
    Extension(client): Extension<ClientContext>,
    body: Bytes,
) -> HttpResult<Response>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let form_token = form_field(&body, CSRF_FORM_FIELD);
    state
        .require_csrf(&jar, &headers, form_token.as_deref())
        .await
        .map_err(|e| state.reject(e))?;

    if let Some(token) = state.session_token(&jar) {
        state
            .sessions()
            .logout(LogoutTarget::Token(&token), &client)
            .await
            .map_err(|e| state.reject(e))?;
    }
    state.rotate_csrf(&jar).await;

    let removal = state
        .config
        .cookie_policy()
        .removal(&state.config.session_cookie_name);

    Ok((
        jar.add(removal),
        Redirect::to(&state.config.post_logout_redirect),
    )
        .into_response())
}

// ============================================================================
// CSRF & Session Status
// ============================================================================

/// GET /auth/csrf
pub async fn csrf_token<R, T>(
    State(state): State<AuthAppState<R, T>>,
    jar: CookieJar,
) -> HttpResult<(CookieJar, Json<CsrfResponse>)>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let (context, jar) = state.ensure_context(jar).map_err(|e| state.reject(e))?;
    let token = state
        .csrf()
        .issue(&context)
        .await
        .map_err(|e| state.reject(e))?;

    Ok((jar, Json(CsrfResponse { token })))
}

/// GET /auth/session
pub async fn session_status(
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
) -> Json<SessionStatusResponse> {
    match &identity {
        Some(identity) => Json(identity.into()),
        None => Json(SessionStatusResponse::anonymous()),
    }
}

// ============================================================================
// Session Management
// ============================================================================

/// GET /auth/sessions
pub async fn list_sessions<R, T>(
    State(state): State<AuthAppState<R, T>>,
    jar: CookieJar,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
) -> HttpResult<Json<Vec<SessionResponse>>>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let identity = enforce(identity.as_ref(), Guard::Auth, Surface::Api, &state.config)?;
    let current = state.session_token(&jar);

    let sessions = state
        .sessions()
        .list_sessions(&identity.user_id(), current.as_deref())
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

/// DELETE /auth/sessions/{id}
pub async fn revoke_session<R, T>(
    State(state): State<AuthAppState<R, T>>,
    jar: CookieJar,
    headers: HeaderMap,
    Extension(client): Extension<ClientContext>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
    Path(session_id): Path<Uuid>,
) -> HttpResult<StatusCode>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let identity = enforce(identity.as_ref(), Guard::Auth, Surface::Api, &state.config)?;
    state
        .require_csrf(&jar, &headers, None)
        .await
        .map_err(|e| state.reject(e))?;

    let removed = state
        .sessions()
        .revoke_session(&SessionId::from_uuid(session_id), &identity.user_id(), &client)
        .await
        .map_err(|e| state.reject(e))?;

    if removed == 0 {
        return Err(state.reject(AuthError::NotFound("Session")));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// API Keys
// ============================================================================

/// GET /auth/api-keys
pub async fn list_api_keys<R, T>(
    State(state): State<AuthAppState<R, T>>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
) -> HttpResult<Json<Vec<ApiKeyResponse>>>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let identity = enforce(
        identity.as_ref(),
        Guard::Permission(Permission::ManageOwnApiKeys),
        Surface::Api,
        &state.config,
    )?;

    let keys = state
        .api_keys()
        .list(&identity.user_id())
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

/// POST /auth/api-keys
pub async fn create_api_key<R, T>(
    State(state): State<AuthAppState<R, T>>,
    jar: CookieJar,
    headers: HeaderMap,
    Extension(client): Extension<ClientContext>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
    Json(req): Json<CreateApiKeyRequest>,
) -> HttpResult<(StatusCode, Json<ApiKeyCreatedResponse>)>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let identity = enforce(
        identity.as_ref(),
        Guard::Permission(Permission::ManageOwnApiKeys),
        Surface::Api,
        &state.config,
    )?;
    state
        .require_csrf(&jar, &headers, None)
        .await
        .map_err(|e| state.reject(e))?;

    let request = NewApiKey {
        name: req.name,
        permissions: req.permissions,
        expires_in_days: req.expires_in_days,
    };
    let created = state
        .api_keys()
        .create(&identity.user_id(), request, &client)
        .await
        .map_err(|e| state.reject(e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyCreatedResponse {
            api_key: created.raw_key.expose().to_string(),
            key: created.key.into(),
        }),
    ))
}

/// DELETE /auth/api-keys/{id}
pub async fn revoke_api_key<R, T>(
    State(state): State<AuthAppState<R, T>>,
    jar: CookieJar,
    headers: HeaderMap,
    Extension(client): Extension<ClientContext>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
    Path(key_id): Path<Uuid>,
) -> HttpResult<StatusCode>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let identity = enforce(
        identity.as_ref(),
        Guard::Permission(Permission::ManageOwnApiKeys),
        Surface::Api,
        &state.config,
    )?;
    state
        .require_csrf(&jar, &headers, None)
        .await
        .map_err(|e| state.reject(e))?;

    let revoked = state
        .api_keys()
        .revoke(&ApiKeyId::from_uuid(key_id), &identity.user_id(), &client)
        .await
        .map_err(|e| state.reject(e))?;

    if revoked == 0 {
        return Err(state.reject(AuthError::NotFound("API key")));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Administration
// ============================================================================

/// POST /auth/admin/users/{id}/role
pub async fn set_user_role<R, T>(
    State(state): State<AuthAppState<R, T>>,
    jar: CookieJar,
    headers: HeaderMap,
    Extension(client): Extension<ClientContext>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SetRoleRequest>,
) -> HttpResult<StatusCode>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let identity = enforce(
        identity.as_ref(),
        Guard::Permission(Permission::ManageUsers),
        Surface::Api,
        &state.config,
    )?;
    state
        .require_csrf(&jar, &headers, None)
        .await
        .map_err(|e| state.reject(e))?;

    state
        .admin()
        .set_role(identity, &UserId::from_uuid(user_id), req.role, &client)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/admin/users/{id}/status
pub async fn set_user_status<R, T>(
    State(state): State<AuthAppState<R, T>>,
    jar: CookieJar,
    headers: HeaderMap,
    Extension(client): Extension<ClientContext>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> HttpResult<StatusCode>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let identity = enforce(
        identity.as_ref(),
        Guard::Permission(Permission::ManageUsers),
        Surface::Api,
        &state.config,
    )?;
    state
        .require_csrf(&jar, &headers, None)
        .await
        .map_err(|e| state.reject(e))?;

    state
        .admin()
        .set_status(identity, &UserId::from_uuid(user_id), req.status, &client)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /auth/admin/users/{id}
pub async fn delete_user<R, T>(
    State(state): State<AuthAppState<R, T>>,
    jar: CookieJar,
    headers: HeaderMap,
    Extension(client): Extension<ClientContext>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
    Path(user_id): Path<Uuid>,
) -> HttpResult<StatusCode>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let identity = enforce(
        identity.as_ref(),
        Guard::Permission(Permission::ManageUsers),
        Surface::Api,
        &state.config,
    )?;
    state
        .require_csrf(&jar, &headers, None)
        .await
        .map_err(|e| state.reject(e))?;

    state
        .admin()
        .delete_account(identity, &UserId::from_uuid(user_id), &client)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// API
// ============================================================================

/// GET /api/v1/me
pub async fn me<R, T>(
    State(state): State<AuthAppState<R, T>>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
) -> HttpResult<Json<PrincipalResponse>>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let identity = enforce(identity.as_ref(), Guard::Auth, Surface::Api, &state.config)?;
    Ok(Json(identity.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_field() {
        let body = b"redirect=%2Fhome&csrf_token=abc%2B1&x=";
        assert_eq!(form_field(body, CSRF_FORM_FIELD).as_deref(), Some("abc+1"));
        assert_eq!(form_field(body, "redirect").as_deref(), Some("/home"));
        assert_eq!(form_field(body, "missing"), None);
    }
}
