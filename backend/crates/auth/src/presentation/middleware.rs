//! Auth Middleware
//!
//! `resolve_identity` runs in front of the browser routes and `api_auth` in
//! front of the API. Both leave a [`ClientContext`] and a [`CurrentIdentity`]
//! in the request extensions; handlers decide what they require through
//! [`enforce`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use platform::client::{ClientContext, extract_client_context};
use platform::cookie::extract_cookie;
use platform::rate_limit::{RateLimitKey, RateLimitResult, RateLimiter};
use platform::secret::Secret;

use crate::application::config::AuthConfig;
use crate::application::identity::{Guard, Identity, IdentityResolver};
use crate::domain::provider::OAuthTransport;
use crate::domain::repository::AuthStore;
use crate::error::AuthError;
use crate::presentation::handlers::AuthAppState;

/// Header name for API keys
pub const API_KEY_HEADER: &str = "x-api-key";
/// Query parameter fallback for API keys
pub const API_KEY_QUERY: &str = "api_key";

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Resolved caller, `None` when anonymous
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Option<Identity>);

/// Who is asking decides how a missing login is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Page navigation: redirect to the login page
    Browser,
    /// Programmatic caller: 401
    Api,
}

/// Check `guard` against the caller, turning failures into responses.
pub fn enforce<'a>(
    identity: Option<&'a Identity>,
    guard: Guard,
    surface: Surface,
    config: &AuthConfig,
) -> Result<&'a Identity, Response> {
    match guard.check(identity) {
        Ok(identity) => Ok(identity),
        Err(AuthError::NotAuthenticated) if surface == Surface::Browser => {
            Err(Redirect::to(&config.login_path).into_response())
        }
        Err(e) => Err(e.render(config.debug_errors)),
    }
}

fn client_context(req: &Request, config: &AuthConfig) -> ClientContext {
    let direct_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    extract_client_context(req.headers(), direct_ip, config.trust_forwarded_headers)
}

/// Session cookie -> [`Identity`]. Never rejects for a bad cookie; the
/// cookie is cleared instead and the request goes on anonymously.
pub async fn resolve_identity<R, T>(
    State(state): State<AuthAppState<R, T>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let client = client_context(&req, &state.config);
    let token = extract_cookie(req.headers(), &state.config.session_cookie_name);

    let resolver = IdentityResolver::new(Arc::new(state.sessions()), token.map(Secret::new));
    let rejected = resolver
        .token_rejected()
        .await
        .map_err(|e| state.reject(e))?;
    let identity = resolver.into_identity();

    if state.config.cleanup_probability > 0.0 {
        let housekeeping = state.housekeeping();
        let probability = state.config.cleanup_probability;
        tokio::spawn(async move {
            housekeeping.maybe_run(probability).await;
        });
    }

    req.extensions_mut().insert(client);
    req.extensions_mut().insert(CurrentIdentity(identity));

    let mut response = next.run(req).await;

    if rejected && !sets_cookie(response.headers(), &state.config.session_cookie_name) {
        let removal = state
            .config
            .cookie_policy()
            .removal(&state.config.session_cookie_name);
        if let Ok(value) = HeaderValue::from_str(&removal.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    Ok(response)
}

fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    let prefix = format!("{name}=");
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// API credential in precedence order: `X-API-Key`, `Authorization: Bearer`,
/// `?api_key=`.
pub fn extract_api_credential(headers: &HeaderMap, query: Option<&str>) -> Option<Secret> {
    let from_header = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let from_bearer = || {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .filter(|v| !v.is_empty())
    };

    let from_query = || {
        query.and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == API_KEY_QUERY)
                .map(|(_, value)| value.into_owned())
                .filter(|v| !v.is_empty())
        })
    };

    from_header
        .or_else(from_bearer)
        .map(str::to_string)
        .or_else(from_query)
        .map(Secret::new)
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, limit: &RateLimitResult) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(limit.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(limit.reset_at_secs()));
}

/// API key authentication and rate limiting. Keyed callers are limited per
/// key; everyone else, including callers presenting a key that does not
/// authenticate, per client address.
pub async fn api_auth<R, T>(
    State(state): State<AuthAppState<R, T>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response>
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    let client = client_context(&req, &state.config);
    let credential = extract_api_credential(req.headers(), req.uri().query());
    let presented = credential.is_some();
    let now_ms = state.clock.now_ms();
    let keys = state.api_keys();

    let identity = match credential {
        Some(raw_key) => keys
            .authenticate(raw_key.expose())
            .await
            .map_err(|e| state.reject(e))?,
        None => None,
    };

    let limit = match &identity {
        Some(identity) => {
            let key_id = identity
                .api_key_id
                .ok_or_else(|| state.reject(AuthError::Internal("key identity without key id".into())))?;
            let limit = keys
                .check_rate_limit(&key_id)
                .await
                .map_err(|e| state.reject(e))?;
            if limit.allowed {
                keys.record_usage(&key_id).await;
            }
            limit
        }
        None => {
            let limiter = RateLimiter::with_clock(
                state.repo.clone(),
                state.config.api_rate_limit.clone(),
                state.clock.clone(),
            );
            limiter
                .attempt(&RateLimitKey::new(client.actor(), "api"))
                .await
                .map_err(|e| state.reject(e.into()))?
        }
    };

    if !limit.allowed {
        let mut response = state.reject(AuthError::RateLimitExceeded {
            retry_after_secs: limit.retry_after_secs(now_ms),
        });
        apply_rate_limit_headers(response.headers_mut(), &limit);
        return Err(response);
    }

    if presented && identity.is_none() {
        let mut response = state.reject(AuthError::InvalidCredential);
        apply_rate_limit_headers(response.headers_mut(), &limit);
        return Err(response);
    }

    req.extensions_mut().insert(client);
    req.extensions_mut().insert(CurrentIdentity(identity));

    let mut response = next.run(req).await;
    apply_rate_limit_headers(response.headers_mut(), &limit);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::Utc;

    use crate::domain::entity::user::User;
    use crate::domain::provider::ProviderProfile;
    use crate::domain::value_object::UserId;
    use crate::domain::value_object::role::Role;

    fn identity(role: Role) -> Identity {
        let profile = ProviderProfile {
            subject: "1".into(),
            username: "u".into(),
            display_name: "u".into(),
            avatar_url: None,
        };
        let mut user = User::from_profile(UserId::new(), &profile, Utc::now());
        user.role = role;
        Identity {
            permissions: user.permissions(),
            user,
            method: crate::application::identity::AuthMethod::Session,
            session_id: None,
            session_expires_at: None,
            api_key_id: None,
        }
    }

    #[test]
    fn test_credential_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-bearer"));
        let query = Some("api_key=from-query");

        assert_eq!(
            extract_api_credential(&headers, query).unwrap().expose(),
            "from-bearer"
        );

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("from-header"));
        assert_eq!(
            extract_api_credential(&headers, query).unwrap().expose(),
            "from-header"
        );

        assert_eq!(
            extract_api_credential(&HeaderMap::new(), query).unwrap().expose(),
            "from-query"
        );
        assert!(extract_api_credential(&HeaderMap::new(), None).is_none());
    }

    #[test]
    fn test_non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert!(extract_api_credential(&headers, None).is_none());
    }

    #[test]
    fn test_enforce_by_surface() {
        let config = AuthConfig::default();

        let redirect = enforce(None, Guard::Auth, Surface::Browser, &config).unwrap_err();
        assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
        assert_eq!(redirect.headers()[header::LOCATION], "/login");

        let unauthorized = enforce(None, Guard::Auth, Surface::Api, &config).unwrap_err();
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

        let user = identity(Role::User);
        let forbidden =
            enforce(Some(&user), Guard::Role(Role::Admin), Surface::Browser, &config).unwrap_err();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let admin = identity(Role::Admin);
        assert!(enforce(Some(&admin), Guard::Role(Role::Moderator), Surface::Api, &config).is_ok());
    }

    #[test]
    fn test_sets_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(header::SET_COOKIE, HeaderValue::from_static("bf_ctx=x; Path=/"));
        assert!(!sets_cookie(&headers, "bf_session"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("bf_session=y; Path=/"));
        assert!(sets_cookie(&headers, "bf_session"));
    }
}
