//! Application Configuration
//!
//! Configuration for the auth application layer and the identity provider.

use std::time::Duration;

use platform::cookie::CookiePolicy;
use platform::rate_limit::RateLimitConfig;
use platform::secret::Secret;
use url::Url;

use crate::error::{AuthError, AuthResult};

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Cookie carrying the raw session token
    pub session_cookie_name: String,
    /// Cookie carrying the signed browser context id
    pub context_cookie_name: String,
    /// Session TTL without "Remember Me" (1 day)
    pub session_ttl_short: Duration,
    /// Session TTL with "Remember Me" (30 days)
    pub session_ttl_long: Duration,
    /// CSRF token lifetime (1 hour)
    pub csrf_ttl: Duration,
    /// How long a started login may take to come back (10 minutes)
    pub oauth_state_ttl: Duration,
    /// HMAC key for the context cookie (32 bytes)
    pub context_secret: [u8; 32],
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    /// Anonymous API callers, per IP
    pub api_rate_limit: RateLimitConfig,
    /// API key callers, per key
    pub api_key_rate_limit: RateLimitConfig,
    /// Take the client address from `X-Forwarded-For`/`X-Real-IP`.
    /// Only safe behind a proxy that overwrites them.
    pub trust_forwarded_headers: bool,
    /// Frontend login page; failures land on `login_path?error=<code>`
    pub login_path: String,
    pub post_login_redirect: String,
    pub post_logout_redirect: String,
    /// Chance that a request triggers housekeeping
    pub cleanup_probability: f64,
    /// Show internal error detail in responses
    pub debug_errors: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie_name: "bf_session".to_string(),
            context_cookie_name: "bf_ctx".to_string(),
            session_ttl_short: Duration::from_secs(24 * 3600), // 1 day
            session_ttl_long: Duration::from_secs(30 * 24 * 3600), // 30 days
            csrf_ttl: Duration::from_secs(3600),
            oauth_state_ttl: Duration::from_secs(600),
            context_secret: [0u8; 32],
            cookie_secure: true,
            cookie_same_site: SameSite::Strict,
            api_rate_limit: RateLimitConfig::new(60, 60),
            api_key_rate_limit: RateLimitConfig::new(1000, 3600),
            trust_forwarded_headers: false,
            login_path: "/login".to_string(),
            post_login_redirect: "/dashboard".to_string(),
            post_logout_redirect: "/".to_string(),
            cleanup_probability: 0.01,
            debug_errors: false,
        }
    }
}

impl AuthConfig {
    /// Create config with a random context secret
    pub fn with_random_secret() -> Self {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self {
            context_secret: secret,
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie, verbose errors)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            debug_errors: true,
            ..Self::with_random_secret()
        }
    }

    pub fn session_ttl(&self, remember_me: bool) -> chrono::Duration {
        let ttl = if remember_me {
            self.session_ttl_long
        } else {
            self.session_ttl_short
        };
        to_chrono(ttl)
    }

    pub fn session_ttl_long(&self) -> chrono::Duration {
        to_chrono(self.session_ttl_long)
    }

    pub fn csrf_ttl(&self) -> chrono::Duration {
        to_chrono(self.csrf_ttl)
    }

    pub fn oauth_state_ttl(&self) -> chrono::Duration {
        to_chrono(self.oauth_state_ttl)
    }

    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy {
            secure: self.cookie_secure,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Identity provider client configuration
#[derive(Debug)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Secret,
    pub redirect_uri: Url,
    pub authorize_url: Url,
    pub token_url: Url,
    pub userinfo_url: Url,
    pub scopes: Vec<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl OAuthConfig {
    const AUTHORIZE_URL: &'static str = "https://apis.roblox.com/oauth/v1/authorize";
    const TOKEN_URL: &'static str = "https://apis.roblox.com/oauth/v1/token";
    const USERINFO_URL: &'static str = "https://apis.roblox.com/oauth/v1/userinfo";

    /// Fails with `Configuration` when a credential is missing, blank or the
    /// redirect URI is not an absolute URL.
    pub fn from_parts(
        client_id: Option<String>,
        client_secret: Option<String>,
        redirect_uri: Option<String>,
    ) -> AuthResult<Self> {
        let client_id = client_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::Configuration("OAuth client id is not set".into()))?;

        let client_secret = client_secret
            .map(Secret::new)
            .filter(|s| !s.is_blank())
            .ok_or_else(|| AuthError::Configuration("OAuth client secret is not set".into()))?;

        let redirect_uri = redirect_uri
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AuthError::Configuration("OAuth redirect URI is not set".into()))?;
        let redirect_uri = Url::parse(redirect_uri.trim())
            .map_err(|e| AuthError::Configuration(format!("OAuth redirect URI is invalid: {e}")))?;

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            authorize_url: fixed_url(Self::AUTHORIZE_URL)?,
            token_url: fixed_url(Self::TOKEN_URL)?,
            userinfo_url: fixed_url(Self::USERINFO_URL)?,
            scopes: vec!["openid".to_string(), "profile".to_string()],
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        })
    }

    /// Point the client at a different provider.
    pub fn with_endpoints(mut self, authorize_url: Url, token_url: Url, userinfo_url: Url) -> Self {
        self.authorize_url = authorize_url;
        self.token_url = token_url;
        self.userinfo_url = userinfo_url;
        self
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

fn fixed_url(raw: &str) -> AuthResult<Url> {
    Url::parse(raw).map_err(|e| AuthError::Configuration(format!("bad endpoint {raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(id: &str, secret: &str, redirect: &str) -> AuthResult<OAuthConfig> {
        OAuthConfig::from_parts(
            Some(id.to_string()),
            Some(secret.to_string()),
            Some(redirect.to_string()),
        )
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.session_cookie_name, "bf_session");
        assert_eq!(config.session_ttl(false), chrono::Duration::days(1));
        assert_eq!(config.session_ttl(true), chrono::Duration::days(30));
        assert_eq!(config.csrf_ttl(), chrono::Duration::seconds(3600));
        assert_eq!(config.cookie_same_site, SameSite::Strict);
        assert_eq!(config.api_rate_limit.max_requests, 60);
        assert!(!config.trust_forwarded_headers);
    }

    #[test]
    fn test_oauth_config_requires_credentials() {
        assert!(parts("id", "secret", "https://blufox.dev/auth/callback").is_ok());
        assert!(matches!(
            parts(" ", "secret", "https://blufox.dev/auth/callback"),
            Err(AuthError::Configuration(_))
        ));
        assert!(matches!(
            parts("id", "", "https://blufox.dev/auth/callback"),
            Err(AuthError::Configuration(_))
        ));
        assert!(matches!(
            parts("id", "secret", "/relative"),
            Err(AuthError::Configuration(_))
        ));
        assert!(matches!(
            OAuthConfig::from_parts(Some("id".into()), None, None),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn test_oauth_config_debug_hides_secret() {
        let config = parts("id", "hunter2-secret", "https://blufox.dev/auth/callback").unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2-secret"));
        assert_eq!(config.scope_param(), "openid profile");
    }
}
