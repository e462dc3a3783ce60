//! Identity provider contract
//!
//! Wire shapes of the OAuth 2.0 token and userinfo responses, and the HTTP
//! transport the login flow talks through.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use platform::secret::Secret;
use serde::Deserialize;
use url::Url;

use crate::error::{AuthError, AuthResult};

/// Status and body of a provider response
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Messages never contain request bodies or credentials.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport failure: {0}")]
    Other(String),
}

#[trait_variant::make(OAuthTransport: Send)]
pub trait LocalOAuthTransport {
    /// `application/x-www-form-urlencoded` POST
    async fn post_form(
        &self,
        url: &Url,
        form: &[(&str, &str)],
    ) -> Result<HttpReply, TransportError>;

    /// GET with `Authorization: Bearer <token>`
    async fn get_bearer(&self, url: &Url, token: &Secret) -> Result<HttpReply, TransportError>;
}

#[derive(Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    id_token: Option<String>,
    scope: Option<String>,
}

/// Successful authorization-code exchange
#[derive(Debug)]
pub struct TokenResponse {
    pub access_token: Secret,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub id_token: Option<String>,
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn parse(body: &str) -> AuthResult<Self> {
        let raw: RawTokenResponse = serde_json::from_str(body)
            .map_err(|e| AuthError::TokenExchangeFailed(format!("unreadable token response: {e}")))?;

        let access_token = raw
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AuthError::TokenExchangeFailed("response has no access_token".into()))?;

        Ok(Self {
            access_token: Secret::new(access_token),
            token_type: raw.token_type,
            expires_in: raw.expires_in,
            id_token: raw.id_token,
            scope: raw.scope,
        })
    }

    /// `nonce` claim of the id_token, if there is one.
    ///
    /// The token came straight from the token endpoint over TLS, so the
    /// payload is read without checking the signature.
    pub fn id_token_nonce(&self) -> Option<String> {
        let payload = self.id_token.as_deref()?.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
        claims.get("nonce")?.as_str().map(str::to_string)
    }
}

/// Userinfo, normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Provider subject id; unique per provider account
    pub subject: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl ProviderProfile {
    /// Fails with `UserInfoFailed` when `sub` is missing or blank.
    pub fn parse(body: &str) -> AuthResult<Self> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| AuthError::UserInfoFailed(format!("unreadable userinfo: {e}")))?;

        let subject = match value.get("sub") {
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        if subject.is_empty() {
            return Err(AuthError::UserInfoFailed("userinfo has no subject".into()));
        }

        let text = |field: &str| {
            value
                .get(field)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let username = text("preferred_username")
            .or_else(|| text("name"))
            .unwrap_or_else(|| subject.clone());
        let display_name = text("nickname")
            .or_else(|| text("name"))
            .unwrap_or_else(|| username.clone());

        Ok(Self {
            subject,
            username,
            display_name,
            avatar_url: text("picture"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_requires_access_token() {
        let ok = TokenResponse::parse(r#"{"access_token":"at","token_type":"Bearer","expires_in":900}"#)
            .unwrap();
        assert_eq!(ok.access_token.expose(), "at");
        assert_eq!(ok.expires_in, Some(900));

        assert!(matches!(
            TokenResponse::parse(r#"{"token_type":"Bearer"}"#),
            Err(AuthError::TokenExchangeFailed(_))
        ));
        assert!(matches!(
            TokenResponse::parse(r#"{"access_token":"  "}"#),
            Err(AuthError::TokenExchangeFailed(_))
        ));
        assert!(matches!(
            TokenResponse::parse("<html>"),
            Err(AuthError::TokenExchangeFailed(_))
        ));
    }

    #[test]
    fn test_id_token_nonce() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"1","nonce":"n-123"}"#);
        let body = format!(r#"{{"access_token":"at","id_token":"e30.{payload}.sig"}}"#);
        let tokens = TokenResponse::parse(&body).unwrap();
        assert_eq!(tokens.id_token_nonce().as_deref(), Some("n-123"));

        let tokens = TokenResponse::parse(r#"{"access_token":"at"}"#).unwrap();
        assert_eq!(tokens.id_token_nonce(), None);
    }

    #[test]
    fn test_profile_parsing() {
        let profile = ProviderProfile::parse(
            r#"{"sub":"1234","preferred_username":"blufox","nickname":"Blu Fox","picture":"https://cdn/x.png"}"#,
        )
        .unwrap();
        assert_eq!(profile.subject, "1234");
        assert_eq!(profile.username, "blufox");
        assert_eq!(profile.display_name, "Blu Fox");
        assert_eq!(profile.avatar_url.as_deref(), Some("https://cdn/x.png"));

        let numeric = ProviderProfile::parse(r#"{"sub":987}"#).unwrap();
        assert_eq!(numeric.subject, "987");
        assert_eq!(numeric.username, "987");
        assert_eq!(numeric.display_name, "987");
    }

    #[test]
    fn test_profile_requires_subject() {
        assert!(matches!(
            ProviderProfile::parse(r#"{"name":"nobody"}"#),
            Err(AuthError::UserInfoFailed(_))
        ));
        assert!(matches!(
            ProviderProfile::parse(r#"{"sub":""}"#),
            Err(AuthError::UserInfoFailed(_))
        ));
    }
}
