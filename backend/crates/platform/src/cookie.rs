//! Cookie Management Infrastructure
//!
//! Every cookie built here is `HttpOnly`; nothing the backend sets is meant for
//! client-side scripts.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite as CookieSameSite};
use http::HeaderMap;

/// SameSite policy for cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }

    /// Case-insensitive; unknown values fall back to `Strict`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "lax" => SameSite::Lax,
            "none" => SameSite::None,
            _ => SameSite::Strict,
        }
    }
}

impl From<SameSite> for CookieSameSite {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Strict => CookieSameSite::Strict,
            SameSite::Lax => CookieSameSite::Lax,
            SameSite::None => CookieSameSite::None,
        }
    }
}

/// Attributes shared by all cookies of one application
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            secure: true,
            same_site: SameSite::Strict,
            path: "/".to_string(),
        }
    }
}

impl CookiePolicy {
    /// `max_age = None` makes a browser-session cookie.
    pub fn build(
        &self,
        name: &str,
        value: &str,
        max_age: Option<std::time::Duration>,
    ) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), value.to_string()))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site.into())
            .path(self.path.clone());

        if let Some(max_age) = max_age {
            builder = builder.max_age(time::Duration::seconds(max_age.as_secs() as i64));
        }

        builder.build()
    }

    /// Immediately-expiring cookie that makes the browser drop `name`.
    pub fn removal(&self, name: &str) -> Cookie<'static> {
        Cookie::build((name.to_string(), String::new()))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site.into())
            .path(self.path.clone())
            .max_age(time::Duration::ZERO)
            .expires(time::OffsetDateTime::UNIX_EPOCH)
            .build()
    }
}

/// Read a cookie value straight from request headers.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, header};

    #[test]
    fn test_build_cookie() {
        let policy = CookiePolicy::default();
        let cookie = policy.build(
            "bf_session",
            "value123",
            Some(std::time::Duration::from_secs(3600)),
        );
        let rendered = cookie.to_string();

        assert!(rendered.starts_with("bf_session=value123"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=3600"));
    }

    #[test]
    fn test_removal_cookie_expires_now() {
        let policy = CookiePolicy {
            secure: false,
            ..Default::default()
        };
        let rendered = policy.removal("bf_session").to_string();
        assert!(rendered.starts_with("bf_session="));
        assert!(rendered.contains("Max-Age=0"));
        assert!(rendered.contains("HttpOnly"));
        assert!(!rendered.contains("Secure"));
    }

    #[test]
    fn test_extract_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; bf_session=abc123; empty="),
        );

        assert_eq!(extract_cookie(&headers, "bf_session"), Some("abc123".to_string()));
        assert_eq!(extract_cookie(&headers, "foo"), Some("bar".to_string()));
        assert_eq!(extract_cookie(&headers, "empty"), None);
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_same_site_parse() {
        assert_eq!(SameSite::parse("Lax"), SameSite::Lax);
        assert_eq!(SameSite::parse("none"), SameSite::None);
        assert_eq!(SameSite::parse("bogus"), SameSite::Strict);
    }
}
