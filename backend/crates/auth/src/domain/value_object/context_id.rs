//! Browser Context
//!
//! A random id carried in a signed cookie from the first visit on. CSRF tokens
//! and pending OAuth states are bound to it server-side; the store only ever
//! sees its hash.

use platform::crypto::{self, CryptoError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextId(String);

impl ContextId {
    pub fn generate() -> Self {
        Self(crypto::random_token_urlsafe(32))
    }

    /// `None` if the cookie was not signed with `secret`.
    pub fn from_cookie(value: &str, secret: &[u8]) -> Option<Self> {
        crypto::verify_signed_token(value, secret).map(Self)
    }

    pub fn to_cookie_value(&self, secret: &[u8]) -> Result<String, CryptoError> {
        crypto::sign_token(&self.0, secret)
    }

    /// Lookup key for server-side records
    pub fn storage_key(&self) -> String {
        crypto::hash_token(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_roundtrip_requires_same_secret() {
        let ctx = ContextId::generate();
        let cookie = ctx.to_cookie_value(&[1u8; 32]).unwrap();

        assert_eq!(ContextId::from_cookie(&cookie, &[1u8; 32]), Some(ctx.clone()));
        assert_eq!(ContextId::from_cookie(&cookie, &[2u8; 32]), None);
        assert_ne!(ctx.storage_key(), ctx.0);
        assert_eq!(ctx.storage_key().len(), 64);
    }
}
