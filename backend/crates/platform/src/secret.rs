//! Redacted Secrets
//!
//! [`Secret`] holds raw bearer material (session tokens, API keys, the OAuth
//! client secret, provider access tokens). The buffer is wiped on drop and
//! never shows up in `Debug` or `Display` output.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Does not implement `Clone`; pass by reference or move it.
#[derive(Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read the raw value. Callers must not log it.
    #[inline]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&"[REDACTED]").finish()
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_output() {
        let secret = Secret::new("super-secret-value");
        assert_eq!(format!("{secret:?}"), "Secret(\"[REDACTED]\")");
        assert_eq!(secret.to_string(), "[REDACTED]");
        assert_eq!(secret.expose(), "super-secret-value");
    }

    #[test]
    fn test_blank() {
        assert!(Secret::new("  ").is_blank());
        assert!(!Secret::new("x").is_blank());
    }
}
