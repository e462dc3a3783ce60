//! Cryptographic Utilities
//!
//! Every secret comparison in the backend goes through [`constant_time_eq`] or
//! [`verify`]; never compare tokens with `==`.

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("HMAC key rejected")]
    InvalidKey,
}

/// Generate cryptographically secure random bytes
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// Random token, lower-case hex (2 chars per byte)
pub fn random_token_hex(byte_len: usize) -> String {
    hex::encode(random_bytes(byte_len))
}

/// Random token, unpadded base64url; safe in URLs and cookies
pub fn random_token_urlsafe(byte_len: usize) -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(byte_len))
}

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// One-way lookup key for a bearer secret (session token, API key).
///
/// Tokens carry 256 bits of entropy, so a fast unsalted digest is enough.
pub fn hash_token(value: &str) -> String {
    hex::encode(sha256(value.as_bytes()))
}

pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Standard alphabet, padded; used for secrets read from the environment.
pub fn from_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(s.trim())
}

/// HMAC-SHA256 of `data` under `secret`
pub fn sign(data: &[u8], secret: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| CryptoError::InvalidKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verify an HMAC-SHA256 signature in constant time.
///
/// Any failure, including a rejected key, is a mismatch.
pub fn verify(data: &[u8], signature: &[u8], secret: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(signature).is_ok()
}

/// `value.base64url(hmac(value))`
pub fn sign_token(value: &str, secret: &[u8]) -> Result<String, CryptoError> {
    let signature = sign(value.as_bytes(), secret)?;
    Ok(format!("{}.{}", value, URL_SAFE_NO_PAD.encode(signature)))
}

/// Returns the signed value if the signature checks out.
pub fn verify_signed_token(token: &str, secret: &[u8]) -> Option<String> {
    let (value, signature_b64) = token.rsplit_once('.')?;
    if value.is_empty() {
        return None;
    }
    let signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
    if verify(value.as_bytes(), &signature, secret) {
        Some(value.to_string())
    } else {
        None
    }
}

/// Constant-time comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_values() {
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash.to_vec(), expected);

        assert_eq!(
            hash_token("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_hmac_rfc4231_case_2() {
        let mac = sign(b"what do ya want for nothing?", b"Jefe").unwrap();
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_random_tokens() {
        let hex_token = random_token_hex(32);
        assert_eq!(hex_token.len(), 64);
        assert!(hex_token.chars().all(|c| c.is_ascii_hexdigit()));

        let url_token = random_token_urlsafe(32);
        assert_eq!(url_token.len(), 43);
        assert!(!url_token.contains(['+', '/', '=']));

        assert_ne!(random_token_hex(32), random_token_hex(32));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let secret = [7u8; 32];
        let mac = sign(b"payload", &secret).unwrap();
        assert!(verify(b"payload", &mac, &secret));
        assert!(!verify(b"payload!", &mac, &secret));
        assert!(!verify(b"payload", &mac, &[8u8; 32]));
        assert!(!verify(b"payload", &mac[..16], &secret));
    }

    #[test]
    fn test_signed_token() {
        let secret = [42u8; 32];
        let token = sign_token("ctx-123", &secret).unwrap();
        assert!(token.starts_with("ctx-123."));
        assert_eq!(verify_signed_token(&token, &secret).as_deref(), Some("ctx-123"));

        let forged = token.replace("ctx-123", "ctx-124");
        assert!(verify_signed_token(&forged, &secret).is_none());
        assert!(verify_signed_token("ctx-123", &secret).is_none());
        assert!(verify_signed_token(".abc", &secret).is_none());
    }

    #[test]
    fn test_base64_roundtrip() {
        let encoded = to_base64(&[7u8; 32]);
        assert_eq!(from_base64(&format!(" {encoded}\n")).unwrap(), vec![7u8; 32]);
        assert!(from_base64("not base64!").is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abcd", b"abcd"));
        assert!(!constant_time_eq(b"abcd", b"abce"));
        assert!(!constant_time_eq(b"abcd", b"abc"));
    }
}
