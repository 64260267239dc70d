//! Stateless HMAC-signed capability tokens.
//!
//! A token is `base64url("{epoch_ms}.{hex(HMAC_SHA256(secret, message))}")`
//! where the message binds the entity id and the embedded timestamp.
//! Verification recomputes the signature, so no token is ever stored:
//! expiry is time-only and multiple valid tokens may coexist for the same
//! purchase.
//!
//! Two namespaces share the construction:
//! - download tokens: message `{purchase_id}-{epoch_ms}`, valid 7 days
//! - password-reset tokens: message `reset-{user_id}-{epoch_ms}`, valid 1 hour

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Download links stay valid for 7 days.
pub const DOWNLOAD_TOKEN_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Password-reset links stay valid for 1 hour.
pub const RESET_TOKEN_TTL_MS: i64 = 60 * 60 * 1000;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Token expired")]
    Expired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token verification failed")]
    VerificationFailed,
}

/// Issues and verifies capability tokens. Pure CPU-bound HMAC work with no
/// I/O and no shared mutable state; safe under arbitrary concurrency.
#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Mint a download token for a purchase. Existence of the purchase is
    /// not checked here.
    pub fn issue_download_token(&self, purchase_id: &str) -> String {
        self.issue(purchase_id, None)
    }

    pub fn verify_download_token(&self, purchase_id: &str, token: &str) -> Result<(), TokenError> {
        self.verify(purchase_id, None, token, DOWNLOAD_TOKEN_TTL_MS)
    }

    /// Mint a password-reset token for a user. Same construction as download
    /// tokens under a distinct namespace so the two can never be swapped.
    pub fn issue_reset_token(&self, user_id: &str) -> String {
        self.issue(user_id, Some("reset"))
    }

    pub fn verify_reset_token(&self, user_id: &str, token: &str) -> Result<(), TokenError> {
        self.verify(user_id, Some("reset"), token, RESET_TOKEN_TTL_MS)
    }

    fn issue(&self, id: &str, namespace: Option<&str>) -> String {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = self.sign(&Self::message(id, namespace, timestamp));
        URL_SAFE_NO_PAD.encode(format!("{}.{}", timestamp, signature))
    }

    fn verify(
        &self,
        id: &str,
        namespace: Option<&str>,
        token: &str,
        ttl_ms: i64,
    ) -> Result<(), TokenError> {
        // Tolerate standard base64url with or without padding.
        let decoded = URL_SAFE_NO_PAD
            .decode(token.trim_end_matches('='))
            .map_err(|_| TokenError::VerificationFailed)?;
        let decoded =
            String::from_utf8(decoded).map_err(|_| TokenError::VerificationFailed)?;

        let (timestamp_part, signature_part) = decoded
            .split_once('.')
            .ok_or(TokenError::InvalidFormat)?;
        if timestamp_part.is_empty() || signature_part.is_empty() {
            return Err(TokenError::InvalidFormat);
        }

        let timestamp: i64 = timestamp_part
            .parse()
            .map_err(|_| TokenError::InvalidTimestamp)?;

        // A negative elapsed (clock skew, token "from the future") is not
        // rejected: the signature binds the timestamp, so a forged future
        // timestamp cannot carry a valid signature without the secret.
        let elapsed = chrono::Utc::now().timestamp_millis() - timestamp;
        if elapsed > ttl_ms {
            return Err(TokenError::Expired);
        }

        let expected = self.sign(&Self::message(id, namespace, timestamp));

        let expected_bytes = expected.as_bytes();
        let provided_bytes = signature_part.as_bytes();

        // Length is not secret (always 64 hex chars), only the content is.
        if expected_bytes.len() != provided_bytes.len() {
            return Err(TokenError::InvalidSignature);
        }
        if !bool::from(expected_bytes.ct_eq(provided_bytes)) {
            return Err(TokenError::InvalidSignature);
        }

        Ok(())
    }

    fn message(id: &str, namespace: Option<&str>, timestamp: i64) -> String {
        match namespace {
            Some(ns) => format!("{}-{}-{}", ns, id, timestamp),
            None => format!("{}-{}", id, timestamp),
        }
    }

    fn sign(&self, message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Human-readable expiry hint for freshly minted download links.
pub const DOWNLOAD_LINK_EXPIRY_HINT: &str = "7 days";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_token_round_trip() {
        let svc = TokenService::new("test-secret");
        let token = svc.issue_download_token("ryt_pur_abc123");
        assert!(svc.verify_download_token("ryt_pur_abc123", &token).is_ok());
    }

    #[test]
    fn test_reset_token_round_trip() {
        let svc = TokenService::new("test-secret");
        let token = svc.issue_reset_token("ryt_usr_abc123");
        assert!(svc.verify_reset_token("ryt_usr_abc123", &token).is_ok());
    }

    #[test]
    fn test_namespaces_are_not_interchangeable() {
        let svc = TokenService::new("test-secret");
        let token = svc.issue_download_token("ryt_usr_abc123");
        assert_eq!(
            svc.verify_reset_token("ryt_usr_abc123", &token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_garbage_token_is_verification_failed() {
        let svc = TokenService::new("test-secret");
        assert_eq!(
            svc.verify_download_token("ryt_pur_abc123", "!!!not-base64!!!"),
            Err(TokenError::VerificationFailed)
        );
    }

    #[test]
    fn test_token_without_separator_is_invalid_format() {
        let svc = TokenService::new("test-secret");
        let token = URL_SAFE_NO_PAD.encode("1700000000000deadbeef");
        assert_eq!(
            svc.verify_download_token("ryt_pur_abc123", &token),
            Err(TokenError::InvalidFormat)
        );
    }

    #[test]
    fn test_non_numeric_timestamp_is_invalid() {
        let svc = TokenService::new("test-secret");
        let token = URL_SAFE_NO_PAD.encode("soon.deadbeef");
        assert_eq!(
            svc.verify_download_token("ryt_pur_abc123", &token),
            Err(TokenError::InvalidTimestamp)
        );
    }
}
