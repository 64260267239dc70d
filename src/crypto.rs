//! Password hashing and secret hashing for bearer tokens.
//!
//! Passwords use scrypt (N=16384, r=16, p=1, dkLen=64) with a random
//! 16-byte salt, stored as `hex(salt):hex(key)`. Bearer tokens are
//! high-entropy random values stored as salted SHA-256 hashes for lookup.

use rand::RngCore;
use scrypt::{scrypt, Params};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

/// Hash a password using scrypt.
///
/// Returns a string in the format `salt:key` where both are hex-encoded.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt_bytes);
    let salt_hex = hex::encode(salt_bytes);

    let key = derive_key(password, &salt_hex)?;
    Ok(format!("{}:{}", salt_hex, hex::encode(key)))
}

/// Verify a password against a hash produced by `hash_password`.
pub fn verify_password(hash: &str, password: &str) -> Result<bool> {
    let (salt, key_hex) = hash
        .split_once(':')
        .ok_or_else(|| AppError::Internal("Invalid password hash format".into()))?;

    let expected_key = hex::decode(key_hex)
        .map_err(|e| AppError::Internal(format!("Invalid hex in password hash: {}", e)))?;

    let derived_key = derive_key(password, salt)?;

    if derived_key.len() != expected_key.len() {
        return Ok(false);
    }
    Ok(derived_key.ct_eq(&expected_key).into())
}

/// Internal: derive a 64-byte key using scrypt.
/// N=16384 -> log2(N)=14, r=16, p=1, dkLen=64
fn derive_key(password: &str, salt: &str) -> Result<Vec<u8>> {
    let params = Params::new(14, 16, 1, 64)
        .map_err(|e| AppError::Internal(format!("Invalid scrypt params: {}", e)))?;

    let mut output = vec![0u8; 64];
    scrypt(password.as_bytes(), salt.as_bytes(), &params, &mut output)
        .map_err(|e| AppError::Internal(format!("scrypt failed: {}", e)))?;

    Ok(output)
}

/// Hash a secret for database lookups (bearer tokens).
/// Uses SHA-256 with application salt, returns lowercase hex string.
pub fn hash_secret(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"tripvault-v1:");
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new bearer token: `ryt_` + 32 random bytes as hex.
pub fn generate_bearer_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("ryt_{}", hex::encode(bytes))
}
