//! Escalation tokens: opaque 256-bit bearer values binding one specialist
//! session to one case.
//!
//! Only the SHA-256 of a token is stored; validation recomputes the hash
//! and compares in constant time. Expiry is explicit and re-minting
//! replaces the stored hash, invalidating the previous token.

use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// A freshly minted escalation token. The raw value leaves the process
/// exactly once, inside the magic link.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub hash_hex: String,
    pub expires_at: DateTime<Utc>,
}

/// Generate a random URL-safe token with the given time-to-live.
pub fn mint(ttl: chrono::Duration) -> MintedToken {
    let bytes: [u8; 32] = rand::random();
    let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    MintedToken {
        hash_hex: hash_token_hex(&token),
        token,
        expires_at: Utc::now() + ttl,
    }
}

/// SHA-256 of a token, hex-encoded for storage.
pub fn hash_token_hex(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Constant-time comparison of two stored hash strings.
pub fn hashes_match(a_hex: &str, b_hex: &str) -> bool {
    if a_hex.len() != b_hex.len() {
        return false;
    }
    a_hex.as_bytes().ct_eq(b_hex.as_bytes()).into()
}
