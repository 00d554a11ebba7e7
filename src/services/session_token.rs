//! Session token signing
//!
//! Session ids are random UUIDs stored server-side. Clients receive them
//! signed as `<id>.<hex hmac-sha256(secret_key, id)>`, so a forged or
//! tampered token is rejected before any database lookup.

use anyhow::{anyhow, Result};
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies session tokens with the configured secret key.
#[derive(Clone)]
pub struct SessionSigner {
    mac: HmacSha256,
}

impl SessionSigner {
    pub fn new(secret_key: &str) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret_key.as_bytes())
            .map_err(|e| anyhow!("Invalid session signing key: {}", e))?;
        Ok(Self { mac })
    }

    /// Token handed to the client for `session_id`.
    pub fn sign(&self, session_id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(session_id.as_bytes());
        let signature = mac.finalize().into_bytes();
        format!("{}.{}", session_id, HEXLOWER.encode(&signature))
    }

    /// The session id inside `token`, if its signature is valid.
    pub fn verify(&self, token: &str) -> Option<String> {
        let (session_id, signature) = token.trim().rsplit_once('.')?;
        if session_id.is_empty() {
            return None;
        }
        let signature = HEXLOWER.decode(signature.as_bytes()).ok()?;

        let mut mac = self.mac.clone();
        mac.update(session_id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(session_id.to_string())
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionSigner { .. }")
    }
}
