//! Signed session credentials.
//!
//! Token layout: `v1.<payload>.<mac>`, both parts base64url without
//! padding. The payload is JSON `{uid, acct, iat, exp}` (unix seconds); the
//! MAC is HMAC-SHA256 over `v1.<payload>`. A token either verifies
//! completely or is treated as absent.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::validation::MIN_SESSION_SECRET_BYTES;
use crate::error::GateError;

type HmacSha256 = Hmac<Sha256>;

const VERSION: &str = "v1";

/// Longest token `verify` will look at.
pub const MAX_TOKEN_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "uid")]
    pub user_id: String,
    #[serde(rename = "acct")]
    pub account_id: String,
    #[serde(rename = "iat")]
    pub issued_at: u64,
    #[serde(rename = "exp")]
    pub expires_at: u64,
}

impl Credential {
    pub fn lifetime(&self) -> u64 {
        self.expires_at.saturating_sub(self.issued_at)
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub struct SessionCodec {
    mac: HmacSha256,
    lifetime_secs: u64,
}

impl SessionCodec {
    pub fn new(secret: &[u8], lifetime: Duration) -> Result<Self, GateError> {
        if secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(GateError::Internal(format!(
                "session secret must be at least {MIN_SESSION_SECRET_BYTES} bytes"
            )));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| GateError::Internal(format!("session key: {e}")))?;
        Ok(Self {
            mac,
            lifetime_secs: lifetime.as_secs().max(1),
        })
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }

    pub fn issue(&self, user_id: &str, account_id: &str) -> Result<String, GateError> {
        self.issue_at(user_id, account_id, unix_now())
    }

    pub fn issue_at(&self, user_id: &str, account_id: &str, now: u64) -> Result<String, GateError> {
        self.encode(&self.credential_at(user_id, account_id, now))
    }

    /// A credential starting at `now` with this codec's lifetime.
    pub fn credential_at(&self, user_id: &str, account_id: &str, now: u64) -> Credential {
        Credential {
            user_id: user_id.to_string(),
            account_id: account_id.to_string(),
            issued_at: now,
            expires_at: now.saturating_add(self.lifetime_secs),
        }
    }

    /// Sign `credential` into a token.
    pub fn encode(&self, credential: &Credential) -> Result<String, GateError> {
        let json = serde_json::to_vec(credential)
            .map_err(|e| GateError::Internal(format!("session encode: {e}")))?;

        let signed = format!("{VERSION}.{}", B64URL.encode(json));
        let tag = self.sign(signed.as_bytes());
        Ok(format!("{signed}.{}", B64URL.encode(tag)))
    }

    pub fn verify(&self, token: &str) -> Option<Credential> {
        self.verify_at(token, unix_now())
    }

    /// Valid while `now < expires_at`.
    pub fn verify_at(&self, token: &str, now: u64) -> Option<Credential> {
        if token.len() > MAX_TOKEN_LEN {
            return None;
        }

        let (signed, tag) = token.rsplit_once('.')?;
        let (version, payload) = signed.split_once('.')?;
        if version != VERSION {
            return None;
        }

        let tag = B64URL.decode(tag).ok()?;
        let mut mac = self.mac.clone();
        mac.update(signed.as_bytes());
        mac.verify_slice(&tag).ok()?;

        let json = B64URL.decode(payload).ok()?;
        let credential: Credential = serde_json::from_slice(&json).ok()?;
        if credential.expires_at <= credential.issued_at || now >= credential.expires_at {
            return None;
        }
        Some(credential)
    }

    pub fn should_rotate(&self, credential: &Credential) -> bool {
        self.should_rotate_at(credential, unix_now())
    }

    /// True once more than half the credential's lifetime has elapsed.
    pub fn should_rotate_at(&self, credential: &Credential, now: u64) -> bool {
        let elapsed = now.saturating_sub(credential.issued_at);
        elapsed.saturating_mul(2) > credential.lifetime()
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const T0: u64 = 1_700_000_000;
    const LIFETIME: u64 = 3600;

    fn codec() -> SessionCodec {
        SessionCodec::new(SECRET, Duration::from_secs(LIFETIME)).unwrap()
    }

    #[test]
    fn test_short_secret_refused() {
        assert!(SessionCodec::new(b"short", Duration::from_secs(60)).is_err());
    }

    #[test]
    fn test_validity_window() {
        let codec = codec();
        let token = codec.issue_at("user-1", "alice.near", T0).unwrap();

        for t in [T0, T0 + 1, T0 + LIFETIME / 2, T0 + LIFETIME - 1] {
            let cred = codec.verify_at(&token, t).expect("should verify inside lifetime");
            assert_eq!(cred.user_id, "user-1");
            assert_eq!(cred.account_id, "alice.near");
            assert_eq!(cred.expires_at, T0 + LIFETIME);
        }
        assert!(codec.verify_at(&token, T0 + LIFETIME).is_none());
        assert!(codec.verify_at(&token, T0 + LIFETIME * 10).is_none());
    }

    #[test]
    fn test_rotation_after_half_life() {
        let codec = codec();
        let token = codec.issue_at("u", "alice.near", T0).unwrap();
        let cred = codec.verify_at(&token, T0).unwrap();

        assert!(!codec.should_rotate_at(&cred, T0));
        assert!(!codec.should_rotate_at(&cred, T0 + LIFETIME / 2 - 1));
        assert!(!codec.should_rotate_at(&cred, T0 + LIFETIME / 2));
        assert!(codec.should_rotate_at(&cred, T0 + LIFETIME / 2 + 1));
    }

    #[test]
    fn test_tampering_rejected() {
        let codec = codec();
        let token = codec.issue_at("u", "alice.near", T0).unwrap();
        let (signed, tag) = token.rsplit_once('.').unwrap();

        // Forge a payload for another account, keep the old tag
        let forged_json = br#"{"uid":"u","acct":"bob.near","iat":1700000000,"exp":1700003600}"#;
        let forged = format!("v1.{}.{tag}", B64URL.encode(forged_json));
        assert!(codec.verify_at(&forged, T0).is_none());

        let mut bad_tag = B64URL.decode(tag).unwrap();
        bad_tag[0] ^= 0xff;
        let bad = format!("{signed}.{}", B64URL.encode(bad_tag));
        assert!(codec.verify_at(&bad, T0).is_none());

        let v2 = token.replacen("v1.", "v2.", 1);
        assert!(codec.verify_at(&v2, T0).is_none());
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = codec().issue_at("u", "alice.near", T0).unwrap();
        let other = SessionCodec::new(&[7u8; 32], Duration::from_secs(LIFETIME)).unwrap();
        assert!(other.verify_at(&token, T0).is_none());
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let codec = codec();
        for token in ["", "v1", "v1.abc", "v1..", "not.a.token", "v1.%%%.%%%"] {
            assert!(codec.verify_at(token, T0).is_none(), "{token:?}");
        }
        assert!(codec.verify_at(&"a".repeat(MAX_TOKEN_LEN + 1), T0).is_none());
    }
}
