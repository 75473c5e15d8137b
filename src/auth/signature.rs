//! NEP-413 signed-message verification.
//!
//! The wallet signs the SHA-256 digest of a borsh-encoded payload:
//!
//! ```text
//! tag          u32 LE        2^31 + 413
//! message      u32 LE len ++ UTF-8 bytes
//! nonce        [u8; 32]
//! recipient    u32 LE len ++ UTF-8 bytes
//! callback_url 0u8 | 1u8 ++ u32 LE len ++ UTF-8 bytes
//! ```
//!
//! Every failure (bad key, bad base64, wrong nonce length, bad signature)
//! comes back as `false`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Domain tag identifying NEP-413 payloads.
pub const NEP413_TAG: u32 = (1 << 31) + 413;

const ED25519_PREFIX: &str = "ed25519:";

/// The structure a wallet signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePayload<'a> {
    pub message: &'a str,
    pub nonce: [u8; 32],
    pub recipient: &'a str,
    pub callback_url: Option<&'a str>,
}

impl<'a> SignaturePayload<'a> {
    pub fn new(message: &'a str, nonce: [u8; 32], recipient: &'a str) -> Self {
        Self {
            message,
            nonce,
            recipient,
            callback_url: None,
        }
    }

    #[must_use]
    pub fn with_callback_url(mut self, callback_url: Option<&'a str>) -> Self {
        self.callback_url = callback_url;
        self
    }

    /// Deterministic binary encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            4 + 4 + self.message.len() + 32 + 4 + self.recipient.len() + 1,
        );
        out.extend_from_slice(&NEP413_TAG.to_le_bytes());
        write_string(&mut out, self.message);
        out.extend_from_slice(&self.nonce);
        write_string(&mut out, self.recipient);
        match self.callback_url {
            Some(url) => {
                out.push(1);
                write_string(&mut out, url);
            }
            None => out.push(0),
        }
        out
    }

    /// The bytes that are actually signed.
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(self.encode()).into()
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Parse `ed25519:<base58>` or a bare base58 key.
pub fn parse_public_key(encoded: &str) -> Option<VerifyingKey> {
    let body = match encoded.strip_prefix(ED25519_PREFIX) {
        Some(body) => body,
        // Another curve
        None if encoded.contains(':') => return None,
        None => encoded,
    };
    let bytes = bs58::decode(body).into_vec().ok()?;
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

/// Verify `signature` (base64) over the payload built from the remaining
/// arguments. `nonce` must be exactly 32 bytes.
pub fn verify(
    public_key: &str,
    signature: &str,
    message: &str,
    nonce: &[u8],
    recipient: &str,
) -> bool {
    let Ok(nonce) = <[u8; 32]>::try_from(nonce) else {
        return false;
    };
    verify_payload(public_key, signature, &SignaturePayload::new(message, nonce, recipient))
}

pub fn verify_payload(public_key: &str, signature: &str, payload: &SignaturePayload<'_>) -> bool {
    let Some(key) = parse_public_key(public_key) else {
        return false;
    };
    let Ok(raw) = BASE64.decode(signature.trim()) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&raw) else {
        return false;
    };
    key.verify(&payload.digest(), &signature).is_ok()
}
