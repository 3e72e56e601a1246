//! LINE webhook signature verification.
//!
//! LINE signs each delivery with base64(HMAC-SHA256(channel_secret, body)) and
//! sends it in the `x-line-signature` header.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{Error, Result};

pub const SIGNATURE_HEADER: &str = "x-line-signature";

type HmacSha256 = Hmac<Sha256>;

/// Compute the signature LINE would send for `body`.
pub fn sign(channel_secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .map_err(|e| Error::Signature(format!("Unusable channel secret: {}", e)))?;
    mac.update(body);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Check `signature` against `body`. Comparison is constant-time.
pub fn verify(channel_secret: &str, signature: Option<&str>, body: &[u8]) -> Result<()> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Signature("Missing signature header".to_string()))?;

    let provided = STANDARD
        .decode(signature)
        .map_err(|_| Error::Signature("Signature is not valid base64".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .map_err(|e| Error::Signature(format!("Unusable channel secret: {}", e)))?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| Error::Signature("Signature mismatch".to_string()))
}
