//! Inbound request authentication for Data Connector deliveries.
//!
//! The platform signs each delivery with an HS256 JWT carried in a
//! configurable header. The JWT's `checksum` claim is the lowercase hex
//! SHA-1 digest of the exact raw body bytes, and its `exp` claim bounds
//! how long a captured delivery could be replayed.
//!
//! Verification fails closed: a missing header, a malformed or expired
//! token, a bad JWT signature, or a checksum mismatch all reject the
//! request before anything downstream runs.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

use sl_domain::error::{Error, Result};

/// Claims carried by the signature token.
#[derive(Debug, Deserialize)]
struct SignatureClaims {
    checksum: String,
}

/// Verify that `body` was signed by the holder of `secret`.
///
/// `signature` is the raw value of the signature header, or `None` when
/// the header was absent. `leeway_secs` is the clock-skew allowance for
/// the token's `exp` check.
pub fn verify(
    body: &[u8],
    signature: Option<&str>,
    secret: &str,
    leeway_secs: u64,
) -> Result<()> {
    let token = signature.ok_or_else(|| Error::Signature("missing signature header".into()))?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = leeway_secs;
    validation.set_required_spec_claims(&["exp"]);
    validation.validate_aud = false;

    let decoded = jsonwebtoken::decode::<SignatureClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| Error::Signature(format!("invalid signature token: {e}")))?;

    let digest = hex::encode(Sha1::digest(body));

    // Constant-time comparison so a mismatch reveals nothing about where
    // the digests diverge.
    if digest
        .as_bytes()
        .ct_eq(decoded.claims.checksum.as_bytes())
        .unwrap_u8()
        != 1
    {
        return Err(Error::Signature("body checksum mismatch".into()));
    }

    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
