//! Unverified claims peek into compact JWTs.
//!
//! The signature is deliberately not verified: the token is only inspected
//! to learn its issuer, authentication happens at the STS endpoint.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde_json::Value;

use fedtoken_core::{Error, Result};

/// Returns the `iss` claim of the token.
pub(crate) fn issuer(token: &str) -> Result<String> {
    let claims = parse_claims(token)?;

    match claims.get("iss") {
        Some(Value::String(iss)) => Ok(iss.clone()),
        Some(_) => Err(Error::malformed_subject_token(
            "issuer claim in the token is not a string",
        )),
        None => Err(Error::malformed_subject_token(
            "no iss in the token claims",
        )),
    }
}

fn parse_claims(token: &str) -> Result<serde_json::Map<String, Value>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::malformed_subject_token(format!(
            "token contains an invalid number of segments: {}, expected: 3",
            parts.len()
        )));
    }

    let claim_bytes = decode_segment(parts[1])?;

    serde_json::from_slice(&claim_bytes)
        .map_err(|e| Error::malformed_subject_token("failed to decode the JWT claims").with_source(e))
}

fn decode_segment(segment: &str) -> Result<Vec<u8>> {
    let mut segment = segment.to_string();
    let remainder = segment.len() % 4;
    if remainder > 0 {
        segment.push_str(&"=".repeat(4 - remainder));
    }

    URL_SAFE
        .decode(segment)
        .map_err(|e| Error::malformed_subject_token("failed to decode the JWT payload").with_source(e))
}
