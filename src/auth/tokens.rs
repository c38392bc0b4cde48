// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! RS256 token codec.
//!
//! The private key signs, the public key verifies. Verification tells an
//! expired token apart from a forged or malformed one, which drives the
//! silent refresh in the identity middleware.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Outcome of verifying a token.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification<C> {
    /// Signature and expiry check out.
    Valid(C),
    /// Signature checks out but the token is past its expiry.
    Expired,
    /// Forged, malformed, or signed by another key.
    Invalid,
}

/// Registered timing claims wrapped around the application claims.
#[derive(Serialize, Deserialize)]
struct Envelope<C> {
    #[serde(flatten)]
    claims: C,
    iat: i64,
    exp: i64,
}

/// Signs and verifies tokens with a fixed RSA key pair.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Build a codec from a PEM private key (PKCS#1 or PKCS#8) and PEM public key.
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, TokenError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|e| TokenError::InvalidKey(format!("private key: {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem)
            .map_err(|e| TokenError::InvalidKey(format!("public key: {e}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;

        Ok(Self {
            encoding,
            decoding,
            validation,
        })
    }

    /// Sign `claims` with an expiry `ttl` from now.
    pub fn sign<C: Serialize>(&self, claims: &C, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let envelope = Envelope {
            claims,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(
            &Header::new(Algorithm::RS256),
            &envelope,
            &self.encoding,
        )?)
    }

    /// Verify a token and decode its claims.
    pub fn verify<C: DeserializeOwned>(&self, token: &str) -> Verification<C> {
        match decode::<Envelope<C>>(token, &self.decoding, &self.validation) {
            Ok(data) => Verification::Valid(data.claims.claims),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => Verification::Expired,
            Err(e) => {
                tracing::debug!(error = %e, "rejected token");
                Verification::Invalid
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const PRIVATE_KEY: &str = include_str!("testdata/private.pem");
    const PUBLIC_KEY: &str = include_str!("testdata/public.pem");
    const OTHER_PRIVATE_KEY: &str = include_str!("testdata/other_private.pem");

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        sub: String,
        scopes: Vec<String>,
    }

    fn codec() -> TokenCodec {
        TokenCodec::from_pem(PRIVATE_KEY.as_bytes(), PUBLIC_KEY.as_bytes()).unwrap()
    }

    fn sample() -> Sample {
        Sample {
            sub: "user-1".into(),
            scopes: vec!["coins:read".into()],
        }
    }

    #[test]
    fn sign_then_verify_returns_same_claims() {
        let codec = codec();
        let token = codec.sign(&sample(), Duration::minutes(15)).unwrap();
        assert_eq!(codec.verify::<Sample>(&token), Verification::Valid(sample()));
    }

    #[test]
    fn past_expiry_is_reported_as_expired() {
        let codec = codec();
        let token = codec.sign(&sample(), Duration::hours(-1)).unwrap();
        assert_eq!(codec.verify::<Sample>(&token), Verification::Expired);
    }

    #[test]
    fn expiry_within_leeway_is_still_valid() {
        let codec = codec();
        let token = codec.sign(&sample(), Duration::seconds(-10)).unwrap();
        assert!(matches!(codec.verify::<Sample>(&token), Verification::Valid(_)));
    }

    #[test]
    fn token_from_another_key_is_invalid() {
        let foreign =
            TokenCodec::from_pem(OTHER_PRIVATE_KEY.as_bytes(), PUBLIC_KEY.as_bytes()).unwrap();
        let token = foreign.sign(&sample(), Duration::minutes(15)).unwrap();
        assert_eq!(codec().verify::<Sample>(&token), Verification::Invalid);

        // An expired forgery must not be mistaken for a refreshable token
        let expired = foreign.sign(&sample(), Duration::hours(-1)).unwrap();
        assert_eq!(codec().verify::<Sample>(&expired), Verification::Invalid);
    }

    #[test]
    fn tampered_payload_is_invalid() {
        let codec = codec();
        let token = codec.sign(&sample(), Duration::minutes(15)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged_claims = serde_json::json!({
            "sub": "someone-else",
            "scopes": ["countries:delete"],
            "iat": 0,
            "exp": 9_999_999_999i64,
        });
        let forged_payload = URL_SAFE_NO_PAD.encode(forged_claims.to_string());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(codec.verify::<Sample>(&forged), Verification::Invalid);
    }

    #[test]
    fn garbage_is_invalid() {
        assert_eq!(codec().verify::<Sample>("not-a-token"), Verification::Invalid);
        assert_eq!(codec().verify::<Sample>(""), Verification::Invalid);
    }

    #[test]
    fn bad_pem_is_rejected() {
        let err = TokenCodec::from_pem(b"nope", PUBLIC_KEY.as_bytes()).err().unwrap();
        assert!(matches!(err, TokenError::InvalidKey(_)));
    }
}
