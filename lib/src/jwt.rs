//! JWT proofs issued by did:infra identities.
//!
//! Only the compact serialization is supported, signed with `ES256K` (or its recoverable
//! variant `ES256K-R`). A token is valid when its signature matches a secp256k1 key the issuer's
//! resolved document lists for the requested proof purpose and its time claims hold.
//!
//! ```rust
//! use std::sync::Arc;
//! use lib_didinfra::{jwt::{create_jwt, decode_jwt, Es256kSigner, JwtHeader, JwtOptions, JwtPayload}, types::PrivateKey};
//!
//! # tokio_test::block_on(async {
//! let options = JwtOptions {
//!     issuer: "did:infra:01:alice".to_string(),
//!     expires_in: Some(3600),
//!     signer: Some(Arc::new(Es256kSigner::new(PrivateKey::random()))),
//!     canonicalize: false,
//! };
//! let token = create_jwt(JwtPayload::default(), &options, JwtHeader::default()).await.unwrap();
//! let decoded = decode_jwt(&token).unwrap();
//! assert_eq!(decoded.payload.iss.as_deref(), Some("did:infra:01:alice"));
//! # })
//! ```

mod issuer;
mod jws;
mod signer;
mod verifier;

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub use issuer::*;
pub use jws::*;
pub use signer::*;
pub use verifier::*;

use crate::error::JwtError;

/// Issuer of tokens whose subject is identified by the `sub` claim
pub const SELF_ISSUED_V2: &str = "https://self-issued.me/v2";
/// Issuer of tokens whose subject is identified by the `did` claim
pub const SELF_ISSUED_V1: &str = "https://self-issued.me";
/// Default tolerance, in seconds, applied to `nbf`, `iat` and `exp`
pub const DEFAULT_SKEW_SECONDS: i64 = 300;

/// JWS signature algorithms understood for did:infra keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    /// secp256k1 with SHA-256, signature is `r ‖ s`
    #[default]
    ES256K,
    /// secp256k1 with SHA-256, signature is `r ‖ s ‖ recovery id`
    ES256KR,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::ES256K => "ES256K",
            Algorithm::ES256KR => "ES256K-R",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ES256K" => Ok(Algorithm::ES256K),
            "ES256K-R" => Ok(Algorithm::ES256KR),
            other => Err(JwtError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// The JOSE header of a token
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct JwtHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// The `aud` claim, either a single audience or several
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// Registered claims used by the method, times in seconds since the epoch.
/// Any other claim is kept in `extra`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct JwtPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "numeric_date"
    )]
    pub iat: Option<i64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "numeric_date"
    )]
    pub nbf: Option<i64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "numeric_date"
    )]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// NumericDate claims may carry fractional seconds, which are truncated
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumericDate {
        Seconds(i64),
        Fractional(f64),
    }

    match Option::<NumericDate>::deserialize(deserializer)? {
        Some(NumericDate::Seconds(seconds)) => Ok(Some(seconds)),
        Some(NumericDate::Fractional(seconds)) if seconds.is_finite() => {
            Ok(Some(seconds.trunc() as i64))
        }
        Some(NumericDate::Fractional(seconds)) => Err(de::Error::custom(format!(
            "invalid NumericDate {seconds}"
        ))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!(Algorithm::from_str("ES256K").unwrap(), Algorithm::ES256K);
        assert_eq!(Algorithm::from_str("ES256K-R").unwrap(), Algorithm::ES256KR);
        assert!(matches!(
            Algorithm::from_str("HS256"),
            Err(JwtError::UnsupportedAlgorithm(alg)) if alg == "HS256"
        ));
    }

    #[test]
    fn test_payload_extra_claims() {
        let payload: JwtPayload = serde_json::from_value(json!({
            "iss": "did:infra:01:alice",
            "aud": ["https://a.example", "https://b.example"],
            "iat": 10,
            "vc": {"type": ["VerifiableCredential"]}
        }))
        .unwrap();
        assert_eq!(payload.iat, Some(10));
        assert!(payload.aud.as_ref().unwrap().contains("https://b.example"));
        assert_eq!(payload.extra["vc"], json!({"type": ["VerifiableCredential"]}));
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "iss": "did:infra:01:alice",
                "aud": ["https://a.example", "https://b.example"],
                "iat": 10,
                "vc": {"type": ["VerifiableCredential"]}
            })
        );
    }

    #[test]
    fn test_fractional_numeric_dates() {
        let payload: JwtPayload = serde_json::from_value(json!({
            "iat": 1700000000.5,
            "nbf": 1699999999,
            "exp": 1700003600.25
        }))
        .unwrap();
        assert_eq!(payload.iat, Some(1_700_000_000));
        assert_eq!(payload.nbf, Some(1_699_999_999));
        assert_eq!(payload.exp, Some(1_700_003_600));

        let null: JwtPayload = serde_json::from_value(json!({"exp": null})).unwrap();
        assert_eq!(null.exp, None);
        assert!(serde_json::from_value::<JwtPayload>(json!({"iat": "soon"})).is_err());
    }
}
