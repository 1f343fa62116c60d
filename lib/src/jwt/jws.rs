//! Compact JWS serialization, `<header>.<payload>.<signature>` in unpadded base64url

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use serde::Serialize;

use super::{JwtHeader, JwtPayload};
use crate::error::JwtError;

peg::parser! {
    grammar jws_parser() for str {
        rule segment() -> &'input str
            = $(['A'..='Z' | 'a'..='z' | '0'..='9' | '_' | '-']+)

        /// Exactly three non-empty base64url segments separated by `.`
        pub rule compact() -> (&'input str, &'input str, &'input str)
            = h:segment() "." p:segment() "." s:segment() ![_] { (h, p, s) }
    }
}

/// The three segments of a compact token, still encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwsCompact {
    pub header_segment: String,
    pub payload_segment: String,
    pub signature_segment: String,
}

impl JwsCompact {
    /// Split a token into its segments, rejecting anything but the three segment form
    pub fn decode(token: &str) -> Result<Self, JwtError> {
        let (header, payload, signature) =
            jws_parser::compact(token).map_err(|e| JwtError::MalformedToken(e.to_string()))?;
        Ok(Self {
            header_segment: header.to_string(),
            payload_segment: payload.to_string(),
            signature_segment: signature.to_string(),
        })
    }

    /// Encode raw header, payload and signature bytes. Empty parts have no compact form.
    pub fn encode(header: &[u8], payload: &[u8], signature: &[u8]) -> Result<Self, JwtError> {
        for (name, part) in [("header", header), ("payload", payload), ("signature", signature)] {
            if part.is_empty() {
                return Err(JwtError::MalformedToken(format!("{name} must not be empty")));
            }
        }
        Ok(Self {
            header_segment: BASE64_URL.encode(header),
            payload_segment: BASE64_URL.encode(payload),
            signature_segment: BASE64_URL.encode(signature),
        })
    }

    pub fn to_token(&self) -> String {
        format!("{}.{}", self.signing_input(), self.signature_segment)
    }

    /// The bytes covered by the signature, `<header>.<payload>`
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header_segment, self.payload_segment)
    }

    pub fn header_bytes(&self) -> Result<Vec<u8>, JwtError> {
        decode_segment(&self.header_segment)
    }

    pub fn payload_bytes(&self) -> Result<Vec<u8>, JwtError> {
        decode_segment(&self.payload_segment)
    }

    pub fn signature_bytes(&self) -> Result<Vec<u8>, JwtError> {
        decode_segment(&self.signature_segment)
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, JwtError> {
    BASE64_URL
        .decode(segment)
        .map_err(|e| JwtError::MalformedToken(e.to_string()))
}

/// Join an encoded signing input and a signature into a token
pub fn encode_jws(signing_input: &str, signature: &[u8]) -> Result<String, JwtError> {
    if signature.is_empty() {
        return Err(JwtError::MalformedToken("signature must not be empty".into()));
    }
    Ok(format!("{}.{}", signing_input, BASE64_URL.encode(signature)))
}

/// `<base64url(header)>.<base64url(payload)>`
pub fn signing_input<T: Serialize>(header: &JwtHeader, payload: &T) -> Result<String, JwtError> {
    let header = serde_json::to_vec(header).map_err(|e| JwtError::MalformedToken(e.to_string()))?;
    let payload =
        serde_json::to_vec(payload).map_err(|e| JwtError::MalformedToken(e.to_string()))?;
    Ok(format!(
        "{}.{}",
        BASE64_URL.encode(header),
        BASE64_URL.encode(payload)
    ))
}

/// A token split and decoded, with the signing input kept for verification
#[derive(Debug, Clone, PartialEq)]
pub struct JwtDecoded {
    pub header: JwtHeader,
    pub payload: JwtPayload,
    pub signature: Vec<u8>,
    /// `<header>.<payload>` as found in the token
    pub data: String,
}

/// Decode a compact token without verifying it.
///
/// # Errors
/// [`JwtError::MalformedToken`] unless the token is three base64url segments whose first two
/// hold a JSON header and payload.
pub fn decode_jwt(token: &str) -> Result<JwtDecoded, JwtError> {
    let jws = JwsCompact::decode(token)?;
    let header = serde_json::from_slice(&jws.header_bytes()?)
        .map_err(|e| JwtError::MalformedToken(format!("header: {e}")))?;
    let payload = serde_json::from_slice(&jws.payload_bytes()?)
        .map_err(|e| JwtError::MalformedToken(format!("payload: {e}")))?;
    Ok(JwtDecoded {
        header,
        payload,
        signature: jws.signature_bytes()?,
        data: jws.signing_input(),
    })
}
