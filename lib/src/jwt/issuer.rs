use std::sync::Arc;

use serde_json::Value;

use super::{
    encode_jws, signing_input, Algorithm, JwtHeader, JwtPayload, JwtSigner, SELF_ISSUED_V1,
    SELF_ISSUED_V2,
};
use crate::{error::JwtError, types::CONTROLLER_FRAGMENT};

/// Options for [`create_jwt`]
#[derive(Clone, Default)]
pub struct JwtOptions {
    /// Written to `iss`, replacing any issuer already in the payload
    pub issuer: String,
    /// Lifetime in seconds, counted from `nbf` when the payload has one
    pub expires_in: Option<i64>,
    pub signer: Option<Arc<dyn JwtSigner>>,
    /// Serialize the payload with its keys sorted
    pub canonicalize: bool,
}

/// Issue a compact token for `payload`, signed by `options.signer`.
///
/// `iat` is set to the current time. Unset header fields default to `typ: JWT`, the signer's
/// algorithm and `kid: <issuer>#controller`. Self-issued tokens get no default `kid`.
pub async fn create_jwt(
    payload: JwtPayload,
    options: &JwtOptions,
    header: JwtHeader,
) -> Result<String, JwtError> {
    create_jwt_at(payload, options, header, chrono::Utc::now().timestamp()).await
}

/// [`create_jwt`] with a fixed issuing time
pub async fn create_jwt_at(
    mut payload: JwtPayload,
    options: &JwtOptions,
    mut header: JwtHeader,
    now: i64,
) -> Result<String, JwtError> {
    let signer = options
        .signer
        .as_ref()
        .ok_or(JwtError::SigningUnavailable)?;

    payload.iat = Some(now);
    if let Some(expires_in) = options.expires_in {
        payload.exp = Some(payload.nbf.unwrap_or(now).saturating_add(expires_in));
    }
    payload.iss = Some(options.issuer.clone());

    let alg = header
        .alg
        .get_or_insert_with(|| signer.algorithm().as_str().to_string());
    alg.parse::<Algorithm>()?;
    header.typ.get_or_insert_with(|| "JWT".to_string());
    if header.kid.is_none() && !matches!(options.issuer.as_str(), SELF_ISSUED_V1 | SELF_ISSUED_V2)
    {
        header.kid = Some(format!("{}#{}", options.issuer, CONTROLLER_FRAGMENT));
    }

    let input = if options.canonicalize {
        // serde_json maps are ordered by key
        let canonical: Value = serde_json::to_value(&payload)
            .map_err(|e| JwtError::MalformedToken(e.to_string()))?;
        signing_input(&header, &canonical)?
    } else {
        signing_input(&header, &payload)?
    };

    log::debug!("Signing JWT for {} with {:?}", options.issuer, header.alg);
    let signature = signer.sign(input.as_bytes()).await?;
    encode_jws(&input, &signature)
}

/// Issues tokens on behalf of a single DID
#[derive(Clone)]
pub struct JwtIssuer {
    pub did: String,
    pub alg: Algorithm,
    pub signer: Arc<dyn JwtSigner>,
}

impl JwtIssuer {
    pub fn new(did: String, signer: Arc<dyn JwtSigner>) -> Self {
        Self {
            did,
            alg: signer.algorithm(),
            signer,
        }
    }

    /// Issue a token with `iss` set to this DID
    pub async fn issue(
        &self,
        payload: JwtPayload,
        expires_in: Option<i64>,
    ) -> Result<String, JwtError> {
        let options = JwtOptions {
            issuer: self.did.clone(),
            expires_in,
            signer: Some(self.signer.clone()),
            canonicalize: false,
        };
        let header = JwtHeader {
            alg: Some(self.alg.as_str().to_string()),
            ..Default::default()
        };
        create_jwt(payload, &options, header).await
    }
}
