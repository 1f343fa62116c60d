//! Verification of tokens against the issuer's resolved DID document.
//!
//! Checks run in a fixed order and the first failure is returned: decoding, issuer, issuer DID,
//! document resolution, key selection, signature and finally the time and audience claims.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    decode_jwt, verify_signature, Algorithm, JwtDecoded, JwtPayload, DEFAULT_SKEW_SECONDS,
    SELF_ISSUED_V1, SELF_ISSUED_V2,
};
use crate::{
    error::{JwtError, ResolverError},
    resolver::{ledger::LedgerAccessor, Resolver},
    types::{
        DidDocument, DidResolutionResult, KeyCurve, KeyType, ProofPurpose, PublicKey,
        VerificationMethod,
    },
};

/// Anything that resolves DIDs to documents
#[async_trait]
pub trait DidResolver: Send + Sync {
    async fn resolve(&self, did: &str) -> Result<DidResolutionResult, ResolverError>;
}

#[async_trait]
impl<L: LedgerAccessor> DidResolver for Resolver<L> {
    async fn resolve(&self, did: &str) -> Result<DidResolutionResult, ResolverError> {
        self.resolve_did(did).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Relationship the signing key must be listed under, `authentication` if unset
    pub proof_purpose: Option<ProofPurpose>,
    /// Forces the `authentication` purpose
    pub auth: Option<bool>,
    pub audience: Option<String>,
    pub callback_url: Option<String>,
    /// Tolerance for `nbf`, `iat` and `exp`, 300 seconds if unset
    pub skew_seconds: Option<i64>,
    /// Seconds since the epoch to validate against instead of the current time
    pub now: Option<i64>,
}

impl VerifyOptions {
    fn purpose(&self) -> ProofPurpose {
        if self.auth == Some(true) {
            ProofPurpose::Authentication
        } else {
            self.proof_purpose.unwrap_or_default()
        }
    }
}

/// A token whose signature and claims checked out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedJwt {
    /// The DID that was resolved for the issuer
    pub issuer: String,
    pub resolution_result: DidResolutionResult,
    /// The verification method whose key produced the signature
    pub signer: VerificationMethod,
    pub jwt: String,
    pub payload: JwtPayload,
}

/// The DID a token's issuer stands for
fn issuer_did(decoded: &JwtDecoded) -> Result<String, JwtError> {
    let payload = &decoded.payload;
    let iss = payload.iss.as_deref().ok_or(JwtError::MissingIssuer)?;
    let did = match iss {
        SELF_ISSUED_V2 => payload
            .sub
            .clone()
            .or_else(|| {
                decoded
                    .header
                    .kid
                    .as_deref()
                    .and_then(|kid| kid.split('#').next())
                    .filter(|did| did.starts_with("did:"))
                    .map(str::to_string)
            })
            .ok_or(JwtError::MissingSubject)?,
        SELF_ISSUED_V1 => payload.did.clone().ok_or(JwtError::MissingDid)?,
        _ => iss.to_string(),
    };
    if did.is_empty() {
        return Err(JwtError::NoDidFound);
    }
    Ok(did)
}

/// Verification methods of `document` usable for `purpose`, in document order.
/// Documents without an `assertionMethod` relation accept any of their keys for assertions.
fn candidate_keys(document: &DidDocument, purpose: ProofPurpose) -> Vec<&VerificationMethod> {
    let relation = document.relationship(purpose);
    let fallback = purpose == ProofPurpose::AssertionMethod && relation.is_empty();
    document
        .verification_method
        .iter()
        .filter(|method| fallback || relation.contains(&method.id))
        .filter(|method| method.verification_type == KeyType::EcdsaSecp256k1VerificationKey2019)
        .collect()
}

fn check_claims(payload: &JwtPayload, options: &VerifyOptions) -> Result<(), JwtError> {
    let now = options
        .now
        .unwrap_or_else(|| chrono::Utc::now().timestamp());
    let skew = match options.skew_seconds {
        Some(skew) if skew >= 0 => skew,
        _ => DEFAULT_SKEW_SECONDS,
    };

    let latest = now.saturating_add(skew);
    if let Some(nbf) = payload.nbf {
        if nbf > latest {
            return Err(JwtError::NotYetValid {
                claim: "nbf",
                value: nbf,
            });
        }
    } else if let Some(iat) = payload.iat {
        if iat > latest {
            return Err(JwtError::NotYetValid {
                claim: "iat",
                value: iat,
            });
        }
    }
    if let Some(exp) = payload.exp {
        if exp <= now.saturating_sub(skew) {
            return Err(JwtError::Expired { exp, now });
        }
    }
    if payload.aud.is_some() && options.audience.is_none() && options.callback_url.is_none() {
        return Err(JwtError::AudienceConfigMissing);
    }
    Ok(())
}

/// Verify a compact token.
///
/// The issuer DID is `iss`, except for self-issued tokens where it is `sub` (or the DID part of
/// the header `kid`) for [`SELF_ISSUED_V2`] and the `did` claim for [`SELF_ISSUED_V1`]. Every
/// suitable key of the resolved document is tried in order and the first that verifies the
/// signature is returned as the signer.
///
/// A listed `aud` only requires an audience or callback url to be configured; matching it
/// against them is left to the caller.
#[tracing::instrument(level = "debug", skip_all)]
pub async fn verify_jwt<R: DidResolver + ?Sized>(
    jwt: &str,
    resolver: &R,
    options: &VerifyOptions,
) -> Result<VerifiedJwt, JwtError> {
    let decoded = decode_jwt(jwt)?;
    let did = issuer_did(&decoded)?;
    let purpose = options.purpose();
    let alg = decoded.header.alg.as_deref().unwrap_or_default();
    let algorithm: Algorithm = alg.parse()?;

    log::debug!("Verifying JWT from {did} for {purpose}");
    let resolution_result = resolver
        .resolve(&did)
        .await
        .map_err(|e| JwtError::ResolverError {
            did: did.clone(),
            message: e.to_string(),
        })?;
    let document = match (
        &resolution_result.resolution_metadata.error,
        &resolution_result.document,
    ) {
        (None, Some(document)) => document,
        (error, _) => {
            let message = resolution_result
                .resolution_metadata
                .message
                .clone()
                .or_else(|| error.map(|e| e.to_string()))
                .unwrap_or_else(|| "no document".to_string());
            return Err(JwtError::ResolverError { did, message });
        }
    };

    let candidates = candidate_keys(document, purpose);
    if candidates.is_empty() {
        return Err(JwtError::NoSuitableKey {
            did,
            alg: alg.to_string(),
            purpose,
        });
    }
    log::trace!("{} candidate keys for {did}", candidates.len());

    let signer = candidates
        .into_iter()
        .find(|method| {
            method
                .verification_properties
                .key_bytes()
                .and_then(|bytes| PublicKey::from_bytes(KeyCurve::K1, &bytes).ok())
                .map(|key| {
                    verify_signature(
                        algorithm,
                        decoded.data.as_bytes(),
                        &decoded.signature,
                        &key,
                    )
                })
                .unwrap_or(false)
        })
        .cloned()
        .ok_or(JwtError::NotVerified)?;

    check_claims(&decoded.payload, options)?;

    Ok(VerifiedJwt {
        issuer: did,
        resolution_result,
        signer,
        jwt: jwt.to_string(),
        payload: decoded.payload,
    })
}

#[cfg(test)]
mod tests {
    use std::{str::FromStr, sync::Arc};

    use super::*;
    use crate::{
        jwt::{create_jwt_at, Es256kSigner, JwtHeader, JwtOptions},
        resolver::tests::{resolver, scenario_ledger, OWNER_WIF, SUBJECT_KEY},
        types::{DidUrl, PrivateKey, VerificationMethodProperties},
    };
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn subject_did() -> String {
        format!("did:infra:testnet:{SUBJECT_KEY}")
    }

    /// Resolves every DID to the same stored result
    struct StaticResolver(DidResolutionResult);

    #[async_trait]
    impl DidResolver for StaticResolver {
        async fn resolve(&self, _did: &str) -> Result<DidResolutionResult, ResolverError> {
            Ok(self.0.clone())
        }
    }

    async fn token(key: &PrivateKey, payload: JwtPayload, issuer: &str) -> String {
        let options = JwtOptions {
            issuer: issuer.to_string(),
            expires_in: None,
            signer: Some(Arc::new(Es256kSigner::new(key.clone()))),
            canonicalize: false,
        };
        create_jwt_at(payload, &options, JwtHeader::default(), NOW)
            .await
            .unwrap()
    }

    fn at_now() -> VerifyOptions {
        VerifyOptions {
            now: Some(NOW),
            ..Default::default()
        }
    }

    /// A document controlled by `controller`, listing `extra` as an additional key outside
    /// every relationship
    fn document_with_extra_key(controller: &PrivateKey, extra: &PrivateKey) -> DidResolutionResult {
        let id = DidUrl::parse(subject_did()).unwrap();
        let mut builder = DidDocument::infra_builder();
        builder.id(id.clone());
        builder.controller_key(controller.public_key().as_bytes());
        let mut document = builder.build().unwrap();
        document.verification_method.push(VerificationMethod {
            id: id.with_fragment(Some("extra")),
            controller: id,
            verification_type: KeyType::EcdsaSecp256k1VerificationKey2019,
            verification_properties: VerificationMethodProperties::PublicKeyHex {
                public_key_hex: extra.public_key().to_hex(),
            },
        });
        DidResolutionResult::resolved(document, false)
    }

    #[tokio::test]
    async fn test_verify_issued_token() {
        let resolver = resolver(scenario_ledger(3, json!({})), false);
        let key = PrivateKey::from_str(OWNER_WIF).unwrap();
        let jwt = token(&key, JwtPayload::default(), &subject_did()).await;

        let verified = verify_jwt(&jwt, &resolver, &at_now()).await.unwrap();
        assert_eq!(verified.issuer, subject_did());
        assert_eq!(verified.jwt, jwt);
        assert_eq!(
            verified.signer.id.to_string(),
            format!("{}#controller", subject_did())
        );
        assert_eq!(verified.payload.iat, Some(NOW));
    }

    #[tokio::test]
    async fn test_expiry_skew_boundary() {
        let resolver = resolver(scenario_ledger(3, json!({})), false);
        let key = PrivateKey::from_str(OWNER_WIF).unwrap();
        let skew = DEFAULT_SKEW_SECONDS;

        let expired = JwtPayload {
            exp: Some(NOW - skew - 1),
            ..Default::default()
        };
        let jwt = token(&key, expired, &subject_did()).await;
        assert!(matches!(
            verify_jwt(&jwt, &resolver, &at_now()).await,
            Err(JwtError::Expired { .. })
        ));

        let within = JwtPayload {
            exp: Some(NOW - skew + 1),
            ..Default::default()
        };
        let jwt = token(&key, within, &subject_did()).await;
        assert!(verify_jwt(&jwt, &resolver, &at_now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_not_yet_valid() {
        let resolver = resolver(scenario_ledger(3, json!({})), false);
        let key = PrivateKey::from_str(OWNER_WIF).unwrap();
        let payload = JwtPayload {
            nbf: Some(NOW + DEFAULT_SKEW_SECONDS + 1),
            ..Default::default()
        };
        let jwt = token(&key, payload, &subject_did()).await;
        assert!(matches!(
            verify_jwt(&jwt, &resolver, &at_now()).await,
            Err(JwtError::NotYetValid { claim: "nbf", .. })
        ));

        // iat is checked when nbf is absent
        let options = VerifyOptions {
            now: Some(NOW - DEFAULT_SKEW_SECONDS - 1),
            ..Default::default()
        };
        let jwt = token(&key, JwtPayload::default(), &subject_did()).await;
        assert!(matches!(
            verify_jwt(&jwt, &resolver, &options).await,
            Err(JwtError::NotYetValid { claim: "iat", .. })
        ));
    }

    #[tokio::test]
    async fn test_key_outside_authentication_rejected() {
        let controller = PrivateKey::random();
        let extra = PrivateKey::random();
        let resolver = StaticResolver(document_with_extra_key(&controller, &extra));
        let jwt = token(&extra, JwtPayload::default(), &subject_did()).await;

        assert!(matches!(
            verify_jwt(&jwt, &resolver, &at_now()).await,
            Err(JwtError::NotVerified)
        ));

        // without an assertionMethod relation every key may assert
        let options = VerifyOptions {
            proof_purpose: Some(ProofPurpose::AssertionMethod),
            ..at_now()
        };
        let verified = verify_jwt(&jwt, &resolver, &options).await.unwrap();
        assert_eq!(verified.signer.id.fragment(), Some("extra"));

        // auth forces the authentication relation back
        let options = VerifyOptions {
            auth: Some(true),
            ..options
        };
        assert!(matches!(
            verify_jwt(&jwt, &resolver, &options).await,
            Err(JwtError::NotVerified)
        ));
    }

    #[tokio::test]
    async fn test_no_suitable_key() {
        let key = PrivateKey::random();
        let mut result = document_with_extra_key(&key, &key);
        if let Some(document) = result.document.as_mut() {
            document.authentication.clear();
        }
        let resolver = StaticResolver(result);
        let jwt = token(&key, JwtPayload::default(), &subject_did()).await;

        let err = verify_jwt(&jwt, &resolver, &at_now()).await.unwrap_err();
        assert!(matches!(
            err,
            JwtError::NoSuitableKey {
                purpose: ProofPurpose::Authentication,
                ..
            }
        ));
        assert!(err.to_string().starts_with("no_suitable_keys"));
    }

    #[tokio::test]
    async fn test_issuer_claims() {
        let resolver = resolver(scenario_ledger(3, json!({})), false);
        let key = PrivateKey::from_str(OWNER_WIF).unwrap();

        let jwt = token(&key, JwtPayload::default(), "").await;
        assert!(matches!(
            verify_jwt(&jwt, &resolver, &at_now()).await,
            Err(JwtError::NoDidFound)
        ));

        let jwt = token(&key, JwtPayload::default(), SELF_ISSUED_V1).await;
        assert!(matches!(
            verify_jwt(&jwt, &resolver, &at_now()).await,
            Err(JwtError::MissingDid)
        ));

        let payload = JwtPayload {
            did: Some(subject_did()),
            ..Default::default()
        };
        let jwt = token(&key, payload, SELF_ISSUED_V1).await;
        let verified = verify_jwt(&jwt, &resolver, &at_now()).await.unwrap();
        assert_eq!(verified.issuer, subject_did());

        let payload = JwtPayload {
            sub: Some(subject_did()),
            ..Default::default()
        };
        let jwt = token(&key, payload, SELF_ISSUED_V2).await;
        let verified = verify_jwt(&jwt, &resolver, &at_now()).await.unwrap();
        assert_eq!(verified.issuer, subject_did());
    }

    #[tokio::test]
    async fn test_self_issued_v2_subject() {
        let resolver = resolver(scenario_ledger(3, json!({})), false);
        let key = PrivateKey::from_str(OWNER_WIF).unwrap();
        let signer: Arc<dyn crate::jwt::JwtSigner> = Arc::new(Es256kSigner::new(key));
        let options = JwtOptions {
            issuer: SELF_ISSUED_V2.to_string(),
            signer: Some(signer),
            ..Default::default()
        };

        // kid names the subject when sub is absent
        let header = JwtHeader {
            kid: Some(format!("{}#controller", subject_did())),
            ..Default::default()
        };
        let jwt = create_jwt_at(JwtPayload::default(), &options, header, NOW)
            .await
            .unwrap();
        let verified = verify_jwt(&jwt, &resolver, &at_now()).await.unwrap();
        assert_eq!(verified.issuer, subject_did());
    }

    #[tokio::test]
    async fn test_self_issued_v2_without_subject() {
        let resolver = resolver(scenario_ledger(3, json!({})), false);
        let key = PrivateKey::from_str(OWNER_WIF).unwrap();

        let jwt = token(&key, JwtPayload::default(), SELF_ISSUED_V2).await;
        assert!(matches!(
            verify_jwt(&jwt, &resolver, &at_now()).await,
            Err(JwtError::MissingSubject)
        ));

        // a kid that does not name a DID is no subject
        let options = JwtOptions {
            issuer: SELF_ISSUED_V2.to_string(),
            signer: Some(Arc::new(Es256kSigner::new(key))),
            ..Default::default()
        };
        let header = JwtHeader {
            kid: Some(format!("{SELF_ISSUED_V2}#controller")),
            ..Default::default()
        };
        let jwt = create_jwt_at(JwtPayload::default(), &options, header, NOW)
            .await
            .unwrap();
        assert!(matches!(
            verify_jwt(&jwt, &resolver, &at_now()).await,
            Err(JwtError::MissingSubject)
        ));
    }

    #[tokio::test]
    async fn test_extreme_clock_does_not_overflow() {
        let resolver = resolver(scenario_ledger(3, json!({})), false);
        let key = PrivateKey::from_str(OWNER_WIF).unwrap();
        let payload = JwtPayload {
            exp: Some(i64::MAX),
            ..Default::default()
        };
        let jwt = token(&key, payload, &subject_did()).await;
        let options = VerifyOptions {
            now: Some(i64::MAX),
            skew_seconds: Some(i64::MAX),
            ..Default::default()
        };
        assert!(verify_jwt(&jwt, &resolver, &options).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_issuer_and_malformed() {
        let resolver = resolver(scenario_ledger(3, json!({})), false);
        assert!(matches!(
            verify_jwt("not.a.jwt!", &resolver, &at_now()).await,
            Err(JwtError::MalformedToken(_))
        ));

        let header = r#"{"alg":"ES256K"}"#;
        let jwt = crate::jwt::encode_jws(
            &crate::jwt::signing_input(
                &serde_json::from_str::<JwtHeader>(header).unwrap(),
                &json!({"sub": "x"}),
            )
            .unwrap(),
            &[0u8; 64],
        )
        .unwrap();
        let err = verify_jwt(&jwt, &resolver, &at_now()).await.unwrap_err();
        assert!(matches!(err, JwtError::MissingIssuer));
        assert_eq!(err.to_string(), "invalid_jwt: JWT iss is required");
    }

    #[tokio::test]
    async fn test_unresolvable_issuer() {
        let resolver = resolver(scenario_ledger(3, json!({})), false);
        let key = PrivateKey::from_str(OWNER_WIF).unwrap();
        let issuer = format!("did:infra:mainnet:{SUBJECT_KEY}");
        let jwt = token(&key, JwtPayload::default(), &issuer).await;

        let err = verify_jwt(&jwt, &resolver, &at_now()).await.unwrap_err();
        assert!(matches!(err, JwtError::ResolverError { ref did, .. } if *did == issuer));
        assert!(err
            .to_string()
            .starts_with("resolver_error: Unable to resolve DID document for did:infra:mainnet:"));
    }

    #[tokio::test]
    async fn test_audience_requires_configuration() {
        let resolver = resolver(scenario_ledger(3, json!({})), false);
        let key = PrivateKey::from_str(OWNER_WIF).unwrap();
        let payload = JwtPayload {
            aud: Some(crate::jwt::Audience::Single("https://app.example".into())),
            ..Default::default()
        };
        let jwt = token(&key, payload, &subject_did()).await;

        assert!(matches!(
            verify_jwt(&jwt, &resolver, &at_now()).await,
            Err(JwtError::AudienceConfigMissing)
        ));
        let options = VerifyOptions {
            audience: Some("https://app.example".into()),
            ..at_now()
        };
        assert!(verify_jwt(&jwt, &resolver, &options).await.is_ok());
    }
}
