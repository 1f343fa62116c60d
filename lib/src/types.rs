//! Type Definitions adhering to the [DID Specification](https://www.w3.org/TR/did-core/#abstract)
//! and the `did:infra` method, whose identifiers live on an EOSIO-family ledger.

mod did_parser;
mod did_url;
mod eosio;
mod infra;

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub use did_parser::*;
pub use did_url::*;
pub use eosio::*;
pub use infra::*;

/// The only `@context` entry emitted by resolution
pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// Content type of a successfully resolved document
pub const DID_LD_JSON: &str = "application/did+ld+json";

/// A DID Document, based on the did specification, [DID Document Properties](https://www.w3.org/TR/did-core/#did-document-properties)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<Url>,
    pub id: DidUrl,
    #[serde(
        default,
        rename = "verificationMethod",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub verification_method: Vec<VerificationMethod>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authentication: Vec<DidUrl>,
    #[serde(
        default,
        rename = "assertionMethod",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub assertion_method: Vec<DidUrl>,
    #[serde(
        default,
        rename = "keyAgreement",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub key_agreement: Vec<DidUrl>,
    #[serde(
        default,
        rename = "capabilityInvocation",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub capability_invocation: Vec<DidUrl>,
    #[serde(
        default,
        rename = "capabilityDelegation",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub capability_delegation: Vec<DidUrl>,
    /// Omitted entirely, rather than emitted empty, when the subject has no service attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service>>,
}

impl DidDocument {
    pub fn infra_builder() -> InfraBuilder {
        InfraBuilder::default()
    }

    /// The relationship list on this document for a proof purpose
    pub fn relationship(&self, purpose: ProofPurpose) -> &[DidUrl] {
        match purpose {
            ProofPurpose::Authentication => &self.authentication,
            ProofPurpose::AssertionMethod => &self.assertion_method,
            ProofPurpose::CapabilityInvocation => &self.capability_invocation,
            ProofPurpose::CapabilityDelegation => &self.capability_delegation,
        }
    }

    /// Find a verification method by its id
    pub fn verification_method_by_id(&self, id: &DidUrl) -> Option<&VerificationMethod> {
        self.verification_method.iter().find(|m| &m.id == id)
    }
}

/// Represents a service associated with a DID.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Service {
    /// The unique identifier of the service, `<did>#service-<n>`.
    pub id: DidUrl,
    /// The type of the service (e.g., agent, messaging, hub, etc.).
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    /// The service endpoint, exactly as committed on-chain.
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Describes a method for verifying a DID.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VerificationMethod {
    /// The unique identifier of the verification method, typically a DID URL.
    pub id: DidUrl,
    /// The DID URL of the controller for this verification method.
    pub controller: DidUrl,
    /// The type of the verification method (e.g., cryptographic key type).
    #[serde(rename = "type")]
    pub verification_type: KeyType,
    /// the public key and its encoding
    #[serde(flatten)]
    pub verification_properties: VerificationMethodProperties,
}

/// Key material of a [`VerificationMethod`]; exactly one encoding is present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum VerificationMethodProperties {
    /// Public key encoded as hex
    PublicKeyHex {
        #[serde(rename = "publicKeyHex")]
        public_key_hex: String,
    },
    /// Public key encoded as base64, using the default alphabet
    PublicKeyBase64 {
        #[serde(rename = "publicKeyBase64")]
        public_key_base64: String,
    },
    /// Public key encoded as base58
    PublicKeyBase58 {
        #[serde(rename = "publicKeyBase58")]
        public_key_base58: String,
    },
    /// Public key as a Json-Web-Key
    PublicKeyJwk {
        #[serde(rename = "publicKeyJwk")]
        public_key_jwk: serde_json::Value,
    },
    /// Public key in Multibase format
    PublicKeyMultibase {
        #[serde(rename = "publicKeyMultibase")]
        public_key_multibase: String,
    },
    /// Blockchain account identifier
    BlockchainAccountId {
        #[serde(rename = "blockchainAccountId")]
        blockchain_account_id: String,
    },
}

impl VerificationMethodProperties {
    /// Raw key bytes, for the encodings that carry them directly
    pub fn key_bytes(&self) -> Option<Vec<u8>> {
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

        match self {
            Self::PublicKeyHex { public_key_hex } => hex::decode(public_key_hex).ok(),
            Self::PublicKeyBase64 { public_key_base64 } => BASE64.decode(public_key_base64).ok(),
            Self::PublicKeyBase58 { public_key_base58 } => {
                bs58::decode(public_key_base58).into_vec().ok()
            }
            _ => None,
        }
    }
}

/// Represents different types of services associated with a DID.
/// An attribute key of `svc` without a subtype is an [`ServiceType::Agent`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum ServiceType {
    Agent,
    Other(String),
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::Agent => write!(f, "AgentService"),
            ServiceType::Other(other) => write!(f, "{}", other),
        }
    }
}

impl From<ServiceType> for String {
    fn from(t: ServiceType) -> Self {
        t.to_string()
    }
}

impl From<String> for ServiceType {
    fn from(s: String) -> Self {
        if s == "AgentService" {
            ServiceType::Agent
        } else {
            ServiceType::Other(s)
        }
    }
}

/// Verification method types of did:infra documents, from the [DID Specification Registries](https://www.w3.org/TR/did-spec-registries/#verification-method-types)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum KeyType {
    EcdsaSecp256k1VerificationKey2019,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::EcdsaSecp256k1VerificationKey2019 => write!(f, "Secp256k1"),
        }
    }
}

impl From<KeyType> for String {
    fn from(t: KeyType) -> Self {
        t.to_string()
    }
}

/// The verification relationship a key must be listed under to be used for a proof
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ProofPurpose {
    #[default]
    Authentication,
    AssertionMethod,
    CapabilityInvocation,
    CapabilityDelegation,
}

impl fmt::Display for ProofPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofPurpose::Authentication => write!(f, "authentication"),
            ProofPurpose::AssertionMethod => write!(f, "assertionMethod"),
            ProofPurpose::CapabilityInvocation => write!(f, "capabilityInvocation"),
            ProofPurpose::CapabilityDelegation => write!(f, "capabilityDelegation"),
        }
    }
}

/// A parsed did:infra attribute key, returned from [`parse_attribute`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum Attribute {
    Service(ServiceType),
    /// Attribute kinds other than services, reserved and not materialised in documents
    Other(String),
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Service(ServiceType::Agent) => write!(f, "svc"),
            Attribute::Service(service) => write!(f, "svc/{}", service),
            Attribute::Other(other) => write!(f, "{}", other),
        }
    }
}

impl From<Attribute> for String {
    fn from(attr: Attribute) -> String {
        attr.to_string()
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct DidDocumentMetadata {
    #[serde(default, rename = "deactivated")]
    pub deactivated: bool,
}

/// Error kinds reported in [`DidResolutionMetadata`] instead of failing the resolution call.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionError {
    InvalidDid,
    UnknownNetwork,
    NotFound,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::InvalidDid => write!(f, "invalidDid"),
            ResolutionError::UnknownNetwork => write!(f, "unknownNetwork"),
            ResolutionError::NotFound => write!(f, "notFound"),
        }
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct DidResolutionMetadata {
    #[serde(default, rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResolutionError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DidResolutionResult {
    #[serde(default, rename = "didDocumentMetadata")]
    pub metadata: DidDocumentMetadata,
    #[serde(rename = "didResolutionMetadata")]
    pub resolution_metadata: DidResolutionMetadata,
    #[serde(rename = "didDocument")]
    pub document: Option<DidDocument>,
}

impl DidResolutionResult {
    /// A resolution that failed with `error`, carrying no document
    pub fn failed<S: Into<String>>(error: ResolutionError, message: S) -> Self {
        Self {
            metadata: DidDocumentMetadata::default(),
            resolution_metadata: DidResolutionMetadata {
                content_type: None,
                error: Some(error),
                message: Some(message.into()),
            },
            document: None,
        }
    }

    /// A successful resolution of `document`
    pub fn resolved(document: DidDocument, deactivated: bool) -> Self {
        Self {
            metadata: DidDocumentMetadata { deactivated },
            resolution_metadata: DidResolutionMetadata {
                content_type: Some(DID_LD_JSON.to_string()),
                error: None,
                message: None,
            },
            document: Some(document),
        }
    }

    pub fn is_deactivated(&self) -> bool {
        self.metadata.deactivated
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialization_of_document() {
        let sample_did = json!({
            "@context": ["https://www.w3.org/ns/did/v1"],
            "id": "did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC",
            "authentication": [
                "did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC#controller"
            ],
            "service": [
              {
                "id": "did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC#service-1",
                "serviceEndpoint": "https://agent.example",
                "type": "AgentService"
              }
            ],
            "verificationMethod": [
              {
                "controller": "did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC",
                "id": "did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC#controller",
                "publicKeyHex": "0338c5f2f4d8e5ec63b0a4fa2e44dc1d7be3c5d04a2b3e8b1f9c59a9f7f4f52b1a",
                "type": "EcdsaSecp256k1VerificationKey2019"
              }
            ]
        });
        let doc: DidDocument = serde_json::from_value(sample_did.clone()).unwrap();
        let did = DidUrl::parse(
            "did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC",
        )
        .unwrap();

        assert_eq!(
            doc,
            DidDocument {
                context: vec![DID_CONTEXT.try_into().unwrap()],
                id: did.clone(),
                verification_method: vec![VerificationMethod {
                    id: did.with_fragment(Some("controller")),
                    controller: did.clone(),
                    verification_type: KeyType::EcdsaSecp256k1VerificationKey2019,
                    verification_properties: VerificationMethodProperties::PublicKeyHex {
                        public_key_hex:
                            "0338c5f2f4d8e5ec63b0a4fa2e44dc1d7be3c5d04a2b3e8b1f9c59a9f7f4f52b1a"
                                .to_string(),
                    },
                }],
                authentication: vec![did.with_fragment(Some("controller"))],
                assertion_method: vec![],
                key_agreement: vec![],
                capability_invocation: vec![],
                capability_delegation: vec![],
                service: Some(vec![Service {
                    id: did.with_fragment(Some("service-1")),
                    service_type: ServiceType::Agent,
                    service_endpoint: "https://agent.example".to_string(),
                    description: None,
                }]),
            }
        );
        assert_eq!(serde_json::to_value(doc).unwrap(), sample_did);
    }

    #[test]
    fn test_keytype_to_str() {
        assert_eq!(
            String::from(KeyType::EcdsaSecp256k1VerificationKey2019),
            "Secp256k1"
        );
        assert_eq!(
            serde_json::to_value(KeyType::EcdsaSecp256k1VerificationKey2019).unwrap(),
            json!("EcdsaSecp256k1VerificationKey2019")
        );
        assert!(serde_json::from_value::<KeyType>(json!("Ed25519VerificationKey2018")).is_err());
    }

    #[test]
    fn test_failed_resolution_has_no_document() {
        let result = DidResolutionResult::failed(ResolutionError::UnknownNetwork, "no network");
        assert!(result.document.is_none());
        assert!(!result.is_deactivated());
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "didDocumentMetadata": { "deactivated": false },
                "didResolutionMetadata": { "error": "unknownNetwork", "message": "no network" },
                "didDocument": null
            })
        );
    }

    #[test]
    fn test_key_bytes_from_properties() {
        let hex = VerificationMethodProperties::PublicKeyHex {
            public_key_hex: "0102ff".into(),
        };
        assert_eq!(hex.key_bytes(), Some(vec![0x01, 0x02, 0xff]));
        let account = VerificationMethodProperties::BlockchainAccountId {
            blockchain_account_id: "alice".into(),
        };
        assert_eq!(account.key_bytes(), None);
    }
}
