//! did:infra document construction.
//! [`InfraBuilder`] assembles a [`DidDocument`] from what the registry tables hold for a subject:
//! the key currently controlling it and its attribute map.
//!
//! # Examples
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use lib_didinfra::types::{DidUrl, InfraBuilder};
//!
//! let did = DidUrl::parse("did:infra:01:alice").unwrap();
//! let mut builder = InfraBuilder::default();
//! builder.id(did);
//! builder.controller_key(&[2u8; 33]);
//! builder.attributes(&BTreeMap::from([("svc".to_string(), "https://alice.example".to_string())]));
//! let document = builder.build().unwrap();
//! assert_eq!(document.service.unwrap().len(), 1);
//! ```

use std::collections::BTreeMap;

use super::{
    parse_attribute, Attribute, DidDocument, DidResolutionResult, DidUrl, KeyType, Service,
    ServiceType, VerificationMethod, VerificationMethodProperties, DID_CONTEXT,
};
use crate::error::InfraBuilderError;

use url::Url;

/// Fragment of the single verification method every did:infra document carries
pub const CONTROLLER_FRAGMENT: &str = "controller";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// DID Infra Builder
pub struct InfraBuilder {
    id: Option<DidUrl>,
    controller_key: Option<Vec<u8>>,
    attributes: BTreeMap<String, String>,
    is_deactivated: bool,
}

impl InfraBuilder {
    /// set the identity of the document
    pub fn id(&mut self, did: DidUrl) {
        self.id = Some(did.with_fragment(None));
    }

    /// Compressed public key currently controlling the identity
    pub fn controller_key(&mut self, key: &[u8]) {
        self.controller_key = Some(key.to_vec());
    }

    /// On-chain attributes of the identity, iterated in key order
    pub fn attributes(&mut self, attributes: &BTreeMap<String, String>) {
        self.attributes.extend(
            attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
    }

    /// Mark the identity as revoked in the resolution built by [`InfraBuilder::resolution`]
    pub fn deactivated(&mut self, deactivated: bool) {
        self.is_deactivated = deactivated;
    }

    pub fn is_deactivated(&self) -> bool {
        self.is_deactivated
    }

    /// Services, numbered from 1 in attribute key order.
    /// Only `svc` attributes become services, every other attribute kind is skipped.
    fn services(&self, id: &DidUrl) -> Vec<Service> {
        let mut services = Vec::new();
        for (name, value) in &self.attributes {
            let attribute = parse_attribute(name).unwrap_or(Attribute::Other(name.to_string()));
            match attribute {
                Attribute::Service(service_type) => {
                    let index = services.len() + 1;
                    services.push(self.service(id, index, value, service_type));
                }
                Attribute::Other(_) => {
                    log::trace!("Unhandled Attribute {name}:{value}");
                }
            }
        }
        services
    }

    /// Add an external service to the document.
    /// The endpoint is the value of the attribute committed to the chain.
    fn service(&self, id: &DidUrl, index: usize, value: &str, service: ServiceType) -> Service {
        Service {
            id: id.with_fragment(Some(&format!("service-{}", index))),
            service_type: service,
            service_endpoint: value.to_string(),
            description: None,
        }
    }

    /// Build the DID Document
    pub fn build(self) -> Result<DidDocument, InfraBuilderError> {
        let id = self.id.clone().ok_or(InfraBuilderError::MissingId)?;
        let key = self
            .controller_key
            .as_ref()
            .ok_or(InfraBuilderError::MissingControllerKey)?;

        let controller = id.with_fragment(Some(CONTROLLER_FRAGMENT));
        let verification_method = vec![VerificationMethod {
            id: controller.clone(),
            controller: id.clone(),
            verification_type: KeyType::EcdsaSecp256k1VerificationKey2019,
            verification_properties: VerificationMethodProperties::PublicKeyHex {
                public_key_hex: hex::encode(key),
            },
        }];

        let services = self.services(&id);

        Ok(DidDocument {
            context: vec![Url::parse(DID_CONTEXT).expect("const url is correct")],
            id,
            verification_method,
            authentication: vec![controller],
            assertion_method: Default::default(),
            key_agreement: Default::default(),
            capability_invocation: Default::default(),
            capability_delegation: Default::default(),
            service: (!services.is_empty()).then_some(services),
        })
    }

    /// Build the document along with its metadata
    pub fn resolution(self) -> Result<DidResolutionResult, InfraBuilderError> {
        let deactivated = self.is_deactivated;
        Ok(DidResolutionResult::resolved(self.build()?, deactivated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OWNER_HEX: &str = "02c0ded2bc1f1305fb0faac5e6c03ee3a1924234985427b6167ca569d13df435cf";

    fn builder(did: &str) -> InfraBuilder {
        let mut builder = InfraBuilder::default();
        builder.id(DidUrl::parse(did).unwrap());
        builder.controller_key(&hex::decode(OWNER_HEX).unwrap());
        builder
    }

    #[test]
    fn test_controller_only() {
        let doc = builder("did:infra:01:alice").build().unwrap();
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "@context": ["https://www.w3.org/ns/did/v1"],
                "id": "did:infra:01:alice",
                "verificationMethod": [{
                    "id": "did:infra:01:alice#controller",
                    "type": "EcdsaSecp256k1VerificationKey2019",
                    "controller": "did:infra:01:alice",
                    "publicKeyHex": OWNER_HEX
                }],
                "authentication": ["did:infra:01:alice#controller"]
            })
        );
        assert!(doc.service.is_none());
    }

    #[test]
    fn test_services_in_key_order() {
        let mut builder = builder("did:infra:01:alice");
        builder.attributes(&BTreeMap::from([
            ("svc/MessagingService".to_string(), "https://msg.example".to_string()),
            ("pub/Secp256k1".to_string(), "skipped".to_string()),
            ("svc".to_string(), "https://agent.example".to_string()),
            ("svc/AgentService".to_string(), "https://agent2.example".to_string()),
        ]));
        let services = builder.build().unwrap().service.unwrap();
        assert_eq!(services.len(), 3);

        assert_eq!(services[0].id.to_string(), "did:infra:01:alice#service-1");
        assert_eq!(services[0].service_type, ServiceType::Agent);
        assert_eq!(services[0].service_endpoint, "https://agent.example");

        assert_eq!(services[1].id.fragment(), Some("service-2"));
        assert_eq!(services[1].service_type, ServiceType::Agent);
        assert_eq!(services[1].service_endpoint, "https://agent2.example");

        assert_eq!(services[2].id.fragment(), Some("service-3"));
        assert_eq!(
            services[2].service_type,
            ServiceType::Other("MessagingService".into())
        );
    }

    #[test]
    fn test_only_other_attributes_omits_service() {
        let mut builder = builder("did:infra:01:alice");
        builder.attributes(&BTreeMap::from([(
            "pub/Secp256k1".to_string(),
            "value".to_string(),
        )]));
        let doc = builder.build().unwrap();
        assert!(doc.service.is_none());
        assert!(!serde_json::to_value(&doc)
            .unwrap()
            .as_object()
            .unwrap()
            .contains_key("service"));
    }

    #[test]
    fn test_resolution_carries_deactivation() {
        let active = builder("did:infra:01:alice").resolution().unwrap();
        assert!(!active.is_deactivated());
        assert_eq!(
            active.resolution_metadata.content_type.as_deref(),
            Some("application/did+ld+json")
        );

        let mut revoked = builder("did:infra:01:alice");
        revoked.deactivated(true);
        assert!(revoked.is_deactivated());
        let revoked = revoked.resolution().unwrap();
        assert!(revoked.is_deactivated());
        assert_eq!(
            revoked.document,
            Some(builder("did:infra:01:alice").build().unwrap())
        );
    }

    #[test]
    fn test_fragment_is_dropped_from_id() {
        let doc = builder("did:infra:01:alice#service-9").build().unwrap();
        assert_eq!(doc.id.to_string(), "did:infra:01:alice");
    }

    #[test]
    fn test_missing_parts() {
        assert_eq!(
            InfraBuilder::default().build().unwrap_err(),
            InfraBuilderError::MissingId
        );
        let mut builder = InfraBuilder::default();
        builder.id(DidUrl::parse("did:infra:01:alice").unwrap());
        assert_eq!(
            builder.build().unwrap_err(),
            InfraBuilderError::MissingControllerKey
        );
    }
}
