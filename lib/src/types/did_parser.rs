//! Parsing Expression Grammer (PEG) parsing rules for parts of a Decentralized Identifier

use crate::types::*;

pub use did_infra_attribute_parser::attribute as parse_attribute;
pub use did_infra_parser::did_url as parse_did_url;
pub use did_infra_parser::infra_did as parse_infra_did;

peg::parser! {
    grammar did_infra_parser() for str {
        /// parses the `did` part of a [DID-URL](https://www.w3.org/TR/did-core/#did-syntax),
        /// the method specific part after the `did:` scheme.
        ///
        /// # Example
        /// ```rust
        /// use lib_didinfra::types::{Did, Method, Subject, parse_infra_did};
        /// let parsed = parse_infra_did("infra:01:alice").unwrap();
        /// assert_eq!(
        ///    parsed,
        ///    Did {
        ///        method: Method::Infra,
        ///        network: "01".to_string(),
        ///        subject: Subject::Account("alice".to_string()),
        ///   });
        /// ```
        pub rule infra_did() -> Did
            = method:method() ":" network:segment() ":" subject:subject() {
                Did { method, network: network.to_string(), subject }
            }

        /// parses a full DID URL: `did:infra:<network>:<subject>[#fragment]`
        pub rule did_url() -> DidUrl
            = "did:" did:infra_did() fragment:fragment()? ![_] {
                DidUrl { did, fragment }
            }

        rule method() -> Method
            = "infra" { Method::Infra } / expected!("the only supported method is `infra`")

        rule subject() -> Subject
            = id:segment() { Subject::from(id) }

        rule fragment() -> String
            = "#" f:$([^ '#']*) { f.to_string() }

        rule segment() -> &'input str
            = $([^ ':' | '#' | '/' | '?']+) / expected!("a non-empty identifier segment")
    }
}

peg::parser! {
    grammar did_infra_attribute_parser() for str {
        rule subtype() -> &'input str
            = $([^ '/']+)

        rule service() -> ServiceType
            = "svc" svc:("/" s:subtype() { s })? {
                svc.map(|s| ServiceType::from(s.to_string())).unwrap_or(ServiceType::Agent)
            }

        /// Parses an on-chain attribute key of the form `<type>[/<subtype>]`.
        ///
        /// Only `svc` is understood; `svc` alone is an agent service, `svc/<Name>` a named one.
        pub rule attribute() -> Attribute
            = svc:service() ("/" [_]*)? ![_] { Attribute::Service(svc) }
            / other:$([_]+) { Attribute::Other(other.to_string()) }
    }
}
