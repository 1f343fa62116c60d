//! DID and DID URL types for `did:infra` according to the [DID Spec](https://www.w3.org/TR/did-core/#did-syntax)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use smart_default::SmartDefault;

use super::parse_did_url;
use crate::error::DidError;

/// Subject prefixes which mark a public key DID, every other subject is an account name
pub const PUBLIC_KEY_PREFIXES: [&str; 3] = ["PUB_K1", "PUB_R1", "EOS"];

/// A DID URL, based on the did specification, [DID URL Syntax](https://www.w3.org/TR/did-core/#did-url-syntax)
/// Only `did:infra` identifiers with an optional fragment are supported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DidUrl {
    pub did: Did,
    pub fragment: Option<String>,
}

/// The `did` part of a `did:infra` URL, `did:infra:<network>:<subject>`. returned by [`parse_infra_did`](super::parse_infra_did)
#[derive(Debug, Clone, PartialEq, Eq, Hash, SmartDefault)]
pub struct Did {
    pub method: Method,
    pub network: String,
    pub subject: Subject,
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "did:{}:{}:{}",
            self.method.as_str(),
            self.network,
            self.subject.value()
        )
    }
}

impl FromStr for Did {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = DidUrl::parse(s)?;
        if url.fragment.is_some() {
            return Err(DidError::UnexpectedFragment(s.to_string()));
        }
        Ok(url.did)
    }
}

/// Whether the subject of a DID is a public key or a ledger account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    PublicKey,
    Account,
}

/// The subject part of a `did:infra` identifier.
/// The public key text is kept verbatim, decoding happens when the key is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, SmartDefault)]
pub enum Subject {
    PublicKey(String),
    #[default]
    Account(String),
}

impl Subject {
    pub fn kind(&self) -> SubjectKind {
        match self {
            Subject::PublicKey(_) => SubjectKind::PublicKey,
            Subject::Account(_) => SubjectKind::Account,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Subject::PublicKey(key) => key,
            Subject::Account(account) => account,
        }
    }
}

impl<'a> From<&'a str> for Subject {
    fn from(subject: &'a str) -> Subject {
        if PUBLIC_KEY_PREFIXES
            .iter()
            .any(|prefix| subject.starts_with(prefix))
        {
            Subject::PublicKey(subject.to_string())
        } else {
            Subject::Account(subject.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, SmartDefault)]
pub enum Method {
    #[default]
    Infra,
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Infra => "infra",
        }
    }
}

impl DidUrl {
    /// Parses a Decentralized Identifier (DID) URI string.
    ///
    /// # Examples
    /// ```
    /// use lib_didinfra::types::DidUrl;
    ///
    /// let did_url = "did:not:123";
    /// let did_url = DidUrl::parse(did_url).unwrap_err();
    /// assert_eq!(did_url.to_string(), "Parsing of did:infra failed, error at 1:5: expected one of \"infra\", the only supported method is `infra`");
    /// ```
    /// ```
    /// use lib_didinfra::types::DidUrl;
    ///
    /// let did_url = DidUrl::parse("did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC").unwrap();
    /// ```
    ///
    /// # Errors
    /// returns a [`DidError`] if the input does not have exactly the four colon separated parts
    /// `did:infra:<network>:<subject>`, optionally followed by a `#fragment`.
    pub fn parse<S: AsRef<str>>(input: S) -> Result<Self, DidError> {
        parse_did_url(input.as_ref()).map_err(DidError::Parse)
    }

    /// The DID without fragment
    pub fn did(&self) -> &Did {
        &self.did
    }

    pub fn method(&self) -> &Method {
        &self.did.method
    }

    /// The network identifier, used to select a configured ledger
    pub fn network(&self) -> &str {
        &self.did.network
    }

    pub fn subject(&self) -> &Subject {
        &self.did.subject
    }

    /// Returns this DID's fragment identifier, if any.
    ///
    ///  # Examples
    /// ```
    /// use lib_didinfra::types::DidUrl;
    ///
    /// let did_url = DidUrl::parse("did:infra:01:alice#controller").unwrap();
    /// assert_eq!(did_url.fragment(), Some("controller"));
    /// ```
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Immutable copy builder to add a fragment to this did url
    pub fn with_fragment(&self, fragment: Option<&str>) -> Self {
        let mut minion = self.clone();
        minion.fragment = fragment.map(ToString::to_string);
        minion
    }
}

impl From<Did> for DidUrl {
    fn from(did: Did) -> Self {
        DidUrl {
            did,
            fragment: None,
        }
    }
}

impl fmt::Display for DidUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.did)?;
        if let Some(fragment) = self.fragment() {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

impl Serialize for DidUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DidUrl {
    fn deserialize<D>(deserializer: D) -> Result<DidUrl, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DidUrl::parse(s).map_err(serde::de::Error::custom)
    }
}
