use jsonrpsee::types::ErrorObjectOwned;
use thiserror::Error;

use crate::types::{KeyCurve, ProofPurpose};

/// Errors originating from resolution with the [`Resolver`](crate::resolver::Resolver)
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error(transparent)]
    Builder(#[from] InfraBuilderError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("malformed `{table}` row: {source}")]
    MalformedRow {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ResolverError> for ErrorObjectOwned {
    fn from(err: ResolverError) -> Self {
        ErrorObjectOwned::owned(-31000, err.to_string(), None::<()>)
    }
}

/// Errors originating from the parsing of a did url identifier, [`Did`](crate::types::DidUrl)
#[derive(Error, Debug, PartialEq)]
pub enum DidError {
    #[error("Parsing of did:infra failed, {0}")]
    Parse(#[from] peg::error::ParseError<peg::str::LineCol>),
    #[error("expected a DID without fragment, found {0}")]
    UnexpectedFragment(String),
}

/// Errors originating during the construction of a did:infra document [`InfraBuilder`](crate::types::InfraBuilder)
#[derive(Error, Debug, PartialEq)]
pub enum InfraBuilderError {
    #[error("the document id must be set before building")]
    MissingId,
    #[error("a controller key is required to build a document")]
    MissingControllerKey,
}

/// Errors from decoding EOSIO key and signature text
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("unrecognized key format `{0}`")]
    UnknownFormat(String),
    #[error(transparent)]
    Base58(#[from] bs58::decode::Error),
    #[error("expected {expected} bytes of key data, found {actual}")]
    Length { expected: usize, actual: usize },
    #[error("checksum mismatch")]
    Checksum,
    #[error("operation is not supported for {0} keys")]
    UnsupportedCurve(KeyCurve),
    #[error(transparent)]
    Ecdsa(#[from] k256::ecdsa::Error),
    #[error("no canonical signature after {0} attempts")]
    NonCanonical(usize),
}

/// Errors talking to the ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} responded with {status}: {body}")]
    Rpc {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("`{0}` is not a valid ledger name")]
    InvalidName(String),
    #[error("invalid block timestamp `{0}`")]
    Timestamp(String),
    #[error("{0}")]
    Transport(String),
}

/// Errors from decoding, issuing or verifying a JWT
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("invalid_argument: incorrect format JWT, {0}")]
    MalformedToken(String),
    #[error("invalid_jwt: JWT iss is required")]
    MissingIssuer,
    #[error("invalid_jwt: JWT sub is required")]
    MissingSubject,
    #[error("invalid_jwt: JWT did is required")]
    MissingDid,
    #[error("invalid_jwt: No DID has been found in the JWT")]
    NoDidFound,
    #[error("resolver_error: Unable to resolve DID document for {did}: {message}")]
    ResolverError { did: String, message: String },
    #[error("no_suitable_keys: DID document for {did} does not have public keys suitable for {alg} with {purpose} purpose")]
    NoSuitableKey {
        did: String,
        alg: String,
        purpose: ProofPurpose,
    },
    #[error("invalid_signature: no matching public key found")]
    NotVerified,
    #[error("invalid_jwt: JWT not valid before {claim}: {value}")]
    NotYetValid { claim: &'static str, value: i64 },
    #[error("invalid_jwt: JWT has expired: exp: {exp} < now: {now}")]
    Expired { exp: i64, now: i64 },
    #[error("invalid_config: JWT audience is required but your app address has not been configured")]
    AudienceConfigMissing,
    #[error("no signer has been configured")]
    SigningUnavailable,
    #[error("not_supported: no supported signature types for algorithm {0}")]
    UnsupportedAlgorithm(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

impl From<JwtError> for ErrorObjectOwned {
    fn from(err: JwtError) -> Self {
        ErrorObjectOwned::owned(-31001, err.to_string(), None::<()>)
    }
}

/// Errors from signing and submitting attribute updates with the [`RegistrySigner`](crate::RegistrySigner)
#[derive(Error, Debug)]
pub enum RegistrySignerError {
    #[error(transparent)]
    Did(#[from] DidError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    #[error("ledger broadcast failed: {0}")]
    Broadcast(#[source] LedgerError),
    #[error("`{action}` requires a public key DID, found {did}")]
    RequiresPublicKeyDid { action: String, did: String },
    #[error("`{action}` requires an account DID, found {did}")]
    RequiresAccountDid { action: String, did: String },
    #[error("a transaction fee payer account and key are required to submit `{0}`")]
    MissingFeePayer(String),
}
