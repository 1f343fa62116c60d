//! did:infra resolver library
//!
//! This library provides a resolver for did:infra DIDs according to the W3C [specification](https://www.w3.org/TR/did-core/#abstract),
//! reading the DID registry contract of EOSIO based ledgers. Provided functions include parsing
//! did:infra identifiers, resolving them into DID documents, issuing and verifying JWT proofs
//! signed by DID keys and submitting signed attribute updates to the registry.
//!
//! # Examples
//!
//! ## Instantiating the [`Resolver`] struct
//! A [`Resolver`] requires the networks it may resolve on, each with the chain API endpoint of
//! a ledger node and the account of the deployed registry contract.
//!
//! Once instantiated, DID Documents may be built by resolving DIDs.
//! ```rust, no_run
//! use lib_didinfra::{ConfigurationOptions, NetworkConfiguration, Resolver};
//!
//! # tokio_test::block_on(async {
//! let options = ConfigurationOptions {
//!     networks: vec![NetworkConfiguration::new("01", "https://api.example.com", "fmapkumrotfc")],
//!     no_revocation_check: false,
//! };
//! let resolver = Resolver::new(&options).unwrap();
//!
//! resolver
//!     .resolve_did("did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC")
//!     .await
//!     .unwrap();
//! # })
//! ```
//!
//! ## Verifying a JWT
//! ```rust, no_run
//! use lib_didinfra::{jwt::{verify_jwt, VerifyOptions}, ConfigurationOptions, Resolver};
//!
//! # tokio_test::block_on(async {
//! # let resolver = Resolver::new(&ConfigurationOptions::default()).unwrap();
//! # let token = "";
//! let verified = verify_jwt(token, &resolver, &VerifyOptions::default()).await.unwrap();
//! println!("signed by {}", verified.signer.id);
//! # })
//! ```
//!
//! # Cargo Feature Flags
//!
//! `server` enables the JSON-RPC server api for did:infra resolution
//!
//! `client` enables the JSON-RPC client for the did:infra server
//!
//! ### Using the Server
//! ``` no_run
//! # #[cfg(feature = "server")]
//! # {
//! use jsonrpsee::server::Server;
//! use lib_didinfra::{ConfigurationOptions, Resolver, DidRegistryServer, rpc::DidRegistryMethods};
//!
//! # tokio_test::block_on(async {
//! let resolver = Resolver::new(&ConfigurationOptions::default()).unwrap();
//! let server = Server::builder().build("127.0.0.1:0").await.unwrap();
//!
//! let addr = server.local_addr().unwrap();
//! let handle = server.start(DidRegistryMethods::new(resolver).into_rpc());
//! handle.stopped().await;
//!
//! # })
//!
//! # }
//! ````
//!
//! ### Using the Client
//!
//! ```no_run
//! # #[cfg(feature = "client")]
//! # {
//! use jsonrpsee::ws_client::WsClientBuilder;
//! use lib_didinfra::DidRegistryClient;
//!
//! # tokio_test::block_on(async {
//! let client = WsClientBuilder::default().build("ws://127.0.0.1:9999").await.unwrap();
//! let document = client.resolve_did("did:infra:01:alice".into()).await.unwrap();
//! # })
//! # }
//! ```

pub mod error;
pub mod jwt;
pub mod registry_signer;
pub mod resolver;
pub mod types;
mod util;

#[cfg(any(feature = "server", feature = "client"))]
pub mod rpc;

pub use crate::registry_signer::{create_pub_key_did, RegistrySigner, SignerConfig};
pub use crate::resolver::{
    did_registry, ledger::LedgerAccessor, rpc_client::RpcClient, ConfigurationOptions,
    NetworkConfiguration, Resolver,
};

#[cfg(feature = "server")]
pub use rpc::DidRegistryServer;

#[cfg(feature = "client")]
pub use rpc::DidRegistryClient;
