//! ## Endpoint Documentation: `resolveDid`
//!
//! ### Overview
//!
//! The `resolveDid` endpoint receives a did:infra identifier and returns its DID resolution result in a JSON format: the did document, the document metadata and the resolution metadata. Resolution reads the DID registry contract of the network named in the identifier.
//!
//! ### Endpoint
//!
//! ```text
//! POST
//! ```
//!
//! ### Request Format
//!
//! The request should be a JSON object containing one field: `did`.
//!
//! - `did` (string, required): The did:infra identifier, `did:infra:<network-id>:<public-key-or-account>`.
//!
//! Example Request:
//! ```json
//! {
//!   "did": "did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC"
//! }
//! ```
//!
//! ### Response Format
//!
//! Example Response:
//! ```json
//! {
//!   "didDocumentMetadata": { "deactivated": false },
//!   "didResolutionMetadata": { "contentType": "application/did+ld+json" },
//!   "didDocument": {
//!     "@context": ["https://www.w3.org/ns/did/v1"],
//!     "id": "did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC",
//!     "verificationMethod": [
//!       {
//!         "id": "did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC#controller",
//!         "controller": "did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC",
//!         "type": "EcdsaSecp256k1VerificationKey2019",
//!         "publicKeyHex": "034f355bdcb7cc0af728ef3cceb9615d90684bb5b2ca5f859ab0f0b704075871aa"
//!       }
//!     ],
//!     "authentication": ["did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC#controller"],
//!     "service": [
//!       {
//!         "id": "did:infra:01:PUB_K1_7S7oY6Jrjzq8txrPmBwUhUmKzpN64835E7ura1HDDAVUsriHtC#service-1",
//!         "type": "AgentService",
//!         "serviceEndpoint": "https://agent.example"
//!       }
//!     ]
//!   }
//! }
//! ```
//!
//! Identifiers that do not parse, name an unknown network or have no registry entry are not
//! errors: `didResolutionMetadata.error` is set to `invalidDid`, `unknownNetwork` or `notFound`
//! and `didDocument` is null.
//!
//! ## Endpoint Documentation: `verifyJwt`
//!
//! Verifies a compact JWT signed with `ES256K` by a key of the issuer's DID document.
//!
//! - `jwt` (string, required): The compact token.
//! - `audience` (string, optional): The audience this service accepts tokens for, required when the token carries `aud`.
//!
//! The response holds the issuer DID, its resolution result, the verification method that signed the token and the decoded payload.
//!
//! ### Error Handling
//!
//! Failures talking to the ledger are returned with code `-31000`, rejected tokens with code `-31001` and a message such as `invalid_jwt: JWT has expired: exp: 1700000000 < now: 1700000400`, malformed parameters with code `-31999`.
//!
//! ### Security and Authentication
//!
//! - The endpoint is open access.
//!
//! ### Future requirements
//! - Access control
//! - All requests must be made over HTTPS.
//! - Rate limiting is applied to prevent abuse.
//!
//! ### Example
//!
//! ```bash
//! curl -H "Content-Type: application/json" -d '{"id":1, "jsonrpc":"2.0", "method":"did_resolveDid", "params": { "did":"did:infra:01:alice"} }' http://localhost:8080
//! ```
//!
//! ### Support
//!
//! Please refer to the DID specification: [DID](https://www.w3.org/TR/did-core/)

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use lib_didinfra::{rpc::DidRegistryMethods, DidRegistryServer, Resolver};

use jsonrpsee::server::Server;

mod argenv;

/// Entrypoint for the did:infra Gateway
pub async fn run() -> Result<()> {
    init_logging();
    load_env()?;
    let opts = argenv::parse_args();

    let server_host = host_from(opts.host.clone(), opts.port);
    let server = Server::builder().build(server_host).await?;
    let addr = server.local_addr()?;
    let config = opts.configuration()?;
    for network in &config.networks {
        log::info!(
            "Resolving network {} through {} with registry {}",
            network.network_id,
            network.rpc_endpoint,
            network.registry_contract
        );
    }
    let resolver = Resolver::new(&config).context(format!(
        "Unable to create a resolver for networks {}",
        opts.networks
    ))?;

    let handle = server.start(DidRegistryMethods::new(resolver).into_rpc());

    log::info!("Server Started at {addr}");
    handle.stopped().await;
    Ok(())
}

fn load_env() -> Result<()> {
    match dotenvy::dotenv_override() {
        Ok(path) => {
            // .env file successfully loaded.
            log::debug!("Env file {} was loaded successfully", path.display());
        }
        Err(err) => {
            // Error handling for the case where dotenv() fails
            log::info!("env file(s) not loaded : {err}");
        }
    };
    Ok(())
}

fn host_from(host: String, port: u16) -> String {
    format!("{}:{}", host, port)
}

fn init_logging() {
    let fmt = fmt::layer().compact();
    Registry::default()
        .with(EnvFilter::from_default_env())
        .with(fmt)
        .init()
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_from() {
        assert_eq!(host_from(String::from("abc"), 123), "abc:123");
        assert_eq!(host_from(String::from("abc"), 0), "abc:0");
    }
}
