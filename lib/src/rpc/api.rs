//! Trait Interface Definitions for DID Registry JSON-RPC

use crate::{jwt::VerifiedJwt, types::DidResolutionResult};

use jsonrpsee::{proc_macros::rpc, types::ErrorObjectOwned};

/// Decentralized Identifier JSON-RPC Interface Methods
#[cfg(feature = "server")]
#[rpc(server, namespace = "did")]
pub trait DidRegistry {
    #[method(name = "resolveDid")]
    async fn resolve_did(&self, did: String) -> Result<DidResolutionResult, ErrorObjectOwned>;

    #[method(name = "verifyJwt")]
    async fn verify_jwt(
        &self,
        jwt: String,
        audience: Option<String>,
    ) -> Result<VerifiedJwt, ErrorObjectOwned>;
}

/// Decentralized Identifier JSON-RPC Interface Methods
#[cfg(feature = "client")]
#[rpc(client, namespace = "did")]
pub trait DidRegistry {
    #[method(name = "resolveDid")]
    async fn resolve_did(&self, did: String) -> Result<DidResolutionResult, ErrorObjectOwned>;

    #[method(name = "verifyJwt")]
    async fn verify_jwt(
        &self,
        jwt: String,
        audience: Option<String>,
    ) -> Result<VerifiedJwt, ErrorObjectOwned>;
}
