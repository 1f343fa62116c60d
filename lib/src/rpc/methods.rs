//! Interface Implementations for DID Registry JSON-RPC

use async_trait::async_trait;
use jsonrpsee::types::ErrorObjectOwned;
use thiserror::Error;
use url::Url;

use super::api::*;
use crate::{
    jwt::{verify_jwt, VerifiedJwt, VerifyOptions},
    resolver::{ledger::LedgerAccessor, Resolver},
    types::DidResolutionResult,
};

/// Read-only methods for the DID Registry JSON-RPC
pub struct DidRegistryMethods<L> {
    resolver: Resolver<L>,
}

/// The implementation of the JSON-RPC trait, [`DidRegistryServer`].
impl<L: LedgerAccessor> DidRegistryMethods<L> {
    pub fn new(resolver: Resolver<L>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl<L: LedgerAccessor + 'static> DidRegistryServer for DidRegistryMethods<L> {
    async fn resolve_did(&self, did: String) -> Result<DidResolutionResult, ErrorObjectOwned> {
        log::debug!("did_resolveDid called");

        let resolution_result = self.resolver.resolve_did(&did).await?;

        Ok(resolution_result)
    }

    async fn verify_jwt(
        &self,
        jwt: String,
        audience: Option<String>,
    ) -> Result<VerifiedJwt, ErrorObjectOwned> {
        log::debug!("did_verifyJwt called");

        if let Some(audience) = &audience {
            Url::parse(audience).map_err(RpcError::from)?;
        }
        let options = VerifyOptions {
            audience,
            ..Default::default()
        };

        Ok(verify_jwt(&jwt, &self.resolver, &options).await?)
    }
}

/// Error types for DID Registry JSON-RPC
#[derive(Debug, Error)]
enum RpcError {
    /// The audience parameter was not a URI
    #[error("Invalid audience format")]
    InvalidAudience(#[from] url::ParseError),
}

impl From<RpcError> for ErrorObjectOwned {
    fn from(error: RpcError) -> Self {
        match error {
            RpcError::InvalidAudience(_) => {
                ErrorObjectOwned::owned(-31999, error.to_string(), None::<()>)
            }
        }
    }
}
