//! DID Identity Resolver
pub mod did_registry;
pub mod ledger;
pub mod rpc_client;
pub mod transaction;

use std::{collections::HashMap, str::FromStr};

use serde::{Deserialize, Serialize};

use self::{
    did_registry::{DidRegistry, PubKeyIndex},
    ledger::LedgerAccessor,
    rpc_client::RpcClient,
};
use crate::{
    error::ResolverError,
    types::{
        DidDocument, DidResolutionResult, DidUrl, PublicKey, ResolutionError, Subject,
    },
};

/// A ledger network hosting a deployment of the registry contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfiguration {
    /// The network segment of DIDs anchored on this network, `did:infra:<network_id>:...`
    pub network_id: String,
    pub rpc_endpoint: String,
    pub registry_contract: String,
    #[serde(default)]
    pub pubkey_index: PubKeyIndex,
}

impl NetworkConfiguration {
    pub fn new<S: Into<String>>(network_id: S, rpc_endpoint: S, registry_contract: S) -> Self {
        Self {
            network_id: network_id.into(),
            rpc_endpoint: rpc_endpoint.into(),
            registry_contract: registry_contract.into(),
            pubkey_index: PubKeyIndex::default(),
        }
    }
}

/// Configuration for a [`Resolver`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationOptions {
    pub networks: Vec<NetworkConfiguration>,
    /// Report revoked public key DIDs as active
    #[serde(default)]
    pub no_revocation_check: bool,
}

/// A resolver for did:infra, reading the registry contract of every configured network.
///
/// Public key DIDs are looked up in `pubkeydid` by their key, and documented with the key
/// `pkdidowner` lists as the current owner. Account DIDs are documented with the first key of
/// the account's `active` permission and the attributes of `accdidattr`.
pub struct Resolver<L> {
    networks: HashMap<String, DidRegistry<L>>,
    no_revocation_check: bool,
}

impl Resolver<RpcClient> {
    /// Instantiate a new did:infra resolver connected to each configured network over HTTP
    pub fn new(options: &ConfigurationOptions) -> Result<Self, ResolverError> {
        let mut resolver = Self::empty(options.no_revocation_check);
        for network in &options.networks {
            let client = RpcClient::new(&network.rpc_endpoint)?;
            log::debug!(
                "Using registry {} on network {} at {}",
                network.registry_contract,
                network.network_id,
                network.rpc_endpoint
            );
            resolver = resolver.with_network(network, client);
        }
        Ok(resolver)
    }
}

impl<L: LedgerAccessor> Resolver<L> {
    /// A resolver without networks
    pub fn empty(no_revocation_check: bool) -> Self {
        Self {
            networks: HashMap::new(),
            no_revocation_check,
        }
    }

    /// Add a network reached through `ledger`
    pub fn with_network(mut self, network: &NetworkConfiguration, ledger: L) -> Self {
        let registry = DidRegistry::new(ledger, &network.registry_contract, network.pubkey_index);
        self.networks.insert(network.network_id.clone(), registry);
        self
    }

    /// The registry reader for a network id
    pub fn registry(&self, network_id: &str) -> Option<&DidRegistry<L>> {
        self.networks.get(network_id)
    }

    /// Resolve a did:infra identifier.
    ///
    /// Invalid identifiers, unknown networks and identities without registry rows are reported
    /// in the resolution metadata, errors are reserved for failures talking to the ledger.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resolve_did(&self, did: &str) -> Result<DidResolutionResult, ResolverError> {
        let did_url = match DidUrl::parse(did) {
            Ok(url) => url.with_fragment(None),
            Err(e) => {
                log::debug!("Invalid DID {did}: {e}");
                return Ok(DidResolutionResult::failed(
                    ResolutionError::InvalidDid,
                    e.to_string(),
                ));
            }
        };

        let Some(registry) = self.registry(did_url.network()) else {
            return Ok(DidResolutionResult::failed(
                ResolutionError::UnknownNetwork,
                format!("no network configured for `{}`", did_url.network()),
            ));
        };

        let resolved = match did_url.subject() {
            Subject::PublicKey(key) => {
                let key = match PublicKey::from_str(key) {
                    Ok(key) => key,
                    Err(e) => {
                        return Ok(DidResolutionResult::failed(
                            ResolutionError::InvalidDid,
                            e.to_string(),
                        ))
                    }
                };
                self.resolve_pub_key_did(registry, &did_url, &key).await?
            }
            Subject::Account(account) => {
                self.resolve_account_did(registry, &did_url, account)
                    .await?
            }
        };

        Ok(match resolved {
            Some(result) => result,
            None => DidResolutionResult::failed(
                ResolutionError::NotFound,
                format!("{did_url} is not registered"),
            ),
        })
    }

    async fn resolve_pub_key_did(
        &self,
        registry: &DidRegistry<L>,
        did: &DidUrl,
        key: &PublicKey,
    ) -> Result<Option<DidResolutionResult>, ResolverError> {
        let Some(row) = registry.pub_key_did(key).await? else {
            log::debug!("No {} row for {did}", did_registry::PUBKEY_DID_TABLE);
            return Ok(None);
        };
        let deactivated = !self.no_revocation_check && row.is_revoked();
        log::trace!("pkid={} nonce={} deactivated={deactivated}", row.pkid, row.nonce);

        let Some(owner) = registry.pk_did_owner(row.pkid).await? else {
            log::debug!("No {} row for pkid {}", did_registry::PKDID_OWNER_TABLE, row.pkid);
            return Ok(None);
        };
        let owner_key = PublicKey::from_str(&owner.pk)?;

        let mut builder = DidDocument::infra_builder();
        builder.id(did.clone());
        builder.controller_key(owner_key.as_bytes());
        builder.attributes(&row.attr);
        builder.deactivated(deactivated);
        Ok(Some(builder.resolution()?))
    }

    async fn resolve_account_did(
        &self,
        registry: &DidRegistry<L>,
        did: &DidUrl,
        account: &str,
    ) -> Result<Option<DidResolutionResult>, ResolverError> {
        let Some(info) = registry.account(account).await? else {
            log::debug!("Account {account} does not exist");
            return Ok(None);
        };
        let Some(active_key) = info.active_key() else {
            log::debug!("Account {account} has no active key");
            return Ok(None);
        };
        let active_key = PublicKey::from_str(active_key)?;

        let Some(row) = registry.account_did_attr(account).await? else {
            log::debug!("No {} row for {did}", did_registry::ACCOUNT_DID_ATTR_TABLE);
            return Ok(None);
        };

        let mut builder = DidDocument::infra_builder();
        builder.id(did.clone());
        builder.controller_key(active_key.as_bytes());
        builder.attributes(&row.attr);
        Ok(Some(builder.resolution()?))
    }
}
