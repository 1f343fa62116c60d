//! Signed attribute updates for did:infra identities.
//!
//! Public key DIDs are updated through actions any fee payer may push: the DID owner authorizes
//! each change by signing a buffer bound to the key's current nonce, and the registry contract
//! checks that signature before bumping the nonce. Account DIDs are updated by the account
//! itself.

use std::{str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use smart_default::SmartDefault;

use crate::{
    error::RegistrySignerError,
    jwt::{Es256kSigner, JwtIssuer},
    resolver::{
        did_registry::{DidRegistry, PubKeyIndex},
        ledger::{Action, Authorization, BroadcastRequest, LedgerAccessor, TransactionReceipt},
    },
    types::{DidUrl, PrivateKey, PublicKey, Subject},
};

/// Prefix of every signing buffer on the main network
pub const DEFAULT_SIGN_DATA_PREFIX: &str = "infra-mainnet";
/// Update transactions expire this many seconds after their reference block
pub const EXPIRE_SECONDS: u32 = 30;
/// Update transactions reference the block this far below head
pub const BLOCKS_BEHIND: u32 = 3;

/// Registry contract actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateAction {
    /// Set an attribute of a public key DID
    Set,
    /// Hand a public key DID over to another key
    ChangeOwner,
    /// Deactivate a public key DID
    Revoke,
    /// Remove every attribute and owner change of a public key DID
    Clear,
    /// Set an attribute of an account DID
    SetAccount,
}

impl UpdateAction {
    /// The contract action name, also the action part of the signing buffer
    pub fn name(&self) -> &'static str {
        match self {
            UpdateAction::Set => "pksetattr",
            UpdateAction::ChangeOwner => "pkchowner",
            UpdateAction::Revoke => "pkdidrevoke",
            UpdateAction::Clear => "pkdidclear",
            UpdateAction::SetAccount => "accsetattr",
        }
    }

    pub fn is_account_action(&self) -> bool {
        matches!(self, UpdateAction::SetAccount)
    }
}

/// How the nonce is written into the signing buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceEncoding {
    /// A single byte, the nonce modulo 256. This is what the deployed registry contract
    /// verifies, so nonces 256 apart sign identical buffers.
    #[default]
    Truncated,
    /// Eight bytes big endian. Only valid against a registry contract that verifies the same
    /// layout.
    BigEndianU64,
}

impl NonceEncoding {
    fn write(&self, buf: &mut Vec<u8>, nonce: u64) {
        match self {
            NonceEncoding::Truncated => buf.push(nonce as u8),
            NonceEncoding::BigEndianU64 => buf.extend_from_slice(&nonce.to_be_bytes()),
        }
    }
}

/// One attribute update, with unused fields left empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub action: UpdateAction,
    pub key: String,
    pub value: String,
    pub new_key: String,
}

impl UpdateRequest {
    pub fn new(action: UpdateAction) -> Self {
        Self {
            action,
            key: String::new(),
            value: String::new(),
            new_key: String::new(),
        }
    }

    /// The bytes the DID owner signs,
    /// `prefix ‖ action ‖ key ‖ value ‖ subject ‖ nonce ‖ new_key`
    pub fn signing_buffer(
        &self,
        prefix: &str,
        subject: &str,
        nonce: u64,
        encoding: NonceEncoding,
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(prefix.as_bytes());
        buf.extend_from_slice(self.action.name().as_bytes());
        buf.extend_from_slice(self.key.as_bytes());
        buf.extend_from_slice(self.value.as_bytes());
        buf.extend_from_slice(subject.as_bytes());
        encoding.write(&mut buf, nonce);
        buf.extend_from_slice(self.new_key.as_bytes());
        buf
    }
}

fn default_sign_data_prefix() -> String {
    DEFAULT_SIGN_DATA_PREFIX.to_string()
}

/// Configuration of a [`RegistrySigner`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
pub struct SignerConfig {
    /// The DID being updated
    pub did: String,
    pub registry_contract: String,
    /// Private key of the current owner, `PVT_K1_` or WIF. For account DIDs, a key of the
    /// account's `active` permission.
    pub did_owner_private_key: String,
    /// Account paying for public key DID updates
    #[serde(default)]
    pub tx_fee_payer_account: Option<String>,
    #[serde(default)]
    pub tx_fee_payer_private_key: Option<String>,
    #[default(default_sign_data_prefix())]
    #[serde(default = "default_sign_data_prefix")]
    pub sign_data_prefix: String,
    #[serde(default)]
    pub nonce_encoding: NonceEncoding,
    #[serde(default)]
    pub pubkey_index: PubKeyIndex,
}

/// Signs and submits attribute updates for one DID.
///
/// Each update reads the DID's nonce, signs over it and broadcasts. Calls for the same DID must
/// not overlap: two updates holding the same nonce sign for the same slot and the ledger
/// rejects the later one. Callers submitting concurrently have to serialize updates per DID,
/// for example behind a per-DID mutex.
pub struct RegistrySigner<L> {
    registry: DidRegistry<L>,
    did: DidUrl,
    owner_key: PrivateKey,
    config: SignerConfig,
}

impl<L: LedgerAccessor> RegistrySigner<L> {
    pub fn new(config: SignerConfig, ledger: L) -> Result<Self, RegistrySignerError> {
        let did = DidUrl::parse(&config.did)?.with_fragment(None);
        let owner_key = PrivateKey::from_str(&config.did_owner_private_key)?;
        let registry = DidRegistry::new(ledger, &config.registry_contract, config.pubkey_index);
        Ok(Self {
            registry,
            did,
            owner_key,
            config,
        })
    }

    pub fn did(&self) -> &DidUrl {
        &self.did
    }

    pub fn ledger(&self) -> &L {
        self.registry.ledger()
    }

    /// Current nonce of the DID's key, zero when the registry has no row for it yet
    pub async fn fetch_nonce(&self) -> Result<u64, RegistrySignerError> {
        let key = self.subject_key("nonce")?;
        Ok(self.registry.nonce(&key).await?)
    }

    fn subject_key(&self, action: &str) -> Result<PublicKey, RegistrySignerError> {
        match self.did.subject() {
            Subject::PublicKey(key) => Ok(PublicKey::from_str(key)?),
            Subject::Account(_) => Err(RegistrySignerError::RequiresPublicKeyDid {
                action: action.to_string(),
                did: self.did.to_string(),
            }),
        }
    }

    fn fee_payer(&self, action: UpdateAction) -> Result<(&str, &str), RegistrySignerError> {
        match (
            &self.config.tx_fee_payer_account,
            &self.config.tx_fee_payer_private_key,
        ) {
            (Some(account), Some(key)) => Ok((account.as_str(), key.as_str())),
            _ => Err(RegistrySignerError::MissingFeePayer(
                action.name().to_string(),
            )),
        }
    }

    /// Sign `request` and broadcast it, returning the ledger's receipt.
    ///
    /// Broadcast failures are returned as they are, updates are never retried.
    #[tracing::instrument(level = "debug", skip_all, fields(did = %self.did, action = request.action.name()))]
    pub async fn sign_and_submit(
        &self,
        request: &UpdateRequest,
    ) -> Result<TransactionReceipt, RegistrySignerError> {
        let action = request.action;
        let broadcast = if action.is_account_action() {
            self.account_update(request)?
        } else {
            self.pub_key_update(request).await?
        };

        log::debug!("Submitting {} for {}", action.name(), self.did);
        let receipt = self
            .registry
            .ledger()
            .broadcast_transaction(broadcast)
            .await
            .map_err(|e| {
                log::error!("{} for {} failed: {e}", action.name(), self.did);
                RegistrySignerError::Broadcast(e)
            })?;
        log::debug!("{} accepted in {}", action.name(), receipt.transaction_id);
        Ok(receipt)
    }

    async fn pub_key_update(
        &self,
        request: &UpdateRequest,
    ) -> Result<BroadcastRequest, RegistrySignerError> {
        let action = request.action;
        self.subject_key(action.name())?;
        let (payer, payer_key) = self.fee_payer(action)?;

        let subject = self.did.subject().value();
        let nonce = self.fetch_nonce().await?;
        let buffer = request.signing_buffer(
            &self.config.sign_data_prefix,
            subject,
            nonce,
            self.config.nonce_encoding,
        );
        let sig = self.owner_key.sign(&buffer)?.to_string();
        log::trace!("Signed {} for {subject} at nonce {nonce}", action.name());

        let data = match action {
            UpdateAction::Set => json!({
                "pk": subject,
                "key": request.key,
                "value": request.value,
                "sig": sig,
                "ram_payer": payer,
            }),
            UpdateAction::ChangeOwner => json!({
                "pk": subject,
                "new_owner_pk": request.new_key,
                "sig": sig,
                "ram_payer": payer,
            }),
            UpdateAction::Revoke => json!({ "pk": subject, "sig": sig, "ram_payer": payer }),
            UpdateAction::Clear => json!({ "pk": subject, "sig": sig }),
            UpdateAction::SetAccount => Value::Null,
        };
        Ok(self.broadcast_request(action, payer, data, payer_key))
    }

    /// `accsetattr` carries no owner signature, the contract requires the account's own
    /// authority instead. The action is authorized as `<account>@active` and the transaction is
    /// signed with the DID owner key, so no fee payer is involved.
    fn account_update(&self, request: &UpdateRequest) -> Result<BroadcastRequest, RegistrySignerError> {
        let action = request.action;
        let Subject::Account(account) = self.did.subject() else {
            return Err(RegistrySignerError::RequiresAccountDid {
                action: action.name().to_string(),
                did: self.did.to_string(),
            });
        };
        let data = json!({ "account": account, "key": request.key, "value": request.value });
        Ok(self.broadcast_request(action, account, data, &self.config.did_owner_private_key))
    }

    fn broadcast_request(
        &self,
        action: UpdateAction,
        actor: &str,
        data: Value,
        signing_key: &str,
    ) -> BroadcastRequest {
        BroadcastRequest {
            actions: vec![Action {
                account: self.registry.contract().to_string(),
                name: action.name().to_string(),
                authorization: vec![Authorization::active(actor)],
                data,
            }],
            signing_keys: vec![signing_key.to_string()],
            expire_seconds: EXPIRE_SECONDS,
            blocks_behind: BLOCKS_BEHIND,
        }
    }

    /// Set `key` to `value` on a public key DID
    pub async fn set_attribute(
        &self,
        key: &str,
        value: &str,
    ) -> Result<TransactionReceipt, RegistrySignerError> {
        self.sign_and_submit(&UpdateRequest {
            key: key.to_string(),
            value: value.to_string(),
            ..UpdateRequest::new(UpdateAction::Set)
        })
        .await
    }

    /// Transfer a public key DID to `new_owner`, a public key in any text form
    pub async fn change_owner(
        &self,
        new_owner: &str,
    ) -> Result<TransactionReceipt, RegistrySignerError> {
        self.sign_and_submit(&UpdateRequest {
            new_key: new_owner.to_string(),
            ..UpdateRequest::new(UpdateAction::ChangeOwner)
        })
        .await
    }

    pub async fn revoke(&self) -> Result<TransactionReceipt, RegistrySignerError> {
        self.sign_and_submit(&UpdateRequest::new(UpdateAction::Revoke))
            .await
    }

    pub async fn clear(&self) -> Result<TransactionReceipt, RegistrySignerError> {
        self.sign_and_submit(&UpdateRequest::new(UpdateAction::Clear))
            .await
    }

    /// Set `key` to `value` on an account DID
    pub async fn set_account_attribute(
        &self,
        key: &str,
        value: &str,
    ) -> Result<TransactionReceipt, RegistrySignerError> {
        self.sign_and_submit(&UpdateRequest {
            key: key.to_string(),
            value: value.to_string(),
            ..UpdateRequest::new(UpdateAction::SetAccount)
        })
        .await
    }

    /// A JWT issuer for this DID, signing `ES256K` with the owner key
    pub fn jwt_issuer(&self) -> JwtIssuer {
        JwtIssuer::new(
            self.did.to_string(),
            Arc::new(Es256kSigner::new(self.owner_key.clone())),
        )
    }
}

/// A freshly generated public key DID with its key pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubKeyDid {
    pub did: String,
    pub public_key: String,
    pub private_key: String,
}

/// Generate a random key pair and the `did:infra:<network_id>:PUB_K1_...` DID it controls
pub fn create_pub_key_did(network_id: &str) -> PubKeyDid {
    let private_key = PrivateKey::random();
    let public_key = private_key.public_key().to_string();
    PubKeyDid {
        did: format!("did:infra:{network_id}:{public_key}"),
        public_key,
        private_key: private_key.to_string(),
    }
}
