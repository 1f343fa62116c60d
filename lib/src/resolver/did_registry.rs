//! Row types of the did:infra registry contract, along with readers for each table.

use std::collections::BTreeMap;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::ledger::{AccountInfo, LedgerAccessor, TableRowsRequest};
use crate::{error::ResolverError, types::PublicKey};

/// Public key DIDs, with their nonce and attributes, indexed by key on position 2
pub const PUBKEY_DID_TABLE: &str = "pubkeydid";
/// Current owner key of a public key DID, by `pkid`
pub const PKDID_OWNER_TABLE: &str = "pkdidowner";
/// Attributes of account DIDs, by account name
pub const ACCOUNT_DID_ATTR_TABLE: &str = "accdidattr";

/// Nonce value the registry writes when a public key DID is revoked
pub const DEACTIVATED_NONCE: u64 = 65535;

/// How the `pubkeydid` secondary index value is derived from the 32 key bytes after the parity prefix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PubKeyIndex {
    /// SHA-256 digest of the key bytes
    #[default]
    Sha256,
    /// The key bytes themselves
    Raw,
}

impl PubKeyIndex {
    /// Hex encoded bound for a `sha256` keyed index query
    pub fn bound(&self, key: &PublicKey) -> String {
        match self {
            PubKeyIndex::Sha256 => hex::encode(Sha256::digest(key.index_bytes())),
            PubKeyIndex::Raw => hex::encode(key.index_bytes()),
        }
    }
}

/// A row of [`PUBKEY_DID_TABLE`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKeyDidRow {
    #[serde(deserialize_with = "number_or_string")]
    pub pkid: u64,
    #[serde(default)]
    pub pk: String,
    #[serde(default, deserialize_with = "number_or_string")]
    pub nonce: u64,
    #[serde(default, deserialize_with = "attributes")]
    pub attr: BTreeMap<String, String>,
}

impl PubKeyDidRow {
    pub fn is_revoked(&self) -> bool {
        self.nonce == DEACTIVATED_NONCE
    }
}

/// A row of [`PKDID_OWNER_TABLE`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkDidOwnerRow {
    #[serde(deserialize_with = "number_or_string")]
    pub pkid: u64,
    pub pk: String,
}

/// A row of [`ACCOUNT_DID_ATTR_TABLE`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccDidAttrRow {
    pub account: String,
    #[serde(default, deserialize_with = "attributes")]
    pub attr: BTreeMap<String, String>,
}

/// 64 bit integers are rendered as JSON numbers or, when large, as strings
fn number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Number(u64),
        Text(String),
    }

    match Field::deserialize(deserializer)? {
        Field::Number(n) => Ok(n),
        Field::Text(s) => s.parse().map_err(de::Error::custom),
    }
}

/// Attribute columns come either as a JSON object or as the ABI map encoding, a list of pairs
fn attributes<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Pair {
        #[serde(alias = "first")]
        key: String,
        #[serde(alias = "second")]
        value: String,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Column {
        Object(BTreeMap<String, String>),
        Pairs(Vec<Pair>),
    }

    Ok(match Option::<Column>::deserialize(deserializer)? {
        Some(Column::Object(map)) => map,
        Some(Column::Pairs(pairs)) => pairs.into_iter().map(|p| (p.key, p.value)).collect(),
        None => BTreeMap::new(),
    })
}

fn first_row<T: for<'de> Deserialize<'de>>(
    table: &'static str,
    rows: Vec<Value>,
) -> Result<Option<T>, ResolverError> {
    rows.into_iter()
        .next()
        .map(|row| serde_json::from_value(row))
        .transpose()
        .map_err(|source| ResolverError::MalformedRow { table, source })
}

/// Reader for the registry contract tables on one network
#[derive(Debug, Clone)]
pub struct DidRegistry<L> {
    ledger: L,
    contract: String,
    pubkey_index: PubKeyIndex,
}

impl<L: LedgerAccessor> DidRegistry<L> {
    pub fn new<S: Into<String>>(ledger: L, contract: S, pubkey_index: PubKeyIndex) -> Self {
        Self {
            ledger,
            contract: contract.into(),
            pubkey_index,
        }
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Look up the `pubkeydid` row of a public key
    pub async fn pub_key_did(&self, key: &PublicKey) -> Result<Option<PubKeyDidRow>, ResolverError> {
        let bound = self.pubkey_index.bound(key);
        log::trace!("Fetching {PUBKEY_DID_TABLE} for {key} at index {bound}");
        let request = TableRowsRequest::new(&self.contract, PUBKEY_DID_TABLE)
            .index(2, "sha256")
            .exact(bound);
        first_row(PUBKEY_DID_TABLE, self.ledger.get_table_rows(request).await?)
    }

    /// Look up the current owner of a public key DID
    pub async fn pk_did_owner(&self, pkid: u64) -> Result<Option<PkDidOwnerRow>, ResolverError> {
        log::trace!("Fetching {PKDID_OWNER_TABLE} for pkid {pkid}");
        let request = TableRowsRequest::new(&self.contract, PKDID_OWNER_TABLE)
            .index(1, "i64")
            .exact(pkid.to_string());
        let row: Option<PkDidOwnerRow> =
            first_row(PKDID_OWNER_TABLE, self.ledger.get_table_rows(request).await?)?;
        Ok(row.filter(|row| row.pkid == pkid))
    }

    /// Look up the attributes of an account DID
    pub async fn account_did_attr(
        &self,
        account: &str,
    ) -> Result<Option<AccDidAttrRow>, ResolverError> {
        log::trace!("Fetching {ACCOUNT_DID_ATTR_TABLE} for {account}");
        let request = TableRowsRequest::new(&self.contract, ACCOUNT_DID_ATTR_TABLE)
            .index(1, "name")
            .exact(account);
        first_row(
            ACCOUNT_DID_ATTR_TABLE,
            self.ledger.get_table_rows(request).await?,
        )
    }

    pub async fn account(&self, account: &str) -> Result<Option<AccountInfo>, ResolverError> {
        log::trace!("Fetching account {account}");
        Ok(self.ledger.get_account(account).await?)
    }

    /// Current anti-replay nonce of a public key DID, zero when the key has no row yet
    pub async fn nonce(&self, key: &PublicKey) -> Result<u64, ResolverError> {
        Ok(self
            .pub_key_did(key)
            .await?
            .map(|row| row.nonce)
            .unwrap_or_default())
    }
}
