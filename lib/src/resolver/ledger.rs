//! Interface to the EOSIO ledger holding the did:infra registry

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LedgerError;

/// Name of the permission whose first key controls an account DID
pub const ACTIVE_PERMISSION: &str = "active";

/// Parameters of `/v1/chain/get_table_rows`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRowsRequest {
    pub code: String,
    pub scope: String,
    pub table: String,
    pub json: bool,
    pub index_position: String,
    pub key_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<String>,
    pub limit: u32,
}

impl TableRowsRequest {
    /// A JSON row query against `table` of `contract`, scoped to the contract itself
    pub fn new(contract: &str, table: &str) -> Self {
        Self {
            code: contract.to_string(),
            scope: contract.to_string(),
            table: table.to_string(),
            json: true,
            index_position: "1".to_string(),
            key_type: "i64".to_string(),
            lower_bound: None,
            upper_bound: None,
            limit: 1,
        }
    }

    pub fn index(mut self, position: u8, key_type: &str) -> Self {
        self.index_position = position.to_string();
        self.key_type = key_type.to_string();
        self
    }

    pub fn lower_bound<S: Into<String>>(mut self, bound: S) -> Self {
        self.lower_bound = Some(bound.into());
        self
    }

    pub fn upper_bound<S: Into<String>>(mut self, bound: S) -> Self {
        self.upper_bound = Some(bound.into());
        self
    }

    /// Set both bounds, selecting exactly `key`
    pub fn exact<S: Into<String>>(self, key: S) -> Self {
        let key = key.into();
        self.lower_bound(key.clone()).upper_bound(key)
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyWeight {
    pub key: String,
    #[serde(default)]
    pub weight: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredAuth {
    #[serde(default)]
    pub threshold: u32,
    #[serde(default)]
    pub keys: Vec<KeyWeight>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub perm_name: String,
    #[serde(default)]
    pub parent: String,
    pub required_auth: RequiredAuth,
}

/// The parts of `/v1/chain/get_account` used for resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl AccountInfo {
    /// First key authorized by the `active` permission
    pub fn active_key(&self) -> Option<&str> {
        self.permissions
            .iter()
            .find(|p| p.perm_name == ACTIVE_PERMISSION)
            .and_then(|p| p.required_auth.keys.first())
            .map(|k| k.key.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub actor: String,
    pub permission: String,
}

impl Authorization {
    pub fn active<S: Into<String>>(actor: S) -> Self {
        Self {
            actor: actor.into(),
            permission: ACTIVE_PERMISSION.to_string(),
        }
    }
}

/// A contract action with its arguments still in JSON form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub account: String,
    pub name: String,
    pub authorization: Vec<Authorization>,
    pub data: Value,
}

/// Everything needed to pack, sign and push one transaction
#[derive(Debug, Clone)]
pub struct BroadcastRequest {
    pub actions: Vec<Action>,
    /// Private keys in `PVT_K1_` or WIF form, each signs the transaction
    pub signing_keys: Vec<String>,
    /// Seconds after the reference block the transaction expires
    pub expire_seconds: u32,
    /// How far below head the reference block is taken
    pub blocks_behind: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_id: String,
    #[serde(default)]
    pub processed: Value,
}

/// Read and write access to the ledger.
/// Implementations should surface every failure, a missing row is an empty `Vec` and never an error.
#[async_trait]
pub trait LedgerAccessor: Send + Sync {
    async fn get_table_rows(&self, request: TableRowsRequest) -> Result<Vec<Value>, LedgerError>;

    /// `None` when the ledger has no such account
    async fn get_account(&self, account: &str) -> Result<Option<AccountInfo>, LedgerError>;

    async fn broadcast_transaction(
        &self,
        request: BroadcastRequest,
    ) -> Result<TransactionReceipt, LedgerError>;
}

#[async_trait]
impl<T: LedgerAccessor + ?Sized> LedgerAccessor for std::sync::Arc<T> {
    async fn get_table_rows(&self, request: TableRowsRequest) -> Result<Vec<Value>, LedgerError> {
        (**self).get_table_rows(request).await
    }

    async fn get_account(&self, account: &str) -> Result<Option<AccountInfo>, LedgerError> {
        (**self).get_account(account).await
    }

    async fn broadcast_transaction(
        &self,
        request: BroadcastRequest,
    ) -> Result<TransactionReceipt, LedgerError> {
        (**self).broadcast_transaction(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_rows_request_json() {
        let request = TableRowsRequest::new("fmapkumrotfc", "pubkeydid")
            .index(2, "sha256")
            .exact("abcd");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "code": "fmapkumrotfc",
                "scope": "fmapkumrotfc",
                "table": "pubkeydid",
                "json": true,
                "index_position": "2",
                "key_type": "sha256",
                "lower_bound": "abcd",
                "upper_bound": "abcd",
                "limit": 1
            })
        );
    }

    #[test]
    fn test_active_key() {
        let account: AccountInfo = serde_json::from_value(json!({
            "account_name": "alice",
            "permissions": [
                {"perm_name": "owner", "parent": "", "required_auth": {"threshold": 1, "keys": [{"key": "EOS_OWNER", "weight": 1}]}},
                {"perm_name": "active", "parent": "owner", "required_auth": {"threshold": 1, "keys": [{"key": "EOS_ACTIVE", "weight": 1}, {"key": "EOS_SECOND", "weight": 1}]}}
            ]
        }))
        .unwrap();
        assert_eq!(account.active_key(), Some("EOS_ACTIVE"));

        let empty = AccountInfo {
            account_name: "bob".into(),
            permissions: vec![],
        };
        assert_eq!(empty.active_key(), None);
    }
}
