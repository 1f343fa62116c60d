//! [`LedgerAccessor`] over the chain HTTP API of a ledger node

use std::str::FromStr;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use super::{
    ledger::{
        AccountInfo, Action, BroadcastRequest, LedgerAccessor, TableRowsRequest,
        TransactionReceipt,
    },
    transaction::{self, name_to_u64, PackedAction, Transaction, TransactionHeader},
};
use crate::{error::LedgerError, types::PrivateKey};

#[derive(Debug, Clone, Deserialize)]
pub struct ChainInfo {
    pub chain_id: String,
    pub head_block_num: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockInfo {
    pub id: String,
    pub block_num: u32,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
struct TableRows {
    rows: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct BinArgs {
    binargs: String,
}

#[derive(Debug, Serialize)]
struct PushTransaction {
    signatures: Vec<String>,
    compression: &'static str,
    packed_context_free_data: String,
    packed_trx: String,
}

/// JSON client for `/v1/chain/*`
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RpcClient {
    pub fn new(endpoint: &str) -> Result<Self, LedgerError> {
        let endpoint = Url::parse(endpoint)?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<Req: Serialize + ?Sized, Res: DeserializeOwned>(
        &self,
        method: &str,
        body: &Req,
    ) -> Result<Res, LedgerError> {
        let url = format!("{}/v1/chain/{}", self.endpoint, method);
        log::trace!("POST {url}");
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("{url} responded with {status}: {body}");
            return Err(LedgerError::Rpc {
                endpoint: url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    pub async fn get_info(&self) -> Result<ChainInfo, LedgerError> {
        self.call("get_info", &json!({})).await
    }

    pub async fn get_block(&self, block_num: u32) -> Result<BlockInfo, LedgerError> {
        self.call("get_block", &json!({ "block_num_or_id": block_num }))
            .await
    }

    /// Pack the JSON arguments of `action` with the contract's ABI
    pub async fn abi_json_to_bin(&self, action: &Action) -> Result<Vec<u8>, LedgerError> {
        let bin: BinArgs = self
            .call(
                "abi_json_to_bin",
                &json!({ "code": action.account, "action": action.name, "args": action.data }),
            )
            .await?;
        Ok(hex::decode(bin.binargs)?)
    }

    async fn pack_action(&self, action: &Action) -> Result<PackedAction, LedgerError> {
        let authorization = action
            .authorization
            .iter()
            .map(|auth| -> Result<(u64, u64), LedgerError> {
                Ok((name_to_u64(&auth.actor)?, name_to_u64(&auth.permission)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PackedAction {
            account: name_to_u64(&action.account)?,
            name: name_to_u64(&action.name)?,
            authorization,
            data: self.abi_json_to_bin(action).await?,
        })
    }
}

/// Nodes answer `get_account` for a missing account with an error naming the unknown key
fn is_unknown_account(body: &str) -> bool {
    let Ok(error) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    let error = &error["error"];
    error["name"] == "account_query_exception"
        || error["details"].as_array().is_some_and(|details| {
            details.iter().any(|detail| {
                detail["message"]
                    .as_str()
                    .is_some_and(|m| m.starts_with("unknown key") || m.contains("does not exist"))
            })
        })
}

#[async_trait]
impl LedgerAccessor for RpcClient {
    async fn get_table_rows(&self, request: TableRowsRequest) -> Result<Vec<Value>, LedgerError> {
        let rows: TableRows = self.call("get_table_rows", &request).await?;
        log::trace!("{} returned {} rows", request.table, rows.rows.len());
        Ok(rows.rows)
    }

    async fn get_account(&self, account: &str) -> Result<Option<AccountInfo>, LedgerError> {
        match self
            .call("get_account", &json!({ "account_name": account }))
            .await
        {
            Ok(info) => Ok(Some(info)),
            Err(LedgerError::Rpc { ref body, .. }) if is_unknown_account(body) => {
                log::debug!("Account {account} does not exist");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn broadcast_transaction(
        &self,
        request: BroadcastRequest,
    ) -> Result<TransactionReceipt, LedgerError> {
        let info = self.get_info().await?;
        let reference = self
            .get_block(info.head_block_num.saturating_sub(request.blocks_behind))
            .await?;

        let mut actions = Vec::with_capacity(request.actions.len());
        for action in &request.actions {
            actions.push(self.pack_action(action).await?);
        }

        let transaction = Transaction {
            header: TransactionHeader {
                expiration: transaction::block_time(&reference.timestamp)?
                    + request.expire_seconds,
                ref_block_num: (reference.block_num & 0xffff) as u16,
                ref_block_prefix: transaction::ref_block_prefix(&reference.id)?,
                ..Default::default()
            },
            actions,
        };
        let packed = transaction.pack();

        let chain_id: [u8; 32] = hex::decode(&info.chain_id)?
            .try_into()
            .map_err(|_| LedgerError::Transport(format!("invalid chain id {}", info.chain_id)))?;
        let digest = transaction::signing_digest(&chain_id, &packed);

        let signatures = request
            .signing_keys
            .iter()
            .map(|key| -> Result<String, LedgerError> {
                Ok(PrivateKey::from_str(key)?.sign_digest(&digest)?.to_string())
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Pushing transaction with {} actions referencing block {}",
            transaction.actions.len(),
            reference.block_num
        );
        self.call(
            "push_transaction",
            &PushTransaction {
                signatures,
                compression: "none",
                packed_context_free_data: String::new(),
                packed_trx: hex::encode(packed),
            },
        )
        .await
    }
}
