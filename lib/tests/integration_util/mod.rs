//! Shared setup code for integration tests
use std::{
    collections::{BTreeMap, HashMap},
    str::FromStr,
    sync::{Arc, Mutex, Once},
};

use async_trait::async_trait;
use lib_didinfra::{
    did_registry::{PubKeyIndex, DEACTIVATED_NONCE},
    error::LedgerError,
    registry_signer::{NonceEncoding, UpdateAction, UpdateRequest, DEFAULT_SIGN_DATA_PREFIX},
    resolver::ledger::{
        AccountInfo, BroadcastRequest, KeyWeight, LedgerAccessor, Permission, RequiredAuth,
        TableRowsRequest, TransactionReceipt,
    },
    types::{EosioSignature, PublicKey},
    NetworkConfiguration, Resolver,
};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const NETWORK: &str = "testnet";
pub const CONTRACT: &str = "fmapkumrotfc";
pub const FEE_PAYER: &str = "feepayer1111";
pub const FEE_PAYER_KEY: &str = "PVT_K1_G2tdbQSvZJDeH6TLx4rukJb9chMVeT75wgVxHvLHfifgXWePe";

static INIT: Once = Once::new();

pub(crate) fn init_logging() {
    INIT.call_once(|| {
        Registry::default()
            .with(fmt::layer().compact())
            .with(EnvFilter::from_default_env())
            .init()
    })
}

#[derive(Default)]
struct PubKeyDid {
    pkid: u64,
    pk: String,
    nonce: u64,
    attr: BTreeMap<String, String>,
}

#[derive(Default)]
struct State {
    /// by index value
    pub_key_dids: HashMap<String, PubKeyDid>,
    /// owner key by pkid
    owners: HashMap<u64, String>,
    account_attrs: HashMap<String, BTreeMap<String, String>>,
    accounts: HashMap<String, AccountInfo>,
    next_pkid: u64,
    transactions: u64,
}

/// A registry contract kept in memory.
/// Public key DID updates are checked against the owner's signature and nonce like the contract does.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
}

impl InMemoryLedger {
    pub fn with_account(self, name: &str, key: &str) -> Self {
        self.state.lock().unwrap().accounts.insert(
            name.to_string(),
            AccountInfo {
                account_name: name.to_string(),
                permissions: vec![Permission {
                    perm_name: "active".into(),
                    parent: "owner".into(),
                    required_auth: RequiredAuth {
                        threshold: 1,
                        keys: vec![KeyWeight {
                            key: key.to_string(),
                            weight: 1,
                        }],
                    },
                }],
            },
        );
        self
    }

    /// Number of transactions accepted so far
    pub fn transactions(&self) -> u64 {
        self.state.lock().unwrap().transactions
    }

    fn apply(state: &mut State, name: &str, data: &Value) -> Result<(), String> {
        let field = |f: &str| data[f].as_str().unwrap_or_default().to_string();

        if name == UpdateAction::SetAccount.name() {
            state
                .account_attrs
                .entry(field("account"))
                .or_default()
                .insert(field("key"), field("value"));
            return Ok(());
        }

        let pk = field("pk");
        let key = PublicKey::from_str(&pk).map_err(|e| e.to_string())?;
        let index = PubKeyIndex::Sha256.bound(&key);
        let next_pkid = state.next_pkid;
        let row = state.pub_key_dids.entry(index.clone()).or_insert_with(|| PubKeyDid {
            pkid: next_pkid,
            pk: pk.clone(),
            ..Default::default()
        });
        if row.pkid == next_pkid {
            state.next_pkid += 1;
            state.owners.insert(row.pkid, pk.clone());
        }
        let owner = state.owners.get(&row.pkid).cloned().unwrap_or_default();

        let action = [
            UpdateAction::Set,
            UpdateAction::ChangeOwner,
            UpdateAction::Revoke,
            UpdateAction::Clear,
        ]
        .into_iter()
        .find(|a| a.name() == name)
        .ok_or_else(|| format!("unknown action {name}"))?;
        let request = UpdateRequest {
            action,
            key: field("key"),
            value: field("value"),
            new_key: field("new_owner_pk"),
        };
        let buffer = request.signing_buffer(
            DEFAULT_SIGN_DATA_PREFIX,
            &pk,
            row.nonce,
            NonceEncoding::Truncated,
        );
        let digest: [u8; 32] = Sha256::digest(&buffer).into();
        let signer = EosioSignature::from_str(&field("sig"))
            .and_then(|sig| sig.recover(&digest))
            .map_err(|e| e.to_string())?;
        if signer != PublicKey::from_str(&owner).map_err(|e| e.to_string())? {
            return Err("assertion failure with message: invalid signature".into());
        }

        match action {
            UpdateAction::Set => {
                row.attr.insert(request.key, request.value);
                row.nonce += 1;
            }
            UpdateAction::ChangeOwner => {
                row.nonce += 1;
                let pkid = row.pkid;
                state.owners.insert(pkid, request.new_key);
            }
            UpdateAction::Revoke => row.nonce = DEACTIVATED_NONCE,
            UpdateAction::Clear => {
                let pkid = row.pkid;
                state.pub_key_dids.remove(&index);
                state.owners.remove(&pkid);
            }
            UpdateAction::SetAccount => {}
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerAccessor for InMemoryLedger {
    async fn get_table_rows(&self, request: TableRowsRequest) -> Result<Vec<Value>, LedgerError> {
        let state = self.state.lock().unwrap();
        let bound = request.lower_bound.unwrap_or_default();
        let row = match request.table.as_str() {
            "pubkeydid" => state.pub_key_dids.get(&bound).map(|row| {
                json!({"pkid": row.pkid, "pk": row.pk, "nonce": row.nonce, "attr": row.attr})
            }),
            "pkdidowner" => bound
                .parse::<u64>()
                .ok()
                .and_then(|pkid| state.owners.get(&pkid).map(|pk| json!({"pkid": pkid, "pk": pk}))),
            "accdidattr" => state
                .account_attrs
                .get(&bound)
                .map(|attr| json!({"account": bound, "attr": attr})),
            _ => None,
        };
        Ok(row.into_iter().collect())
    }

    async fn get_account(&self, account: &str) -> Result<Option<AccountInfo>, LedgerError> {
        Ok(self.state.lock().unwrap().accounts.get(account).cloned())
    }

    async fn broadcast_transaction(
        &self,
        request: BroadcastRequest,
    ) -> Result<TransactionReceipt, LedgerError> {
        let mut state = self.state.lock().unwrap();
        for action in &request.actions {
            if action.account != CONTRACT {
                return Err(LedgerError::Transport(format!("unknown contract {}", action.account)));
            }
            Self::apply(&mut state, &action.name, &action.data).map_err(LedgerError::Transport)?;
        }
        state.transactions += 1;
        Ok(TransactionReceipt {
            transaction_id: format!("{:064x}", state.transactions),
            processed: json!({}),
        })
    }
}

pub fn network() -> NetworkConfiguration {
    NetworkConfiguration::new(NETWORK, "http://127.0.0.1:8888", CONTRACT)
}

pub fn resolver(ledger: Arc<InMemoryLedger>) -> Resolver<Arc<InMemoryLedger>> {
    Resolver::empty(false).with_network(&network(), ledger)
}

/// Run `fun` against a JSON-RPC server resolving from `ledger`
#[cfg(all(feature = "server", feature = "client"))]
pub async fn with_client<F, R, T>(ledger: Arc<InMemoryLedger>, fun: F) -> anyhow::Result<T>
where
    F: FnOnce(jsonrpsee::ws_client::WsClient) -> R,
    R: std::future::Future<Output = anyhow::Result<T>>,
{
    use jsonrpsee::{server::Server, ws_client::WsClientBuilder};
    use lib_didinfra::{rpc::DidRegistryMethods, DidRegistryServer};

    init_logging();
    let server = Server::builder().build("127.0.0.1:0").await?;
    let addr = server.local_addr()?;
    let handle = server.start(DidRegistryMethods::new(resolver(ledger)).into_rpc());

    let client = WsClientBuilder::default()
        .build(&format!("ws://{addr}"))
        .await?;
    let result = fun(client).await;

    handle.stop()?;
    handle.stopped().await;
    result
}
