//! Cosmos RPC Client - Tendermint RPC access for queries, simulation and broadcast
//!
//! [`CosmosRpc`] wraps a Tendermint `HttpClient` and bounds every call with an
//! explicit timeout. gRPC services (auth, bank, tx, wasm) are reached through
//! `abci_query` with their fully qualified method path, so a single RPC URL is
//! all the bot needs.
//!
//! [`AurandContract`] layers the contract's smart queries on top and is what
//! the oracle loop sees as its [`ChainReader`].

use crate::broadcast::{TxResponse, TxSubmitter};
use crate::chain::{BotInfo, ChainReader, GasSimulator};
use crate::error::ChainError;
use crate::msg::{NumberOfCommitmentResponse, QueryMsg};
use crate::sequence::SignData;
use async_trait::async_trait;
use bytes::Bytes;
use core_logic::NetworkError;
use cosmrs::proto::cosmos::auth::v1beta1::{BaseAccount, QueryAccountRequest, QueryAccountResponse};
use cosmrs::proto::cosmos::bank::v1beta1::{QueryBalanceRequest, QueryBalanceResponse};
use cosmrs::proto::cosmos::vesting::v1beta1::{
    BaseVestingAccount, ContinuousVestingAccount, DelayedVestingAccount, PeriodicVestingAccount,
    PermanentLockedAccount,
};
use cosmrs::proto::cosmos::tx::v1beta1::{SimulateRequest, SimulateResponse};
use cosmrs::proto::cosmwasm::wasm::v1::{
    QuerySmartContractStateRequest, QuerySmartContractStateResponse,
};
use cosmrs::rpc::client::CompatMode;
use cosmrs::rpc::{Client, HttpClient};
use cosmrs::Any;
use prost::Message;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const ACCOUNT_QUERY_PATH: &str = "/cosmos.auth.v1beta1.Query/Account";
const BALANCE_QUERY_PATH: &str = "/cosmos.bank.v1beta1.Query/Balance";
const SIMULATE_PATH: &str = "/cosmos.tx.v1beta1.Service/Simulate";
const SMART_QUERY_PATH: &str = "/cosmwasm.wasm.v1.Query/SmartContractState";

const BASE_ACCOUNT_TYPE_URL: &str = "/cosmos.auth.v1beta1.BaseAccount";
const CONTINUOUS_VESTING_TYPE_URL: &str = "/cosmos.vesting.v1beta1.ContinuousVestingAccount";
const DELAYED_VESTING_TYPE_URL: &str = "/cosmos.vesting.v1beta1.DelayedVestingAccount";
const PERIODIC_VESTING_TYPE_URL: &str = "/cosmos.vesting.v1beta1.PeriodicVestingAccount";
const PERMANENT_LOCKED_TYPE_URL: &str = "/cosmos.vesting.v1beta1.PermanentLockedAccount";

pub struct CosmosRpc {
    client: HttpClient,
    endpoint: String,
    timeout: Duration,
}

impl CosmosRpc {
    /// Connects and picks the RPC dialect matching the node's version.
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self, ChainError> {
        let mut client = HttpClient::new(endpoint).map_err(|e| {
            ChainError::Network(NetworkError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
        })?;

        let mut rpc = Self {
            client: client.clone(),
            endpoint: endpoint.to_string(),
            timeout,
        };

        let status = rpc.call(rpc.client.status()).await?;
        match CompatMode::from_version(status.node_info.version) {
            Ok(mode) => {
                debug!(endpoint, ?mode, "Detected RPC dialect");
                client.set_compat_mode(mode);
                rpc.client = client;
            }
            Err(e) => warn!(endpoint, error = %e, "Unknown node version, using default dialect"),
        }

        Ok(rpc)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Applies the per-call timeout and maps transport errors.
    async fn call<T, F>(&self, request: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, cosmrs::rpc::Error>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ChainError::Rpc {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ChainError::Network(NetworkError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
                endpoint: self.endpoint.clone(),
            })),
        }
    }

    pub async fn chain_id(&self) -> Result<String, ChainError> {
        let status = self.call(self.client.status()).await?;
        Ok(status.node_info.network.to_string())
    }

    pub async fn latest_height(&self) -> Result<u64, ChainError> {
        let status = self.call(self.client.status()).await?;
        Ok(status.sync_info.latest_block_height.value())
    }

    /// Runs a protobuf gRPC query through ABCI.
    async fn grpc_query<Req, Resp>(&self, path: &str, request: Req) -> Result<Resp, ChainError>
    where
        Req: Message,
        Resp: Message + Default,
    {
        let response = self
            .call(
                self.client
                    .abci_query(Some(path.to_string()), request.encode_to_vec(), None, false),
            )
            .await?;

        if response.code.is_err() {
            return Err(ChainError::QueryFailed {
                path: path.to_string(),
                code: response.code.value(),
                log: response.log,
            });
        }

        Resp::decode(response.value.as_slice()).map_err(|e| ChainError::Decode {
            what: path.to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn smart_query<T: DeserializeOwned>(
        &self,
        contract: &str,
        msg: &QueryMsg,
    ) -> Result<T, ChainError> {
        let query_data = serde_json::to_vec(msg).map_err(|e| ChainError::Decode {
            what: "smart query".to_string(),
            reason: e.to_string(),
        })?;

        let response: QuerySmartContractStateResponse = self
            .grpc_query(
                SMART_QUERY_PATH,
                QuerySmartContractStateRequest {
                    address: contract.to_string(),
                    query_data,
                },
            )
            .await?;

        serde_json::from_slice(&response.data).map_err(|e| ChainError::Decode {
            what: "smart query response".to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn base_account(&self, address: &str) -> Result<BaseAccount, ChainError> {
        let result: Result<QueryAccountResponse, ChainError> = self
            .grpc_query(
                ACCOUNT_QUERY_PATH,
                QueryAccountRequest {
                    address: address.to_string(),
                },
            )
            .await;

        let response = match result {
            Err(ChainError::QueryFailed { log, .. }) if log.contains("not found") => {
                return Err(ChainError::AccountNotFound {
                    address: address.to_string(),
                })
            }
            other => other?,
        };

        let account = response.account.ok_or_else(|| ChainError::AccountNotFound {
            address: address.to_string(),
        })?;

        decode_base_account(&account)
    }

    pub async fn sign_data(&self, address: &str) -> Result<SignData, ChainError> {
        let (chain_id, account) = tokio::try_join!(self.chain_id(), self.base_account(address))?;
        Ok(SignData::new(chain_id, account.account_number, account.sequence))
    }

    pub async fn balance(&self, address: &str, denom: &str) -> Result<u128, ChainError> {
        let response: QueryBalanceResponse = self
            .grpc_query(
                BALANCE_QUERY_PATH,
                QueryBalanceRequest {
                    address: address.to_string(),
                    denom: denom.to_string(),
                },
            )
            .await?;

        match response.balance {
            Some(coin) => coin.amount.parse().map_err(|_| ChainError::Decode {
                what: "balance".to_string(),
                reason: format!("invalid amount '{}'", coin.amount),
            }),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl GasSimulator for CosmosRpc {
    async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64, ChainError> {
        #[allow(deprecated)]
        let request = SimulateRequest { tx: None, tx_bytes };

        let response: SimulateResponse = self.grpc_query(SIMULATE_PATH, request).await?;
        response
            .gas_info
            .map(|info| info.gas_used)
            .ok_or_else(|| ChainError::Decode {
                what: "simulation".to_string(),
                reason: "response has no gas info".to_string(),
            })
    }
}

#[async_trait]
impl TxSubmitter for CosmosRpc {
    async fn broadcast_tx(&self, tx_bytes: Bytes) -> Result<TxResponse, ChainError> {
        let response = self
            .call(self.client.broadcast_tx_commit(tx_bytes.to_vec()))
            .await?;

        let hash = response.hash.to_string();

        // Rejected by CheckTx: never made it into a block
        if response.check_tx.code.is_err() {
            return Ok(TxResponse {
                code: response.check_tx.code.value(),
                log: response.check_tx.log,
                transaction_hash: hash,
                height: 0,
                gas_used: clamp_gas(response.check_tx.gas_used),
                gas_wanted: clamp_gas(response.check_tx.gas_wanted),
            });
        }

        Ok(TxResponse {
            code: response.tx_result.code.value(),
            log: response.tx_result.log,
            transaction_hash: hash,
            height: response.height.value(),
            gas_used: clamp_gas(response.tx_result.gas_used),
            gas_wanted: clamp_gas(response.tx_result.gas_wanted),
        })
    }
}

/// Unwraps the `BaseAccount` inside an account `Any`. Vesting accounts carry
/// their sequence in the nested base account.
pub fn decode_base_account(account: &Any) -> Result<BaseAccount, ChainError> {
    let bytes = account.value.as_slice();
    let base_vesting = match account.type_url.as_str() {
        BASE_ACCOUNT_TYPE_URL => return decode_proto::<BaseAccount>(bytes),
        CONTINUOUS_VESTING_TYPE_URL => {
            decode_proto::<ContinuousVestingAccount>(bytes)?.base_vesting_account
        }
        DELAYED_VESTING_TYPE_URL => {
            decode_proto::<DelayedVestingAccount>(bytes)?.base_vesting_account
        }
        PERIODIC_VESTING_TYPE_URL => {
            decode_proto::<PeriodicVestingAccount>(bytes)?.base_vesting_account
        }
        PERMANENT_LOCKED_TYPE_URL => {
            decode_proto::<PermanentLockedAccount>(bytes)?.base_vesting_account
        }
        other => {
            return Err(ChainError::Decode {
                what: "account".to_string(),
                reason: format!("unsupported account type {}", other),
            })
        }
    };

    base_vesting
        .and_then(|v: BaseVestingAccount| v.base_account)
        .ok_or_else(|| ChainError::Decode {
            what: "account".to_string(),
            reason: format!("{} has no base account", account.type_url),
        })
}

fn decode_proto<T: Message + Default>(bytes: &[u8]) -> Result<T, ChainError> {
    T::decode(bytes).map_err(|e| ChainError::Decode {
        what: "account".to_string(),
        reason: e.to_string(),
    })
}

fn clamp_gas(gas: i64) -> u64 {
    u64::try_from(gas).unwrap_or(0)
}

/// The aurand contract as seen through one RPC endpoint.
pub struct AurandContract {
    rpc: Arc<CosmosRpc>,
    contract: String,
}

impl AurandContract {
    pub fn new(rpc: Arc<CosmosRpc>, contract: impl Into<String>) -> Self {
        Self {
            rpc,
            contract: contract.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.contract
    }
}

#[async_trait]
impl ChainReader for AurandContract {
    async fn pending_commitment_count(&self) -> Result<u64, ChainError> {
        let response: NumberOfCommitmentResponse = self
            .rpc
            .smart_query(&self.contract, &QueryMsg::GetNumberOfCommitment {})
            .await?;
        Ok(response.num)
    }

    async fn bot_info(&self, address: &str) -> Result<Option<BotInfo>, ChainError> {
        self.rpc
            .smart_query(
                &self.contract,
                &QueryMsg::GetBotInfo {
                    address: address.to_string(),
                },
            )
            .await
    }

    async fn chain_truth(&self, address: &str) -> Result<SignData, ChainError> {
        self.rpc.sign_data(address).await
    }

    async fn balance(&self, address: &str, denom: &str) -> Result<u128, ChainError> {
        self.rpc.balance(address, denom).await
    }
}
