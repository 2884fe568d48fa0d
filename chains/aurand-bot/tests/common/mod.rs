//! In-memory stand-ins for the chain, the provider and the RPC endpoints.

#![allow(dead_code)]

use async_trait::async_trait;
use aurand_bot::{
    BotInfo, Broadcaster, ChainError, ChainReader, ExecuteMsg, FeePolicy, GasPrice, GasSimulator,
    Oracle, OracleComponents, OracleSettings, ProviderError, RandomRequest, RandomValue,
    RandomnessProvider, SignData, TxResponse, TxSubmitter, Wallet,
};
use bytes::Bytes;
use core_logic::{MetricsCollector, NetworkError};
use cosmrs::tx::Msg;
use cosmrs::AccountId;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CHAIN_ID: &str = "aura-testnet-2";
pub const PREFIX: &str = "aura";

pub fn contract() -> AccountId {
    AccountId::new(PREFIX, &[0xAB; 32]).unwrap()
}

pub fn wallet() -> Arc<Wallet> {
    Arc::new(Wallet::from_private_key(&[0x11; 32], PREFIX).unwrap())
}

// --- Chain ---

pub struct FakeChain {
    pub pending: Mutex<u64>,
    pub truth: Mutex<SignData>,
    pub bot_info: Mutex<Option<BotInfo>>,
    pub truth_calls: AtomicUsize,
    pub bot_info_calls: AtomicUsize,
    /// When set, account queries fail as if the node were gone
    pub truth_unavailable: AtomicBool,
}

impl FakeChain {
    pub fn new(pending: u64, truth: SignData) -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(pending),
            truth: Mutex::new(truth),
            bot_info: Mutex::new(None),
            truth_calls: AtomicUsize::new(0),
            bot_info_calls: AtomicUsize::new(0),
            truth_unavailable: AtomicBool::new(false),
        })
    }

    pub fn set_truth(&self, truth: SignData) {
        *self.truth.lock().unwrap() = truth;
    }

    pub fn lose_account_access(&self) {
        self.truth_unavailable.store(true, Ordering::SeqCst);
    }

    pub fn set_pending(&self, pending: u64) {
        *self.pending.lock().unwrap() = pending;
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn pending_commitment_count(&self) -> Result<u64, ChainError> {
        Ok(*self.pending.lock().unwrap())
    }

    async fn bot_info(&self, _address: &str) -> Result<Option<BotInfo>, ChainError> {
        self.bot_info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.bot_info.lock().unwrap().clone())
    }

    async fn chain_truth(&self, _address: &str) -> Result<SignData, ChainError> {
        self.truth_calls.fetch_add(1, Ordering::SeqCst);
        if self.truth_unavailable.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc {
                endpoint: "http://primary:26657".to_string(),
                reason: "account query unavailable".to_string(),
            });
        }
        Ok(self.truth.lock().unwrap().clone())
    }

    async fn balance(&self, _address: &str, _denom: &str) -> Result<u128, ChainError> {
        Ok(1_000_000)
    }
}

// --- Randomness provider ---

pub struct FakeProvider {
    responses: Mutex<VecDeque<Result<RandomValue, ProviderError>>>,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(responses: Vec<Result<RandomValue, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RandomnessProvider for FakeProvider {
    async fn fetch_signed_random(
        &self,
        _request: RandomRequest,
    ) -> Result<RandomValue, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::InvalidResponse {
                    reason: "no scripted response left".to_string(),
                })
            })
    }
}

/// 32 values in [0, 255], shaped like a random.org `random` object
pub fn random_value(signature: &str) -> RandomValue {
    let data: Vec<u32> = (0..32).map(|i| (i * 7 + 3) % 256).collect();
    let random = serde_json::json!({
        "method": "generateSignedIntegers",
        "hashedApiKey": "NdMSNxN+1kGMKhOB",
        "n": 32,
        "min": 0,
        "max": 255,
        "replacement": true,
        "base": 10,
        "data": data,
        "completionTime": "2023-02-12 19:27:47Z",
        "serialNumber": 26
    });
    RandomValue::from_json(&random.to_string(), signature).unwrap()
}

pub fn malformed_api_key() -> ProviderError {
    ProviderError::Api {
        code: 200,
        message: "Parameter 'apiKey' is malformed".to_string(),
        data: vec![serde_json::json!("apiKey")],
    }
}

// --- Gas simulation ---

pub struct FakeSimulator {
    pub gas_used: u64,
    pub calls: AtomicUsize,
}

impl FakeSimulator {
    pub fn new(gas_used: u64) -> Arc<Self> {
        Arc::new(Self {
            gas_used,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GasSimulator for FakeSimulator {
    async fn simulate(&self, _tx_bytes: Vec<u8>) -> Result<u64, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.gas_used)
    }
}

// --- Broadcast endpoints ---

pub enum Behavior {
    Succeed { hash: &'static str, height: u64 },
    TimeOut,
    Refuse,
}

pub struct FakeEndpoint {
    behavior: Behavior,
    pub received: Mutex<Vec<Bytes>>,
}

impl FakeEndpoint {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn received(&self) -> Vec<Bytes> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl TxSubmitter for FakeEndpoint {
    async fn broadcast_tx(&self, tx_bytes: Bytes) -> Result<TxResponse, ChainError> {
        self.received.lock().unwrap().push(tx_bytes);
        match &self.behavior {
            Behavior::Succeed { hash, height } => Ok(TxResponse {
                code: 0,
                log: String::new(),
                transaction_hash: hash.to_string(),
                height: *height,
                gas_used: 151_234,
                gas_wanted: 250_000,
            }),
            Behavior::TimeOut => Err(ChainError::Network(NetworkError::Timeout {
                timeout_ms: 30_000,
                endpoint: "http://primary:26657".to_string(),
            })),
            Behavior::Refuse => Err(ChainError::Network(NetworkError::ConnectionFailed {
                endpoint: "http://down:26657".to_string(),
                reason: "connection refused".to_string(),
            })),
        }
    }
}

// --- Wiring ---

pub struct Harness {
    pub chain: Arc<FakeChain>,
    pub provider: Arc<FakeProvider>,
    pub simulator: Arc<FakeSimulator>,
    pub metrics: Arc<MetricsCollector>,
}

pub fn gas_price() -> GasPrice {
    "0.025uaura".parse().unwrap()
}

pub fn settings() -> OracleSettings {
    OracleSettings {
        poll_interval: Duration::from_millis(1000),
        ..OracleSettings::default()
    }
}

pub async fn oracle(
    harness: &Harness,
    endpoints: Vec<Arc<FakeEndpoint>>,
    static_gas_limit: Option<u64>,
) -> Oracle {
    let mut iter = endpoints.into_iter();
    let primary = iter.next().expect("at least one endpoint");
    let mut broadcaster = Broadcaster::new("http://primary:26657", primary);
    for (i, secondary) in iter.enumerate() {
        broadcaster = broadcaster
            .with_secondary(format!("http://secondary-{}:26657", i + 1), secondary)
            .unwrap();
    }

    let components = OracleComponents {
        chain: harness.chain.clone(),
        provider: harness.provider.clone(),
        simulator: harness.simulator.clone(),
        signer: wallet(),
        broadcaster,
        fee_policy: FeePolicy::new(static_gas_limit, gas_price()),
        contract: contract(),
        metrics: harness.metrics.clone(),
    };

    Oracle::bootstrap(components, settings()).await.unwrap()
}

/// The single `add_randomness` execution carried by a signed transaction.
pub struct DecodedFulfillment {
    pub sender: AccountId,
    pub contract: AccountId,
    pub random_value: String,
    pub signature: String,
    pub memo: String,
    pub sequence: u64,
    pub gas_limit: u64,
    pub fee_amount: u128,
    pub message_count: usize,
}

pub fn decode_fulfillment(tx_bytes: &[u8]) -> DecodedFulfillment {
    let tx = cosmrs::Tx::from_bytes(tx_bytes).unwrap();
    let execute = cosmrs::cosmwasm::MsgExecuteContract::from_any(&tx.body.messages[0]).unwrap();
    let msg: ExecuteMsg = serde_json::from_slice(&execute.msg).unwrap();

    let (random_value, signature) = match msg {
        ExecuteMsg::AddRandomness {
            random_value,
            signature,
        } => (random_value, signature),
        other => panic!("unexpected message: {:?}", other),
    };

    DecodedFulfillment {
        sender: execute.sender,
        contract: execute.contract,
        random_value,
        signature,
        memo: tx.body.memo,
        sequence: tx.auth_info.signer_infos[0].sequence,
        gas_limit: tx.auth_info.fee.gas_limit,
        fee_amount: tx.auth_info.fee.amount[0].amount,
        message_count: tx.body.messages.len(),
    }
}
