//! Randomness Provider - Signed random integers from random.org
//!
//! The contract verifies the provider's signature over the `random` object, so
//! that object is kept byte-for-byte as received ([`RawValue`]) and forwarded
//! verbatim. A typed view ([`RandomData`]) is decoded alongside it for logging
//! and validation only.
//!
//! # Wire format
//!
//! JSON-RPC 2.0 `generateSignedIntegers`:
//!
//! ```text
//! -> {"jsonrpc":"2.0","method":"generateSignedIntegers",
//!     "params":{"apiKey":"..","n":32,"min":0,"max":255,"replacement":true,"base":10},"id":1}
//! <- {"jsonrpc":"2.0","result":{"random":{..,"data":[..],"completionTime":"..","serialNumber":26},
//!     "signature":"..",..},"id":1}
//! <- {"jsonrpc":"2.0","error":{"code":200,"message":"Parameter 'apiKey' is malformed",
//!     "data":["apiKey"]},"id":1}
//! ```

use crate::error::ProviderError;
use async_trait::async_trait;
use core_logic::NetworkError;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

pub const DEFAULT_PROVIDER_URL: &str = "https://api.random.org/json-rpc/4/invoke";

/// What to ask the provider for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomRequest {
    pub min: i64,
    pub max: i64,
    pub amount: u32,
}

impl Default for RandomRequest {
    /// 32 bytes worth of randomness
    fn default() -> Self {
        Self {
            min: 0,
            max: 255,
            amount: 32,
        }
    }
}

/// Typed view of the provider's `random` object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomData {
    pub method: String,
    #[serde(default)]
    pub hashed_api_key: Option<String>,
    pub n: u32,
    pub min: i64,
    pub max: i64,
    pub data: Vec<i64>,
    pub completion_time: String,
    pub serial_number: u64,
}

/// A signed random value, immutable once received.
#[derive(Debug, Clone)]
pub struct RandomValue {
    random: RandomData,
    raw: Box<RawValue>,
    signature: String,
}

impl RandomValue {
    pub fn from_raw(raw: Box<RawValue>, signature: String) -> Result<Self, ProviderError> {
        let random: RandomData =
            serde_json::from_str(raw.get()).map_err(|e| ProviderError::InvalidResponse {
                reason: format!("cannot decode random object: {}", e),
            })?;

        Ok(Self {
            random,
            raw,
            signature,
        })
    }

    /// Builds a value from the provider's `random` JSON text and signature.
    pub fn from_json(random_json: &str, signature: impl Into<String>) -> Result<Self, ProviderError> {
        let raw = RawValue::from_string(random_json.to_string()).map_err(|e| {
            ProviderError::InvalidResponse {
                reason: format!("random object is not valid JSON: {}", e),
            }
        })?;
        Self::from_raw(raw, signature.into())
    }

    pub fn data(&self) -> &[i64] {
        &self.random.data
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn completion_time(&self) -> &str {
        &self.random.completion_time
    }

    pub fn serial_number(&self) -> u64 {
        self.random.serial_number
    }

    /// The `random` object exactly as the provider signed it.
    pub fn serialized(&self) -> &str {
        self.raw.get()
    }

    /// Rejects values that do not answer `request`.
    pub fn validate(&self, request: &RandomRequest) -> Result<(), ProviderError> {
        let data = &self.random.data;
        if data.len() != request.amount as usize || self.random.n != request.amount {
            return Err(ProviderError::InvalidResponse {
                reason: format!(
                    "expected {} values, got {} (n = {})",
                    request.amount,
                    data.len(),
                    self.random.n
                ),
            });
        }

        if let Some(out_of_range) = data
            .iter()
            .find(|v| **v < request.min || **v > request.max)
        {
            return Err(ProviderError::InvalidResponse {
                reason: format!(
                    "value {} outside [{}, {}]",
                    out_of_range, request.min, request.max
                ),
            });
        }

        Ok(())
    }
}

#[async_trait]
pub trait RandomnessProvider: Send + Sync {
    async fn fetch_signed_random(&self, request: RandomRequest)
        -> Result<RandomValue, ProviderError>;
}

// --- random.org client ---

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: SignedIntegersParams<'a>,
    id: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedIntegersParams<'a> {
    api_key: &'a str,
    n: u32,
    min: i64,
    max: i64,
    replacement: bool,
    base: u32,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<SignedResult>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct SignedResult {
    random: Box<RawValue>,
    signature: String,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Vec<serde_json::Value>>,
}

/// Turns a JSON-RPC response body into a value or a provider error.
pub fn decode_response(body: &[u8]) -> Result<RandomValue, ProviderError> {
    let response: RpcResponse =
        serde_json::from_slice(body).map_err(|e| ProviderError::InvalidResponse {
            reason: format!("not a JSON-RPC response: {}", e),
        })?;

    if let Some(error) = response.error {
        return Err(ProviderError::Api {
            code: error.code,
            message: error.message,
            data: error.data.unwrap_or_default(),
        });
    }

    match response.result {
        Some(result) => RandomValue::from_raw(result.random, result.signature),
        None => Err(ProviderError::InvalidResponse {
            reason: "response has neither result nor error".to_string(),
        }),
    }
}

pub struct RandomOrgClient {
    http: reqwest::Client,
    url: String,
    api_key: Zeroizing<String>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl RandomOrgClient {
    pub fn new(
        url: impl Into<String>,
        api_key: Zeroizing<String>,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        let url = url.into();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NetworkError::ConnectionFailed {
                endpoint: url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            url,
            api_key,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> NetworkError {
        if e.is_timeout() {
            NetworkError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
                endpoint: self.url.clone(),
            }
        } else if let Some(status) = e.status() {
            status_error(status, &self.url)
        } else {
            NetworkError::ConnectionFailed {
                endpoint: self.url.clone(),
                reason: e.to_string(),
            }
        }
    }
}

fn status_error(status: reqwest::StatusCode, endpoint: &str) -> NetworkError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        NetworkError::RateLimited {
            endpoint: endpoint.to_string(),
        }
    } else {
        NetworkError::HttpError {
            status_code: status.as_u16(),
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl RandomnessProvider for RandomOrgClient {
    async fn fetch_signed_random(
        &self,
        request: RandomRequest,
    ) -> Result<RandomValue, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest {
            jsonrpc: "2.0",
            method: "generateSignedIntegers",
            params: SignedIntegersParams {
                api_key: self.api_key.as_str(),
                n: request.amount,
                min: request.min,
                max: request.max,
                replacement: true,
                base: 10,
            },
            id,
        };

        debug!(id, n = request.amount, "Requesting signed integers");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, &self.url).into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        decode_response(&bytes)
    }
}
