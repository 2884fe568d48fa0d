//! Configuration loader for the aurand bot
//!
//! Settings come from environment variables (a `.env` file is loaded first by
//! the binary) or from a TOML file whose keys are the lower-case variable
//! names. When both are present the file wins and the environment fills the
//! gaps.
//!
//! | Variable | Required | Meaning |
//! |----------|----------|---------|
//! | `MNEMONIC` | yes | BIP-39 phrase of the bot account |
//! | `MONIKER` | yes | Name registered with the contract |
//! | `PREFIX` | yes | Bech32 address prefix |
//! | `DENOM` | yes | Fee denom |
//! | `ENDPOINT` | yes | Primary RPC endpoint |
//! | `AURAND_CONTRACT` | yes | Contract address |
//! | `GAS_PRICE` | yes | e.g. `0.025uaura` |
//! | `API_KEY` | yes | random.org API key |
//! | `GAS_WANTED` | no | Fixed gas limit; unset or 0 means simulate |
//! | `ENDPOINT2`, `ENDPOINT3` | no | Secondary broadcast endpoints |
//!
//! Tunables: `RANDOM_MIN` (0), `RANDOM_MAX` (255), `RANDOM_AMOUNT` (32),
//! `POLL_INTERVAL_MS` (1000), `RPC_TIMEOUT_SECS` (30),
//! `PROVIDER_TIMEOUT_SECS` (30), `PROVIDER_URL`, `MAX_BACKOFF_SECS` (300).

use crate::fee::{FeePolicy, GasPrice};
use crate::oracle::OracleSettings;
use crate::randomness::{RandomRequest, DEFAULT_PROVIDER_URL};
use core_logic::{BackoffConfig, ConfigError};
use cosmrs::AccountId;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;
use zeroize::Zeroizing;

/// random.org accepts between 1 and 10,000 integers per request
const MAX_RANDOM_AMOUNT: u32 = 10_000;
/// ... each within ±1e9
const RANDOM_BOUND: i64 = 1_000_000_000;

/// Unvalidated settings, as read from one source.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub mnemonic: Option<String>,
    pub moniker: Option<String>,
    pub prefix: Option<String>,
    pub denom: Option<String>,
    pub endpoint: Option<String>,
    pub aurand_contract: Option<String>,
    pub gas_price: Option<String>,
    pub gas_wanted: Option<u64>,
    pub api_key: Option<String>,
    pub endpoint2: Option<String>,
    pub endpoint3: Option<String>,
    pub random_min: Option<i64>,
    pub random_max: Option<i64>,
    pub random_amount: Option<u32>,
    pub poll_interval_ms: Option<u64>,
    pub rpc_timeout_secs: Option<u64>,
    pub provider_timeout_secs: Option<u64>,
    pub provider_url: Option<String>,
    pub max_backoff_secs: Option<u64>,
}

fn parse_opt<T>(name: &str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::invalid(name, format!("'{}': {}", v, e)))
        })
        .transpose()
}

impl RawConfig {
    /// Reads the variables through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            mnemonic: get("MNEMONIC"),
            moniker: get("MONIKER"),
            prefix: get("PREFIX"),
            denom: get("DENOM"),
            endpoint: get("ENDPOINT"),
            aurand_contract: get("AURAND_CONTRACT"),
            gas_price: get("GAS_PRICE"),
            gas_wanted: parse_opt("GAS_WANTED", get("GAS_WANTED"))?,
            api_key: get("API_KEY"),
            endpoint2: get("ENDPOINT2"),
            endpoint3: get("ENDPOINT3"),
            random_min: parse_opt("RANDOM_MIN", get("RANDOM_MIN"))?,
            random_max: parse_opt("RANDOM_MAX", get("RANDOM_MAX"))?,
            random_amount: parse_opt("RANDOM_AMOUNT", get("RANDOM_AMOUNT"))?,
            poll_interval_ms: parse_opt("POLL_INTERVAL_MS", get("POLL_INTERVAL_MS"))?,
            rpc_timeout_secs: parse_opt("RPC_TIMEOUT_SECS", get("RPC_TIMEOUT_SECS"))?,
            provider_timeout_secs: parse_opt(
                "PROVIDER_TIMEOUT_SECS",
                get("PROVIDER_TIMEOUT_SECS"),
            )?,
            provider_url: get("PROVIDER_URL"),
            max_backoff_secs: parse_opt("MAX_BACKOFF_SECS", get("MAX_BACKOFF_SECS"))?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings from a TOML file
    ///
    /// # Example
    /// ```ignore
    /// let raw = RawConfig::from_path("config/aurand.toml")?;
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        if !path.exists() {
            return Err(ConfigError::FileNotFound { path: display });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: display.clone(),
            msg: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| {
            ConfigError::invalid(&display, format!("invalid TOML: {}", e.message()))
        })
    }

    /// Fills every unset field of `self` from `fallback`.
    pub fn or(self, fallback: RawConfig) -> RawConfig {
        RawConfig {
            mnemonic: self.mnemonic.or(fallback.mnemonic),
            moniker: self.moniker.or(fallback.moniker),
            prefix: self.prefix.or(fallback.prefix),
            denom: self.denom.or(fallback.denom),
            endpoint: self.endpoint.or(fallback.endpoint),
            aurand_contract: self.aurand_contract.or(fallback.aurand_contract),
            gas_price: self.gas_price.or(fallback.gas_price),
            gas_wanted: self.gas_wanted.or(fallback.gas_wanted),
            api_key: self.api_key.or(fallback.api_key),
            endpoint2: self.endpoint2.or(fallback.endpoint2),
            endpoint3: self.endpoint3.or(fallback.endpoint3),
            random_min: self.random_min.or(fallback.random_min),
            random_max: self.random_max.or(fallback.random_max),
            random_amount: self.random_amount.or(fallback.random_amount),
            poll_interval_ms: self.poll_interval_ms.or(fallback.poll_interval_ms),
            rpc_timeout_secs: self.rpc_timeout_secs.or(fallback.rpc_timeout_secs),
            provider_timeout_secs: self.provider_timeout_secs.or(fallback.provider_timeout_secs),
            provider_url: self.provider_url.or(fallback.provider_url),
            max_backoff_secs: self.max_backoff_secs.or(fallback.max_backoff_secs),
        }
    }

    pub fn validate(self) -> Result<AurandConfig, ConfigError> {
        let mnemonic = Zeroizing::new(require(self.mnemonic, "MNEMONIC")?);
        let api_key = Zeroizing::new(require(self.api_key, "API_KEY")?);
        let moniker = require(self.moniker, "MONIKER")?;
        let prefix = require(self.prefix, "PREFIX")?;
        let denom = require(self.denom, "DENOM")?;

        if !prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ConfigError::invalid(
                "PREFIX",
                format!("'{}' is not a bech32 prefix", prefix),
            ));
        }

        let endpoint = validate_url(require(self.endpoint, "ENDPOINT")?)?;
        let secondary_endpoints = [self.endpoint2, self.endpoint3]
            .into_iter()
            .flatten()
            .map(validate_url)
            .collect::<Result<Vec<_>, _>>()?;

        let contract_str = require(self.aurand_contract, "AURAND_CONTRACT")?;
        let contract = AccountId::from_str(contract_str.trim()).map_err(|e| {
            ConfigError::invalid("AURAND_CONTRACT", format!("'{}': {}", contract_str, e))
        })?;
        if contract.prefix() != prefix {
            return Err(ConfigError::invalid(
                "AURAND_CONTRACT",
                format!(
                    "address prefix '{}' does not match PREFIX '{}'",
                    contract.prefix(),
                    prefix
                ),
            ));
        }

        let gas_price: GasPrice = require(self.gas_price, "GAS_PRICE")?.parse()?;
        if gas_price.denom() != denom {
            return Err(ConfigError::invalid(
                "GAS_PRICE",
                format!(
                    "denom '{}' does not match DENOM '{}'",
                    gas_price.denom(),
                    denom
                ),
            ));
        }

        let request = RandomRequest {
            min: self.random_min.unwrap_or(0),
            max: self.random_max.unwrap_or(255),
            amount: self.random_amount.unwrap_or(32),
        };
        if request.min > request.max {
            return Err(ConfigError::invalid(
                "RANDOM_MIN",
                format!("{} is greater than RANDOM_MAX {}", request.min, request.max),
            ));
        }
        if request.min < -RANDOM_BOUND || request.max > RANDOM_BOUND {
            return Err(ConfigError::invalid(
                "RANDOM_MAX",
                format!("range must lie within ±{}", RANDOM_BOUND),
            ));
        }
        if request.amount == 0 || request.amount > MAX_RANDOM_AMOUNT {
            return Err(ConfigError::invalid(
                "RANDOM_AMOUNT",
                format!("must be between 1 and {}", MAX_RANDOM_AMOUNT),
            ));
        }

        let poll_interval = positive_duration(
            "POLL_INTERVAL_MS",
            self.poll_interval_ms.unwrap_or(1000),
            Duration::from_millis,
        )?;
        let rpc_timeout = positive_duration(
            "RPC_TIMEOUT_SECS",
            self.rpc_timeout_secs.unwrap_or(30),
            Duration::from_secs,
        )?;
        let provider_timeout = positive_duration(
            "PROVIDER_TIMEOUT_SECS",
            self.provider_timeout_secs.unwrap_or(30),
            Duration::from_secs,
        )?;
        let max_backoff = positive_duration(
            "MAX_BACKOFF_SECS",
            self.max_backoff_secs.unwrap_or(300),
            Duration::from_secs,
        )?;

        let provider_url = validate_url(
            self.provider_url
                .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
        )?;

        Ok(AurandConfig {
            mnemonic,
            moniker,
            prefix,
            denom,
            endpoint,
            secondary_endpoints,
            contract,
            gas_price,
            gas_wanted: self.gas_wanted.filter(|g| *g > 0),
            api_key,
            provider_url,
            request,
            poll_interval,
            rpc_timeout,
            provider_timeout,
            max_backoff,
        })
    }
}

fn require(value: Option<String>, field: &str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::missing(field))
}

fn validate_url(url: String) -> Result<String, ConfigError> {
    let url = url.trim().to_string();
    match Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(url),
        _ => Err(ConfigError::InvalidRpcUrl { url }),
    }
}

fn positive_duration(
    field: &str,
    value: u64,
    unit: fn(u64) -> Duration,
) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be greater than 0"));
    }
    Ok(unit(value))
}

/// Validated configuration, built once at startup.
pub struct AurandConfig {
    pub mnemonic: Zeroizing<String>,
    pub moniker: String,
    pub prefix: String,
    pub denom: String,
    pub endpoint: String,
    /// At most two
    pub secondary_endpoints: Vec<String>,
    pub contract: AccountId,
    pub gas_price: GasPrice,
    /// `None` means simulate
    pub gas_wanted: Option<u64>,
    pub api_key: Zeroizing<String>,
    pub provider_url: String,
    pub request: RandomRequest,
    pub poll_interval: Duration,
    pub rpc_timeout: Duration,
    pub provider_timeout: Duration,
    pub max_backoff: Duration,
}

impl AurandConfig {
    /// Environment only, or `path` with the environment as fallback.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env = RawConfig::from_env()?;
        let raw = match path {
            Some(path) => RawConfig::from_path(path)?.or(env),
            None => env,
        };
        raw.validate()
    }

    pub fn fee_policy(&self) -> FeePolicy {
        FeePolicy::new(self.gas_wanted, self.gas_price.clone())
    }

    pub fn oracle_settings(&self) -> OracleSettings {
        OracleSettings {
            request: self.request,
            poll_interval: self.poll_interval,
            permanent_backoff: BackoffConfig::new(self.poll_interval, self.max_backoff),
        }
    }
}

impl fmt::Debug for AurandConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AurandConfig")
            .field("mnemonic", &"<redacted>")
            .field("moniker", &self.moniker)
            .field("prefix", &self.prefix)
            .field("denom", &self.denom)
            .field("endpoint", &self.endpoint)
            .field("secondary_endpoints", &self.secondary_endpoints)
            .field("contract", &self.contract.to_string())
            .field("gas_price", &self.gas_price.to_string())
            .field("gas_wanted", &self.gas_wanted)
            .field("api_key", &"<redacted>")
            .field("provider_url", &self.provider_url)
            .field("request", &self.request)
            .field("poll_interval", &self.poll_interval)
            .field("rpc_timeout", &self.rpc_timeout)
            .field("provider_timeout", &self.provider_timeout)
            .field("max_backoff", &self.max_backoff)
            .finish()
    }
}
