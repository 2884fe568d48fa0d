//! Fee policy: a fixed gas limit, or a simulated estimate with headroom.
//!
//! Amounts are computed in integers. A gas price such as `0.025uaura` is held
//! as `25` atomics with `3` decimals, so `fee = ceil(25 * gas / 10^3)`.

use crate::chain::GasSimulator;
use crate::error::{FeeError, SigningError};
use crate::sequence::SignData;
use crate::tx::PendingTransaction;
use crate::wallet::TxSigner;
use core_logic::ConfigError;
use cosmrs::{tx, Coin};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Simulated gas is scaled by 18/10 before use
const GAS_MULTIPLIER_NUMERATOR: u64 = 18;
const GAS_MULTIPLIER_DENOMINATOR: u64 = 10;

const MAX_GAS_PRICE_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPrice {
    atomics: u128,
    decimals: u32,
    denom: String,
}

impl GasPrice {
    pub fn denom(&self) -> &str {
        &self.denom
    }

    /// `ceil(price * gas)`, `None` on overflow
    pub fn fee_for(&self, gas: u64) -> Option<u128> {
        let scale = 10u128.checked_pow(self.decimals)?;
        let product = self.atomics.checked_mul(gas as u128)?;
        Some(product.div_ceil(scale))
    }
}

impl FromStr for GasPrice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| ConfigError::invalid("GAS_PRICE", format!("'{}' has no denom", s)))?;
        let (amount, denom) = s.split_at(split);

        if amount.is_empty() {
            return Err(ConfigError::invalid(
                "GAS_PRICE",
                format!("'{}' has no amount", s),
            ));
        }
        if !denom
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'))
        {
            return Err(ConfigError::invalid(
                "GAS_PRICE",
                format!("invalid denom '{}'", denom),
            ));
        }

        let (whole, fraction) = match amount.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (amount, ""),
        };
        if fraction.contains('.') {
            return Err(ConfigError::invalid(
                "GAS_PRICE",
                format!("'{}' is not a decimal", amount),
            ));
        }
        if fraction.len() > MAX_GAS_PRICE_DECIMALS as usize {
            return Err(ConfigError::invalid(
                "GAS_PRICE",
                format!("more than {} decimals", MAX_GAS_PRICE_DECIMALS),
            ));
        }

        let digits = format!("{}{}", whole, fraction);
        let atomics = digits.parse::<u128>().map_err(|e| {
            ConfigError::invalid("GAS_PRICE", format!("'{}': {}", amount, e))
        })?;

        Ok(Self {
            atomics,
            decimals: fraction.len() as u32,
            denom: denom.to_string(),
        })
    }
}

impl fmt::Display for GasPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = format!("{:0>width$}", self.atomics, width = self.decimals as usize + 1);
        let (whole, fraction) = digits.split_at(digits.len() - self.decimals as usize);
        if fraction.is_empty() {
            write!(f, "{}{}", whole, self.denom)
        } else {
            write!(f, "{}.{}{}", whole, fraction, self.denom)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fee {
    pub amount: u128,
    pub denom: String,
    pub gas_limit: u64,
}

impl Fee {
    pub fn to_cosmos(&self) -> Result<tx::Fee, SigningError> {
        let coin =
            Coin::new(self.amount, &self.denom).map_err(|e| SigningError::Encode(e.to_string()))?;
        Ok(tx::Fee::from_amount_and_gas(coin, self.gas_limit))
    }
}

impl fmt::Display for Fee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} (gas {})", self.amount, self.denom, self.gas_limit)
    }
}

pub fn calculate_fee(gas_limit: u64, gas_price: &GasPrice) -> Result<Fee, FeeError> {
    let amount = gas_price
        .fee_for(gas_limit)
        .ok_or(FeeError::Overflow { gas_limit })?;

    Ok(Fee {
        amount,
        denom: gas_price.denom.clone(),
        gas_limit,
    })
}

/// `ceil(estimate * 1.8)`
pub fn scale_simulated_gas(estimate: u64) -> Result<u64, FeeError> {
    estimate
        .checked_mul(GAS_MULTIPLIER_NUMERATOR)
        .map(|scaled| scaled.div_ceil(GAS_MULTIPLIER_DENOMINATOR))
        .ok_or(FeeError::Overflow {
            gas_limit: estimate,
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeePolicy {
    /// `None` means simulate every transaction
    pub static_gas_limit: Option<u64>,
    pub gas_price: GasPrice,
}

impl FeePolicy {
    pub fn new(static_gas_limit: Option<u64>, gas_price: GasPrice) -> Self {
        Self {
            static_gas_limit,
            gas_price,
        }
    }

    /// Fee for `pending`. With a static gas limit this never touches the
    /// network; otherwise the transaction is simulated with `sign_data`
    /// (which is not consumed).
    pub async fn estimate_fee(
        &self,
        pending: &PendingTransaction,
        signer: &dyn TxSigner,
        sign_data: &SignData,
        simulator: &dyn GasSimulator,
    ) -> Result<Fee, FeeError> {
        let gas_limit = match self.static_gas_limit {
            Some(gas_limit) => gas_limit,
            None => {
                let tx_bytes = signer.simulation_bytes(pending, sign_data)?;
                let estimate = simulator.simulate(tx_bytes).await?;
                let gas_limit = scale_simulated_gas(estimate)?;
                debug!(estimate, gas_limit, "Simulated gas");
                gas_limit
            }
        };

        calculate_fee(gas_limit, &self.gas_price)
    }
}
