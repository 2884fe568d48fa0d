//! Wallet - HD key derivation and transaction signing
//!
//! The bot signs with a single secp256k1 key derived from a BIP-39 mnemonic on
//! the Cosmos HD path. Signing is synchronous and purely local; the only
//! network-facing piece is what callers do with the returned bytes.

use crate::error::SigningError;
use crate::fee::Fee;
use crate::sequence::SignData;
use crate::tx::PendingTransaction;
use bytes::Bytes;
use core_logic::WalletError;
use bip39::{Language, Mnemonic};
use cosmrs::bip32::DerivationPath;
use cosmrs::crypto::secp256k1::SigningKey;
use cosmrs::proto::cosmos::tx::v1beta1::TxRaw;
use cosmrs::tendermint::chain;
use cosmrs::tx::{self, SignDoc, SignerInfo};
use cosmrs::AccountId;
use prost::Message;
use std::fmt;

/// Cosmos coin type 118, first account
pub const HD_PATH: &str = "m/44'/118'/0'/0/0";

/// Signs transactions for one account.
pub trait TxSigner: Send + Sync {
    fn address(&self) -> &AccountId;

    /// Signs once and returns the encoded `TxRaw`, ready for broadcast.
    fn sign(
        &self,
        pending: &PendingTransaction,
        fee: &Fee,
        sign_data: &SignData,
    ) -> Result<Bytes, SigningError>;

    /// Encoded `TxRaw` for gas simulation: real signer info, empty fee and an
    /// empty signature.
    fn simulation_bytes(
        &self,
        pending: &PendingTransaction,
        sign_data: &SignData,
    ) -> Result<Vec<u8>, SigningError>;
}

pub struct Wallet {
    signing_key: SigningKey,
    address: AccountId,
}

impl Wallet {
    pub fn from_mnemonic(phrase: &str, prefix: &str) -> Result<Self, WalletError> {
        // Any standard length (12-24 words); whitespace runs collapse to one space
        let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &phrase).map_err(|e| {
            WalletError::InvalidMnemonic {
                reason: e.to_string(),
            }
        })?;
        let seed = mnemonic.to_seed("");

        let path = HD_PATH
            .parse::<DerivationPath>()
            .map_err(|e| WalletError::DerivationFailed {
                path: HD_PATH.to_string(),
                reason: e.to_string(),
            })?;

        let signing_key = SigningKey::derive_from_path(seed, &path).map_err(|e| {
            WalletError::DerivationFailed {
                path: HD_PATH.to_string(),
                reason: e.to_string(),
            }
        })?;

        Self::from_signing_key(signing_key, prefix)
    }

    /// Raw 32-byte secp256k1 secret
    pub fn from_private_key(secret: &[u8], prefix: &str) -> Result<Self, WalletError> {
        let signing_key =
            SigningKey::from_slice(secret).map_err(|e| WalletError::DerivationFailed {
                path: "raw key".to_string(),
                reason: e.to_string(),
            })?;
        Self::from_signing_key(signing_key, prefix)
    }

    fn from_signing_key(signing_key: SigningKey, prefix: &str) -> Result<Self, WalletError> {
        let address = signing_key.public_key().account_id(prefix).map_err(|e| {
            WalletError::InvalidPrefix {
                prefix: prefix.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            signing_key,
            address,
        })
    }

    fn auth_info(&self, fee: tx::Fee, sequence: u64) -> tx::AuthInfo {
        SignerInfo::single_direct(Some(self.signing_key.public_key()), sequence).auth_info(fee)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address.to_string())
            .finish_non_exhaustive()
    }
}

impl TxSigner for Wallet {
    fn address(&self) -> &AccountId {
        &self.address
    }

    fn sign(
        &self,
        pending: &PendingTransaction,
        fee: &Fee,
        sign_data: &SignData,
    ) -> Result<Bytes, SigningError> {
        let body = pending.to_body()?;
        let auth_info = self.auth_info(fee.to_cosmos()?, sign_data.sequence);

        let chain_id = sign_data
            .chain_id
            .parse::<chain::Id>()
            .map_err(|e| SigningError::InvalidChainId {
                chain_id: sign_data.chain_id.clone(),
                reason: e.to_string(),
            })?;

        let sign_doc = SignDoc::new(&body, &auth_info, &chain_id, sign_data.account_number)
            .map_err(|e| SigningError::Encode(e.to_string()))?;
        let raw = sign_doc
            .sign(&self.signing_key)
            .map_err(|e| SigningError::Sign(e.to_string()))?;

        raw.to_bytes()
            .map(Bytes::from)
            .map_err(|e| SigningError::Encode(e.to_string()))
    }

    fn simulation_bytes(
        &self,
        pending: &PendingTransaction,
        sign_data: &SignData,
    ) -> Result<Vec<u8>, SigningError> {
        let empty_fee = tx::Fee {
            amount: vec![],
            gas_limit: 0,
            payer: None,
            granter: None,
        };
        let auth_info_bytes = self
            .auth_info(empty_fee, sign_data.sequence)
            .into_bytes()
            .map_err(|e| SigningError::Encode(e.to_string()))?;

        let raw = TxRaw {
            body_bytes: pending.body_bytes()?,
            auth_info_bytes,
            signatures: vec![vec![]],
        };
        Ok(raw.encode_to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::randomness::RandomValue;
    use crate::tx::TransactionBuilder;
    use cosmrs::Tx;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn pending(wallet: &Wallet) -> PendingTransaction {
        let value = RandomValue::from_json(
            r#"{"method":"generateSignedIntegers","n":1,"min":0,"max":255,"data":[42],"completionTime":"2023-02-12 19:27:47Z","serialNumber":1}"#,
            "sig",
        )
        .unwrap();
        let contract = AccountId::new("cosmos", &[9u8; 32]).unwrap();
        TransactionBuilder::new(wallet.address().clone(), contract).build(&value)
    }

    fn fee() -> Fee {
        Fee {
            amount: 5000,
            denom: "uaura".to_string(),
            gas_limit: 200_000,
        }
    }

    #[test]
    fn test_mnemonic_derivation() {
        let wallet = Wallet::from_mnemonic(MNEMONIC, "cosmos").unwrap();
        assert_eq!(
            wallet.address().to_string(),
            "cosmos19rl4cm2hmr8afy4kldpxz3fka4jguq0auqdal4"
        );
    }

    #[test]
    fn test_24_word_mnemonic_derivation() {
        let phrase = format!("{} art", ["abandon"; 23].join(" "));
        let wallet = Wallet::from_mnemonic(&phrase, "cosmos").unwrap();
        assert_eq!(
            wallet.address().to_string(),
            "cosmos1r5v5srda7xfth3hn2s26txvrcrntldjumt8mhl"
        );
    }

    #[test]
    fn test_mnemonic_whitespace_is_normalized() {
        let messy = format!("  {}\n", MNEMONIC.replace(' ', "   "));
        let wallet = Wallet::from_mnemonic(&messy, "cosmos").unwrap();
        assert_eq!(
            wallet.address().to_string(),
            "cosmos19rl4cm2hmr8afy4kldpxz3fka4jguq0auqdal4"
        );
    }

    #[test]
    fn test_invalid_mnemonic() {
        let err = Wallet::from_mnemonic("not a real phrase", "cosmos").unwrap_err();
        assert!(matches!(err, WalletError::InvalidMnemonic { .. }));
    }

    #[test]
    fn test_sign_uses_sign_data() {
        let wallet = Wallet::from_private_key(&[7u8; 32], "aura").unwrap();
        let pending = pending(&wallet);

        let first = wallet
            .sign(&pending, &fee(), &SignData::new("aura-testnet-2", 5, 10))
            .unwrap();
        let again = wallet
            .sign(&pending, &fee(), &SignData::new("aura-testnet-2", 5, 10))
            .unwrap();
        let next = wallet
            .sign(&pending, &fee(), &SignData::new("aura-testnet-2", 5, 11))
            .unwrap();

        // RFC 6979 signatures are deterministic
        assert_eq!(first, again);
        assert_ne!(first, next);

        let tx = Tx::from_bytes(&first).unwrap();
        assert_eq!(tx.auth_info.signer_infos[0].sequence, 10);
        assert_eq!(tx.auth_info.fee.gas_limit, 200_000);
        assert_eq!(tx.body.memo, "Bot add randomness");
        assert_eq!(tx.signatures.len(), 1);
    }

    #[test]
    fn test_sign_rejects_bad_chain_id() {
        let wallet = Wallet::from_private_key(&[7u8; 32], "aura").unwrap();
        let err = wallet
            .sign(&pending(&wallet), &fee(), &SignData::new("", 5, 10))
            .unwrap_err();
        assert!(matches!(err, SigningError::InvalidChainId { .. }));
    }

    #[test]
    fn test_simulation_bytes_have_empty_fee_and_signature() {
        let wallet = Wallet::from_private_key(&[7u8; 32], "aura").unwrap();
        let bytes = wallet
            .simulation_bytes(&pending(&wallet), &SignData::new("aura-testnet-2", 5, 10))
            .unwrap();

        let raw = TxRaw::decode(bytes.as_slice()).unwrap();
        assert_eq!(raw.signatures, vec![Vec::<u8>::new()]);

        let tx = Tx::from_bytes(&bytes).unwrap();
        assert_eq!(tx.auth_info.fee.gas_limit, 0);
        assert!(tx.auth_info.fee.amount.is_empty());
        assert_eq!(tx.auth_info.signer_infos[0].sequence, 10);
    }

    #[test]
    fn test_debug_hides_key() {
        let wallet = Wallet::from_private_key(&[7u8; 32], "aura").unwrap();
        let debug = format!("{:?}", wallet);
        assert!(debug.contains("address"));
        assert!(!debug.contains("signing_key"));
    }
}
