//! Transaction building for contract executions.

use crate::error::SigningError;
use crate::msg::ExecuteMsg;
use crate::randomness::RandomValue;
use cosmrs::cosmwasm::MsgExecuteContract;
use cosmrs::tx::{self, Msg};
use cosmrs::AccountId;

pub const ADD_RANDOMNESS_MEMO: &str = "Bot add randomness";

/// A single contract execution waiting for a fee and a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub sender: AccountId,
    pub contract: AccountId,
    pub msg: ExecuteMsg,
    pub memo: String,
}

impl PendingTransaction {
    pub fn add_randomness(sender: AccountId, contract: AccountId, value: &RandomValue) -> Self {
        Self {
            sender,
            contract,
            msg: ExecuteMsg::AddRandomness {
                random_value: value.serialized().to_string(),
                signature: value.signature().to_string(),
            },
            memo: ADD_RANDOMNESS_MEMO.to_string(),
        }
    }

    pub fn register_bot(
        sender: AccountId,
        contract: AccountId,
        hashed_api_key: String,
        moniker: String,
    ) -> Self {
        Self {
            sender,
            contract,
            msg: ExecuteMsg::RegisterBot {
                hashed_api_key,
                moniker,
            },
            memo: String::new(),
        }
    }

    /// JSON body of the execute message
    pub fn msg_bytes(&self) -> Result<Vec<u8>, SigningError> {
        serde_json::to_vec(&self.msg).map_err(|e| SigningError::Encode(e.to_string()))
    }

    pub fn to_body(&self) -> Result<tx::Body, SigningError> {
        let execute = MsgExecuteContract {
            sender: self.sender.clone(),
            contract: self.contract.clone(),
            msg: self.msg_bytes()?,
            funds: vec![],
        };
        let any = execute
            .to_any()
            .map_err(|e| SigningError::Encode(e.to_string()))?;

        Ok(tx::Body::new(vec![any], self.memo.clone(), 0u32))
    }

    /// Protobuf `TxBody` bytes: everything that is signed except the auth info
    pub fn body_bytes(&self) -> Result<Vec<u8>, SigningError> {
        self.to_body()?
            .into_bytes()
            .map_err(|e| SigningError::Encode(e.to_string()))
    }
}

/// Builds the per-cycle fulfillment transaction for one bot and contract.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    sender: AccountId,
    contract: AccountId,
}

impl TransactionBuilder {
    pub fn new(sender: AccountId, contract: AccountId) -> Self {
        Self { sender, contract }
    }

    pub fn sender(&self) -> &AccountId {
        &self.sender
    }

    pub fn contract(&self) -> &AccountId {
        &self.contract
    }

    pub fn build(&self, value: &RandomValue) -> PendingTransaction {
        PendingTransaction::add_randomness(self.sender.clone(), self.contract.clone(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    fn sender() -> AccountId {
        AccountId::new("aura", &[1u8; 20]).unwrap()
    }

    fn contract() -> AccountId {
        AccountId::new("aura", &[2u8; 32]).unwrap()
    }

    fn builder() -> TransactionBuilder {
        TransactionBuilder::new(sender(), contract())
    }

    fn value() -> RandomValue {
        RandomValue::from_json(
            r#"{"method":"generateSignedIntegers","n":2,"min":0,"max":255,"data":[7,9],"completionTime":"2023-02-12 19:27:47Z","serialNumber":3}"#,
            "c2lnbmF0dXJl",
        )
        .unwrap()
    }

    #[test]
    fn test_build_embeds_value_verbatim() {
        let pending = builder().build(&value());

        assert_eq!(pending.memo, ADD_RANDOMNESS_MEMO);
        match &pending.msg {
            ExecuteMsg::AddRandomness {
                random_value,
                signature,
            } => {
                assert_eq!(random_value, value().serialized());
                assert_eq!(signature, "c2lnbmF0dXJl");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_body_is_a_single_execute_message() {
        let body_bytes = builder().build(&value()).body_bytes().unwrap();
        let body = cosmrs::proto::cosmos::tx::v1beta1::TxBody::decode(body_bytes.as_slice())
            .unwrap();

        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].type_url, "/cosmwasm.wasm.v1.MsgExecuteContract");
        assert_eq!(body.memo, ADD_RANDOMNESS_MEMO);

        let execute = MsgExecuteContract::from_any(&body.messages[0]).unwrap();
        assert_eq!(execute.sender, sender());
        assert_eq!(execute.contract, contract());
        assert!(execute.funds.is_empty());
    }

    #[test]
    fn test_build_is_deterministic() {
        let first = builder().build(&value()).body_bytes().unwrap();
        let second = builder().build(&value()).body_bytes().unwrap();
        assert_eq!(first, second);
    }
}
