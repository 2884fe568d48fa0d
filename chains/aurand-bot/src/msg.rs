//! JSON messages understood by the aurand contract.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    GetBotInfo { address: String },
    GetNumberOfCommitment {},
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    RegisterBot {
        hashed_api_key: String,
        moniker: String,
    },
    AddRandomness {
        /// The provider's `random` object, serialized exactly as received
        random_value: String,
        signature: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NumberOfCommitmentResponse {
    pub num: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_shapes() {
        assert_eq!(
            serde_json::to_value(QueryMsg::GetNumberOfCommitment {}).unwrap(),
            json!({ "get_number_of_commitment": {} })
        );
        assert_eq!(
            serde_json::to_value(QueryMsg::GetBotInfo {
                address: "aura1xyz".to_string()
            })
            .unwrap(),
            json!({ "get_bot_info": { "address": "aura1xyz" } })
        );
    }

    #[test]
    fn test_add_randomness_shape() {
        let msg = ExecuteMsg::AddRandomness {
            random_value: r#"{"data":[1,2]}"#.to_string(),
            signature: "c2ln".to_string(),
        };
        assert_eq!(
            serde_json::to_value(msg).unwrap(),
            json!({
                "add_randomness": {
                    "random_value": "{\"data\":[1,2]}",
                    "signature": "c2ln"
                }
            })
        );
    }

    #[test]
    fn test_register_bot_shape() {
        let msg = ExecuteMsg::RegisterBot {
            hashed_api_key: "aGFzaA==".to_string(),
            moniker: "my-bot".to_string(),
        };
        assert_eq!(
            serde_json::to_value(msg).unwrap(),
            json!({ "register_bot": { "hashed_api_key": "aGFzaA==", "moniker": "my-bot" } })
        );
    }
}
