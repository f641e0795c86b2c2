/*
[INPUT]:  PumpPortal WebSocket JSON
[OUTPUT]: PumpRequest frames, PumpMessage values (create / buy / sell events)
[POS]:    Data layer - token launch feed schema
[UPDATE]: When PumpPortal changes its subscription methods or event fields
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client frames understood by PumpPortal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum PumpRequest {
    #[serde(rename = "subscribeNewToken")]
    SubscribeNewToken,
    #[serde(rename = "subscribeTokenTrade")]
    SubscribeTokenTrade { keys: Vec<String> },
    #[serde(rename = "unsubscribeTokenTrade")]
    UnsubscribeTokenTrade { keys: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Create,
    Buy,
    Sell,
}

/// Token creation or trade on the bonding curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpTradeEvent {
    pub signature: String,
    pub mint: String,
    pub trader_public_key: String,
    pub tx_type: TxType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub initial_buy: Option<Decimal>,
    #[serde(default)]
    pub sol_amount: Option<Decimal>,
    #[serde(default)]
    pub token_amount: Option<Decimal>,
    #[serde(default)]
    pub new_token_balance: Option<Decimal>,
    #[serde(default)]
    pub market_cap_sol: Option<Decimal>,
    #[serde(default)]
    pub v_tokens_in_bonding_curve: Option<Decimal>,
    #[serde(default)]
    pub v_sol_in_bonding_curve: Option<Decimal>,
}

/// Everything PumpPortal sends on the data socket.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpMessage {
    Trade(PumpTradeEvent),
    /// Acknowledgements such as "Successfully subscribed to ...".
    Notice(String),
    Other(Value),
}

impl PumpMessage {
    pub fn from_value(value: Value) -> Self {
        if value.get("txType").is_some() {
            return match serde_json::from_value::<PumpTradeEvent>(value.clone()) {
                Ok(event) => PumpMessage::Trade(event),
                Err(_) => PumpMessage::Other(value),
            };
        }

        let notice = value
            .get("message")
            .or_else(|| value.get("errors"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        match (notice, &value) {
            (Some(text), _) => PumpMessage::Notice(text),
            (None, Value::String(text)) => PumpMessage::Notice(text.clone()),
            (None, _) => PumpMessage::Other(value),
        }
    }
}
