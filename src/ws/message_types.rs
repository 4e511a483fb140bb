use serde::{Deserialize, Serialize};

use crate::prelude::*;
use crate::types::{OrderSide, OrderStatus};

/// Last-trade tick for one contract.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TickerEvent {
    pub contract_id: String,
    pub last_price: String,
}

impl TickerEvent {
    pub fn last_price_f64(&self) -> Result<f64> {
        self.last_price.parse().map_err(|_| Error::FloatStringParse)
    }
}

/// Order state transition pushed on the private stream.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdateEvent {
    pub id: String,
    pub contract_id: String,
    pub side: OrderSide,
    pub size: String,
    pub price: String,
    pub status: OrderStatus,
}

/// Decoded push message delivered to the feed channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Ticker(TickerEvent),
    OrderUpdate(OrderUpdateEvent),
    Pong,
    NoData,
}

#[derive(Deserialize, Debug)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct TickerContent {
    #[serde(default)]
    data: Vec<TickerEvent>,
}

#[derive(Deserialize, Debug)]
struct TradeContent {
    #[serde(default)]
    data: TradeData,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct TradeData {
    #[serde(default)]
    order: Vec<OrderUpdateEvent>,
}

/// Decode one text frame into zero or more messages. Unknown frame types
/// decode to nothing rather than erroring so new server events never break
/// the reader.
pub(crate) fn parse_frame(text: &str) -> Result<Vec<Message>> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| Error::JsonParse(e.to_string()))?;

    match envelope.kind.as_str() {
        "quote-event" => {
            let content: TickerContent = serde_json::from_value(envelope.content)
                .map_err(|e| Error::JsonParse(e.to_string()))?;
            Ok(content.data.into_iter().map(Message::Ticker).collect())
        }
        "trade-event" => {
            let content: TradeContent = serde_json::from_value(envelope.content)
                .map_err(|e| Error::JsonParse(e.to_string()))?;
            Ok(content
                .data
                .order
                .into_iter()
                .map(Message::OrderUpdate)
                .collect())
        }
        "pong" => Ok(vec![Message::Pong]),
        _ => Ok(vec![]),
    }
}
