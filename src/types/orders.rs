use std::fmt;

use serde::{Deserialize, Serialize};

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    #[serde(alias = "buy")]
    Buy,
    #[serde(alias = "sell")]
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Canceled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Open => "OPEN",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Full order record as returned by the order-by-id endpoint.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub id: String,
    pub contract_id: String,
    pub side: OrderSide,
    pub size: String,
    pub price: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub cum_fill_size: Option<String>,
    #[serde(default)]
    pub cancel_reason: Option<String>,
}

impl OrderDetail {
    pub fn price_f64(&self) -> Result<f64> {
        self.price.parse().map_err(|_| Error::FloatStringParse)
    }

    pub fn size_f64(&self) -> Result<f64> {
        self.size.parse().map_err(|_| Error::FloatStringParse)
    }

    /// Cumulative filled size; missing field means nothing filled.
    pub fn filled_size(&self) -> Result<f64> {
        match &self.cum_fill_size {
            Some(s) => s.parse().map_err(|_| Error::FloatStringParse),
            None => Ok(0.0),
        }
    }
}

/// Slim record from the active-order listing.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActiveOrder {
    pub id: String,
    pub contract_id: String,
    pub side: OrderSide,
    pub size: String,
    pub price: String,
}

impl ActiveOrder {
    pub fn size_f64(&self) -> Result<f64> {
        self.size.parse().map_err(|_| Error::FloatStringParse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_roundtrip_and_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        let s: OrderSide = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(s, OrderSide::Sell);
        // config files use lowercase
        let s: OrderSide = serde_json::from_str("\"buy\"").unwrap();
        assert_eq!(s, OrderSide::Buy);
        assert_eq!(serde_json::to_string(&OrderSide::Buy).unwrap(), "\"BUY\"");
    }

    #[test]
    fn status_parses_unknown_values() {
        let s: OrderStatus = serde_json::from_str("\"PARTIALLY_FILLED\"").unwrap();
        assert_eq!(s, OrderStatus::PartiallyFilled);
        let s: OrderStatus = serde_json::from_str("\"EXPIRED\"").unwrap();
        assert_eq!(s, OrderStatus::Unknown);
        assert!(OrderStatus::Filled.is_terminal());
        assert!(!OrderStatus::Open.is_terminal());
    }

    #[test]
    fn order_detail_filled_size_defaults_to_zero() {
        let json = r#"{
            "id": "123",
            "contractId": "10000001",
            "side": "BUY",
            "size": "0.01",
            "price": "65000.1",
            "status": "OPEN"
        }"#;
        let detail: OrderDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.filled_size().unwrap(), 0.0);
        assert_eq!(detail.price_f64().unwrap(), 65000.1);
    }
}
