use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// One side level of the order book. Prices and sizes arrive as strings.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BookLevel {
    pub price: String,
    pub size: String,
}

impl BookLevel {
    pub fn price_f64(&self) -> Result<f64> {
        self.price.parse().map_err(|_| Error::FloatStringParse)
    }

    pub fn size_f64(&self) -> Result<f64> {
        self.size.parse().map_err(|_| Error::FloatStringParse)
    }
}

/// Depth snapshot, best level first on both sides.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookDepth {
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
}

impl OrderBookDepth {
    pub fn best_bid(&self) -> Result<f64> {
        let price = self
            .bids
            .first()
            .ok_or_else(|| Error::MalformedResponse("empty bid side".to_string()))?
            .price_f64()?;
        if price <= 0.0 {
            return Err(Error::MalformedResponse(format!(
                "non-positive best bid: {price}"
            )));
        }
        Ok(price)
    }

    pub fn best_ask(&self) -> Result<f64> {
        let price = self
            .asks
            .first()
            .ok_or_else(|| Error::MalformedResponse("empty ask side".to_string()))?
            .price_f64()?;
        if price <= 0.0 {
            return Err(Error::MalformedResponse(format!(
                "non-positive best ask: {price}"
            )));
        }
        Ok(price)
    }

    /// Price at bid level `idx` (0 = best), if present.
    pub fn bid_level(&self, idx: usize) -> Option<f64> {
        self.bids.get(idx).and_then(|l| l.price_f64().ok())
    }

    /// Price at ask level `idx` (0 = best), if present.
    pub fn ask_level(&self, idx: usize) -> Option<f64> {
        self.asks.get(idx).and_then(|l| l.price_f64().ok())
    }
}
