use serde::{Deserialize, Serialize};

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Long,
    Short,
}

/// Open position on one contract.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub contract_id: String,
    pub open_size: String,
    pub side: PositionSide,
}

impl Position {
    /// Signed position size: positive long, negative short.
    pub fn signed_size(&self) -> Result<f64> {
        let size: f64 = self
            .open_size
            .parse()
            .map_err(|_| Error::FloatStringParse)?;
        Ok(match self.side {
            PositionSide::Long => size,
            PositionSide::Short => -size,
        })
    }
}

/// 24h ticker statistics; only the change fraction matters here.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DayQuote {
    pub contract_id: String,
    pub price_change_percent: String,
    #[serde(default)]
    pub last_price: Option<String>,
}

impl DayQuote {
    /// Change over 24h as a signed fraction (0.0123 = +1.23%).
    pub fn change_fraction(&self) -> Result<f64> {
        self.price_change_percent
            .parse()
            .map_err(|_| Error::FloatStringParse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_size_negates_shorts() {
        let p = Position {
            contract_id: "10000001".to_string(),
            open_size: "0.05".to_string(),
            side: PositionSide::Short,
        };
        assert_eq!(p.signed_size().unwrap(), -0.05);
        let p = Position {
            side: PositionSide::Long,
            ..p
        };
        assert_eq!(p.signed_size().unwrap(), 0.05);
    }

    #[test]
    fn day_quote_change_parses() {
        let q: DayQuote = serde_json::from_str(
            r#"{"contractId":"10000001","priceChangePercent":"-0.0315"}"#,
        )
        .unwrap();
        assert_eq!(q.change_fraction().unwrap(), -0.0315);
    }
}
