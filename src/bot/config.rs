//! TOML application config plus validated runtime settings.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bot::logging::LogConfig;
use crate::consts::DEFAULT_REFERENCE_CONTRACT;
use crate::prelude::*;
use crate::types::OrderSide;
use crate::EPSILON;

fn default_base_url() -> String {
    crate::BaseUrl::Mainnet.get_url()
}

fn default_ws_url() -> String {
    crate::BaseUrl::Mainnet.get_ws_url()
}

fn default_quantity() -> f64 {
    0.01
}

fn default_take_profit() -> f64 {
    0.003
}

fn default_direction() -> OrderSide {
    OrderSide::Buy
}

fn default_max_orders() -> usize {
    40
}

fn default_wait_time_secs() -> u64 {
    450
}

fn default_price_step() -> f64 {
    0.1
}

fn default_price_delta() -> f64 {
    0.1
}

fn default_tolerance_mult() -> f64 {
    2.0
}

fn default_flip_probability() -> f64 {
    0.5
}

fn default_max_amplitude() -> f64 {
    105.0
}

fn default_reference_contract() -> String {
    DEFAULT_REFERENCE_CONTRACT.to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ExchangeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    pub account_id: String,
    /// Opaque API credential; MAKER_BOT_API_KEY overrides.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct TradingConfig {
    pub contract_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    /// Take-profit distance as a fraction of the fill price.
    #[serde(default = "default_take_profit")]
    pub take_profit: f64,
    /// Default open direction; risk tiers may override per cycle.
    #[serde(default = "default_direction")]
    pub direction: OrderSide,
    #[serde(default = "default_max_orders")]
    pub max_orders: usize,
    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: u64,
}

impl TradingConfig {
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs)
    }
}

/// Per-contract tick data the venue's contract metadata would provide.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ContractSpec {
    #[serde(default = "default_price_step")]
    pub price_step: f64,
    /// Offset from the touch when pricing maker orders.
    #[serde(default = "default_price_delta")]
    pub price_delta: f64,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RiskConfig {
    /// Reconciliation mismatch tolerance as a multiple of base quantity.
    #[serde(default = "default_tolerance_mult")]
    pub reconcile_tolerance_mult: f64,
    /// Probability of trading the bias direction in the reduce tier.
    #[serde(default = "default_flip_probability")]
    pub flip_probability: f64,
    /// Absolute 60s price amplitude above which trading pauses.
    #[serde(default = "default_max_amplitude")]
    pub max_amplitude: f64,
    /// Contract whose ticker feeds the volatility window.
    #[serde(default = "default_reference_contract")]
    pub reference_contract_id: String,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            reconcile_tolerance_mult: default_tolerance_mult(),
            flip_probability: default_flip_probability(),
            max_amplitude: default_max_amplitude(),
            reference_contract_id: default_reference_contract(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub trading: TradingConfig,
    #[serde(default)]
    pub contract: Option<ContractSpec>,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: AppConfig =
            toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn contract_spec(&self) -> ContractSpec {
        self.contract.clone().unwrap_or(ContractSpec {
            price_step: default_price_step(),
            price_delta: default_price_delta(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.exchange.account_id.is_empty() {
            return Err(Error::Config("exchange.account_id is required".into()));
        }
        if self.trading.contract_id.is_empty() {
            return Err(Error::Config("trading.contract_id is required".into()));
        }
        if self.trading.quantity <= EPSILON {
            return Err(Error::Config("trading.quantity must be positive".into()));
        }
        if self.trading.take_profit <= 0.0 || self.trading.take_profit >= 1.0 {
            return Err(Error::Config(
                "trading.take_profit must be in (0, 1)".into(),
            ));
        }
        if self.trading.max_orders == 0 {
            return Err(Error::Config("trading.max_orders must be positive".into()));
        }
        let spec = self.contract_spec();
        if spec.price_step <= 0.0 || spec.price_delta <= 0.0 {
            return Err(Error::Config(
                "contract.price_step and price_delta must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.risk.flip_probability) {
            return Err(Error::Config(
                "risk.flip_probability must be in [0, 1]".into(),
            ));
        }
        if self.risk.reconcile_tolerance_mult <= 0.0 {
            return Err(Error::Config(
                "risk.reconcile_tolerance_mult must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn sample_toml() -> String {
        let sample = AppConfig {
            exchange: ExchangeConfig {
                base_url: default_base_url(),
                ws_url: default_ws_url(),
                account_id: "your-account-id".to_string(),
                api_key: None,
            },
            trading: TradingConfig {
                contract_id: "10000002".to_string(),
                quantity: default_quantity(),
                take_profit: default_take_profit(),
                direction: default_direction(),
                max_orders: default_max_orders(),
                wait_time_secs: default_wait_time_secs(),
            },
            contract: Some(ContractSpec {
                price_step: default_price_step(),
                price_delta: default_price_delta(),
            }),
            risk: RiskConfig::default(),
            logging: LogConfig::default(),
        };
        // serialization of a fully-populated config cannot fail
        toml::to_string_pretty(&sample).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
            [exchange]
            account_id = "acct-1"

            [trading]
            contract_id = "10000002"
        "#
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config: AppConfig = toml::from_str(minimal_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.trading.quantity, 0.01);
        assert_eq!(config.trading.direction, OrderSide::Buy);
        assert_eq!(config.risk.flip_probability, 0.5);
        assert_eq!(config.risk.reconcile_tolerance_mult, 2.0);
        assert_eq!(config.contract_spec().price_step, 0.1);
        assert_eq!(config.trading.wait_time(), Duration::from_secs(450));
    }

    #[test]
    fn lowercase_direction_accepted() {
        let text = r#"
            [exchange]
            account_id = "acct-1"

            [trading]
            contract_id = "10000002"
            direction = "sell"
        "#;
        let config: AppConfig = toml::from_str(text).unwrap();
        assert_eq!(config.trading.direction, OrderSide::Sell);
    }

    #[test]
    fn bad_take_profit_rejected() {
        let text = r#"
            [exchange]
            account_id = "acct-1"

            [trading]
            contract_id = "10000002"
            take_profit = 1.5
        "#;
        let config: AppConfig = toml::from_str(text).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn sample_round_trips() {
        let sample = AppConfig::sample_toml();
        let config: AppConfig = toml::from_str(&sample).unwrap();
        config.validate().unwrap();
    }
}
