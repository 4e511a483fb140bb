//! The trading bot proper: risk tiers, order lifecycle, volatility gate,
//! reconciliation and the loop that ties them together.

pub mod config;
pub mod engine;
pub mod feed;
pub mod lifecycle;
pub mod logging;
pub mod market_data;
pub mod reconcile;
pub mod risk;
pub mod throttle;
pub mod tx_log;

#[cfg(test)]
mod tests;
