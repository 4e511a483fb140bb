use async_trait::async_trait;

use crate::prelude::*;
use crate::types::{ActiveOrder, DayQuote, OrderBookDepth, OrderDetail, OrderSide, Position};

/// Limit order submission parameters. Size and price are pre-formatted wire
/// strings so the caller controls rounding.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOrderRequest {
    pub contract_id: String,
    pub size: String,
    pub price: String,
    pub side: OrderSide,
    pub post_only: bool,
}

/// Everything the bot needs from the venue. The REST client implements this
/// against the real exchange; tests script it.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Depth snapshot for one contract, up to `limit` levels per side.
    async fn get_order_book_depth(&self, contract_id: &str, limit: u32) -> Result<OrderBookDepth>;

    /// Submit a limit order; returns the exchange-assigned order id.
    async fn create_limit_order(&self, req: CreateOrderRequest) -> Result<String>;

    async fn cancel_order(&self, order_id: &str) -> Result<()>;

    async fn get_order_by_id(&self, order_id: &str) -> Result<OrderDetail>;

    /// Open orders on one contract.
    async fn get_active_orders(&self, contract_id: &str) -> Result<Vec<ActiveOrder>>;

    /// All open positions for the account.
    async fn get_account_positions(&self) -> Result<Vec<Position>>;

    /// 24h rolling statistics for one contract.
    async fn get_24h_quote(&self, contract_id: &str) -> Result<DayQuote>;
}
