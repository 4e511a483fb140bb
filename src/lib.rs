#![deny(unreachable_pub)]

// Core modules
mod consts;
mod errors;
mod helpers;
mod prelude;
mod req;
mod retry;

// Feature modules
pub mod bot;
pub mod exchange;
pub mod types;
pub mod ws;

// Re-exports
pub use consts::{DEFAULT_REFERENCE_CONTRACT, EPSILON};
pub use errors::Error;
pub use helpers::{
    decimals_for_step, format_price, format_size, round_to_step, unix_now, BaseUrl,
};
pub use req::HttpClient;
pub use retry::{with_retries, RetryPolicy};

pub use bot::config::{AppConfig, ContractSpec, ExchangeConfig, RiskConfig, TradingConfig};
pub use bot::engine::Engine;
pub use bot::feed::{spawn_feed_task, FeedContext};
pub use bot::lifecycle::{FillSignal, OrderLifecycle, PlacedOrder, MAX_PLACE_ATTEMPTS};
pub use bot::logging::{init_logging, LogConfig, LogFormat};
pub use bot::market_data::{PriceWindow, VolatilityGate};
pub use bot::reconcile::{ExposureSnapshot, Reconciler};
pub use bot::risk::{DirectionDecision, InventoryManager, RiskTier};
pub use bot::throttle::OpenThrottle;
pub use bot::tx_log::{DecisionLog, TransactionLog};
pub use exchange::{CreateOrderRequest, ExchangeApi, RestClient};
pub use types::*;
pub use ws::{Message, Subscription, WsManager};
