//! Maker order placement, fill monitoring and take-profit closes.
//!
//! Every order goes out post-only. When the venue cancels it for crossing,
//! the placement re-reads the book and tries again at the fresh touch, up
//! to a fixed attempt budget. Fills are learned from the push feed when it
//! is fast enough and from a status poll when it is not.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::bot::config::{ContractSpec, TradingConfig};
use crate::bot::logging::targets;
use crate::exchange::{CreateOrderRequest, ExchangeApi};
use crate::helpers::{format_price, format_size, round_to_step};
use crate::prelude::*;
use crate::types::{OrderBookDepth, OrderSide, OrderStatus};
use crate::EPSILON;

/// Post-only attempt budget per order.
pub const MAX_PLACE_ATTEMPTS: u32 = 15;

const BOOK_DEPTH_LIMIT: u32 = 15;
const STATUS_CHECK_DELAY: Duration = Duration::from_millis(10);
const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(100);
const FILL_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Order accepted onto the book (or already filled).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order_id: String,
    pub side: OrderSide,
    pub size: f64,
    pub price: f64,
    pub status: OrderStatus,
}

#[derive(Debug, Default)]
struct FillState {
    armed: Option<String>,
    filled: bool,
}

/// One-shot fill notification bridging the WS feed task and the execution
/// loop. Armed with an order id after submission; the feed task fires it
/// when that order reports FILLED.
#[derive(Debug, Default)]
pub struct FillSignal {
    state: Mutex<FillState>,
    notify: Notify,
}

impl FillSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self, order_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.armed = Some(order_id.to_string());
        state.filled = false;
    }

    pub fn disarm(&self) {
        let mut state = self.state.lock().unwrap();
        state.armed = None;
        state.filled = false;
    }

    /// Returns true when the fill matched the armed order id.
    pub fn notify_filled(&self, order_id: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.armed.as_deref() == Some(order_id) && !state.filled {
            state.filled = true;
            self.notify.notify_waiters();
            true
        } else {
            false
        }
    }

    /// Wait up to `timeout` for the armed order to fill.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if self.state.lock().unwrap().filled {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return false;
            }
        }
    }
}

enum Attempt {
    Placed(PlacedOrder),
    Rejected(String),
}

/// Places and resolves individual orders for one contract.
pub struct OrderLifecycle {
    exchange: Arc<dyn ExchangeApi>,
    fill_signal: Arc<FillSignal>,
    contract_id: String,
    quantity: f64,
    take_profit: f64,
    price_step: f64,
    price_delta: f64,
}

impl OrderLifecycle {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        fill_signal: Arc<FillSignal>,
        trading: &TradingConfig,
        contract: &ContractSpec,
    ) -> Self {
        Self {
            exchange,
            fill_signal,
            contract_id: trading.contract_id.clone(),
            quantity: trading.quantity,
            take_profit: trading.take_profit,
            price_step: contract.price_step,
            price_delta: contract.price_delta,
        }
    }

    /// Price one tick's delta inside the touch so the order rests.
    fn open_price(&self, book: &OrderBookDepth, side: OrderSide) -> Result<f64> {
        let raw = match side {
            OrderSide::Buy => book.best_ask()? - self.price_delta,
            OrderSide::Sell => book.best_bid()? + self.price_delta,
        };
        Ok(round_to_step(raw, self.price_step))
    }

    /// Keep the take-profit target unless it would cross the book.
    fn close_price(&self, book: &OrderBookDepth, target: f64, side: OrderSide) -> Result<f64> {
        let raw = match side {
            OrderSide::Sell => {
                let bid = book.best_bid()?;
                if target <= bid {
                    bid + self.price_delta
                } else {
                    target
                }
            }
            OrderSide::Buy => {
                let ask = book.best_ask()?;
                if target >= ask {
                    ask - self.price_delta
                } else {
                    target
                }
            }
        };
        Ok(round_to_step(raw, self.price_step))
    }

    /// Conservative hedges rest one step inside the touch; aggressive
    /// hedges walk up to three levels into the opposing side.
    fn hedge_price(&self, book: &OrderBookDepth, side: OrderSide, aggressive: bool) -> Result<f64> {
        let raw = match (side, aggressive) {
            (OrderSide::Sell, false) => book.best_bid()? + self.price_step,
            (OrderSide::Buy, false) => book.best_ask()? - self.price_step,
            (OrderSide::Sell, true) => book
                .bid_level(2)
                .or_else(|| book.bid_level(1))
                .unwrap_or(book.best_bid()? - self.price_step),
            (OrderSide::Buy, true) => book
                .ask_level(2)
                .or_else(|| book.ask_level(1))
                .unwrap_or(book.best_ask()? + self.price_step),
        };
        Ok(round_to_step(raw, self.price_step))
    }

    async fn try_place<F>(&self, side: OrderSide, size: f64, pricer: &F) -> Result<Attempt>
    where
        F: Fn(&OrderBookDepth) -> Result<f64>,
    {
        let book = self
            .exchange
            .get_order_book_depth(&self.contract_id, BOOK_DEPTH_LIMIT)
            .await?;
        let price = pricer(&book)?;

        let order_id = self
            .exchange
            .create_limit_order(CreateOrderRequest {
                contract_id: self.contract_id.clone(),
                size: format_size(size),
                price: format_price(price, self.price_step),
                side,
                post_only: true,
            })
            .await?;

        tokio::time::sleep(STATUS_CHECK_DELAY).await;

        let detail = match self.exchange.get_order_by_id(&order_id).await {
            Ok(detail) => detail,
            Err(e) => {
                // the order went out; assume it is resting and move on
                warn!(
                    target: targets::LIFECYCLE,
                    order_id = %order_id,
                    error = %e,
                    "status check failed after submit"
                );
                return Ok(Attempt::Placed(PlacedOrder {
                    order_id,
                    side,
                    size,
                    price,
                    status: OrderStatus::Pending,
                }));
            }
        };

        match detail.status {
            OrderStatus::Canceled => Ok(Attempt::Rejected(
                detail.cancel_reason.unwrap_or_else(|| "canceled".to_string()),
            )),
            OrderStatus::Pending
            | OrderStatus::Open
            | OrderStatus::PartiallyFilled
            | OrderStatus::Filled => Ok(Attempt::Placed(PlacedOrder {
                order_id,
                side,
                size,
                price,
                status: detail.status,
            })),
            OrderStatus::Unknown => Err(Error::UnexpectedOrderStatus(format!(
                "order {order_id} in unknown state"
            ))),
        }
    }

    /// Shared maker-retry: re-price from a fresh book each attempt until
    /// the venue keeps the order, the budget runs out, or a fatal error.
    async fn place_maker_order<F>(
        &self,
        label: &'static str,
        side: OrderSide,
        size: f64,
        pricer: F,
    ) -> Result<PlacedOrder>
    where
        F: Fn(&OrderBookDepth) -> Result<f64>,
    {
        for attempt in 1..=MAX_PLACE_ATTEMPTS {
            match self.try_place(side, size, &pricer).await {
                Ok(Attempt::Placed(order)) => {
                    info!(
                        target: targets::LIFECYCLE,
                        kind = label,
                        order_id = %order.order_id,
                        side = %order.side,
                        price = order.price,
                        size = order.size,
                        status = %order.status,
                        attempt = attempt,
                        "order resting"
                    );
                    return Ok(order);
                }
                Ok(Attempt::Rejected(reason)) => {
                    info!(
                        target: targets::LIFECYCLE,
                        kind = label,
                        attempt = attempt,
                        max_attempts = MAX_PLACE_ATTEMPTS,
                        reason = %reason,
                        "post-only rejected, repricing"
                    );
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        target: targets::LIFECYCLE,
                        kind = label,
                        attempt = attempt,
                        error = %e,
                        "transient error during placement"
                    );
                    tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::MakerRejected {
            attempts: MAX_PLACE_ATTEMPTS,
        })
    }

    pub async fn place_open_order(&self, side: OrderSide) -> Result<PlacedOrder> {
        let size = self.quantity;
        self.place_maker_order("open", side, size, |book| self.open_price(book, side))
            .await
    }

    pub async fn place_close_order(
        &self,
        side: OrderSide,
        size: f64,
        target: f64,
    ) -> Result<PlacedOrder> {
        self.place_maker_order("close", side, size, |book| {
            self.close_price(book, target, side)
        })
        .await
    }

    /// Hedge through the same maker machinery; aggressive pricing sits
    /// deeper in the book so it executes sooner without ever taking.
    pub async fn place_hedge_order(
        &self,
        side: OrderSide,
        size: f64,
        aggressive: bool,
    ) -> Result<PlacedOrder> {
        self.place_maker_order("hedge", side, size, |book| {
            self.hedge_price(book, side, aggressive)
        })
        .await
    }

    /// Take-profit target for a fill on `filled_side` at `fill_price`.
    fn take_profit_target(&self, filled_side: OrderSide, fill_price: f64) -> (OrderSide, f64) {
        match filled_side {
            OrderSide::Buy => (OrderSide::Sell, fill_price * (1.0 + self.take_profit)),
            OrderSide::Sell => (OrderSide::Buy, fill_price * (1.0 - self.take_profit)),
        }
    }

    /// Open one maker order, wait for it to fill, and unwind whatever
    /// filled with a take-profit close. Returns true when any size filled.
    pub async fn open_and_monitor(&self, side: OrderSide) -> Result<bool> {
        let placed = self.place_open_order(side).await?;

        if placed.status != OrderStatus::Filled {
            self.fill_signal.arm(&placed.order_id);
            let signaled = self.fill_signal.wait(FILL_WAIT_TIMEOUT).await;
            self.fill_signal.disarm();
            if !signaled {
                info!(
                    target: targets::LIFECYCLE,
                    order_id = %placed.order_id,
                    "no fill signal, polling status"
                );
            }
        }

        let detail = self.exchange.get_order_by_id(&placed.order_id).await?;
        match detail.status {
            OrderStatus::Filled => {
                let fill_price = detail.price_f64()?;
                // close against the side that actually filled, not the one
                // we asked for
                let (close_side, target) = self.take_profit_target(detail.side, fill_price);
                info!(
                    target: targets::LIFECYCLE,
                    order_id = %placed.order_id,
                    fill_price = fill_price,
                    close_side = %close_side,
                    target = target,
                    "order filled, placing close"
                );
                if let Err(e) = self.place_close_order(close_side, self.quantity, target).await {
                    error!(
                        target: targets::LIFECYCLE,
                        order_id = %placed.order_id,
                        error = %e,
                        "close placement failed"
                    );
                }
                Ok(true)
            }
            OrderStatus::Pending | OrderStatus::Open | OrderStatus::PartiallyFilled => {
                if let Err(e) = self.exchange.cancel_order(&placed.order_id).await {
                    warn!(
                        target: targets::LIFECYCLE,
                        order_id = %placed.order_id,
                        error = %e,
                        "cancel of unfilled order failed"
                    );
                }
                let detail = self.exchange.get_order_by_id(&placed.order_id).await?;
                let filled = detail.filled_size()?;
                if filled > EPSILON {
                    let fill_price = detail.price_f64()?;
                    let (close_side, target) = self.take_profit_target(detail.side, fill_price);
                    info!(
                        target: targets::LIFECYCLE,
                        order_id = %placed.order_id,
                        filled = filled,
                        "partial fill, closing the filled remainder"
                    );
                    if let Err(e) = self.place_close_order(close_side, filled, target).await {
                        error!(
                            target: targets::LIFECYCLE,
                            order_id = %placed.order_id,
                            error = %e,
                            "close placement failed"
                        );
                    }
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            OrderStatus::Canceled => Ok(false),
            OrderStatus::Unknown => Err(Error::UnexpectedOrderStatus(format!(
                "order {} in unknown state",
                placed.order_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fill_signal_fires_for_armed_id() {
        let signal = Arc::new(FillSignal::new());
        signal.arm("42");
        let waiter = Arc::clone(&signal);
        let handle = tokio::spawn(async move { waiter.wait(Duration::from_secs(10)).await });
        tokio::task::yield_now().await;
        assert!(signal.notify_filled("42"));
        assert!(handle.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn fill_signal_ignores_other_orders() {
        let signal = FillSignal::new();
        signal.arm("42");
        assert!(!signal.notify_filled("43"));
        assert!(!signal.wait(Duration::from_millis(50)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn fill_signal_before_wait_is_not_lost() {
        let signal = FillSignal::new();
        signal.arm("42");
        assert!(signal.notify_filled("42"));
        assert!(signal.wait(Duration::from_millis(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_signal_ignores_fills() {
        let signal = FillSignal::new();
        signal.arm("42");
        signal.disarm();
        assert!(!signal.notify_filled("42"));
    }
}
