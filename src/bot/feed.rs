//! Bridges decoded WS messages into bot state: the price window, the fill
//! signal, and the transaction CSV.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bot::lifecycle::FillSignal;
use crate::bot::logging::targets;
use crate::bot::market_data::PriceWindow;
use crate::bot::tx_log::TransactionLog;
use crate::helpers::unix_now;
use crate::types::OrderStatus;
use crate::ws::Message;

pub struct FeedContext {
    pub contract_id: String,
    pub reference_contract_id: String,
    pub window: Arc<PriceWindow>,
    pub fill_signal: Arc<FillSignal>,
    pub tx_log: TransactionLog,
}

pub(crate) fn handle_message(ctx: &FeedContext, message: &Message, now: f64) {
    match message {
        Message::Ticker(tick) => {
            if tick.contract_id != ctx.reference_contract_id {
                return;
            }
            match tick.last_price_f64() {
                Ok(price) => ctx.window.record(price, now),
                Err(e) => warn!(
                    target: targets::MARKET_DATA,
                    error = %e,
                    raw = %tick.last_price,
                    "bad tick price"
                ),
            }
        }
        Message::OrderUpdate(update) => {
            if update.contract_id != ctx.contract_id {
                return;
            }
            if update.status == OrderStatus::Filled {
                let matched = ctx.fill_signal.notify_filled(&update.id);
                info!(
                    target: targets::LIFECYCLE,
                    order_id = %update.id,
                    side = %update.side,
                    price = %update.price,
                    size = %update.size,
                    signaled = matched,
                    "fill reported"
                );
                if let Err(e) = ctx.tx_log.append(
                    &update.id,
                    update.side,
                    &update.size,
                    &update.price,
                    update.status,
                ) {
                    warn!(target: targets::INFRA, error = %e, "transaction log write failed");
                }
            } else if update.status.is_terminal() {
                info!(
                    target: targets::LIFECYCLE,
                    order_id = %update.id,
                    status = %update.status,
                    "order closed without fill"
                );
            } else {
                debug!(
                    target: targets::LIFECYCLE,
                    order_id = %update.id,
                    status = %update.status,
                    "order update"
                );
            }
        }
        Message::Pong | Message::NoData => {}
    }
}

/// Consume the shared feed channel until every sender is gone.
pub fn spawn_feed_task(
    mut receiver: UnboundedReceiver<Arc<Message>>,
    ctx: FeedContext,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            handle_message(&ctx, &message, unix_now());
        }
        debug!(target: targets::INFRA, "feed channel drained, task exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderSide;
    use crate::ws::{OrderUpdateEvent, TickerEvent};

    fn context(dir: &std::path::Path) -> FeedContext {
        FeedContext {
            contract_id: "10000002".to_string(),
            reference_contract_id: "10000001".to_string(),
            window: Arc::new(PriceWindow::new()),
            fill_signal: Arc::new(FillSignal::new()),
            tx_log: TransactionLog::new(dir, "10000002"),
        }
    }

    fn tick(contract: &str, price: &str) -> Message {
        Message::Ticker(TickerEvent {
            contract_id: contract.to_string(),
            last_price: price.to_string(),
        })
    }

    #[test]
    fn reference_ticks_feed_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        handle_message(&ctx, &tick("10000001", "65000.0"), 1.0);
        handle_message(&ctx, &tick("10000001", "65001.0"), 2.0);
        // traded contract's ticks are not reference data
        handle_message(&ctx, &tick("10000002", "101.0"), 3.0);
        assert_eq!(ctx.window.len(), 2);
    }

    #[test]
    fn fill_event_signals_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.fill_signal.arm("77");
        let update = Message::OrderUpdate(OrderUpdateEvent {
            id: "77".to_string(),
            contract_id: "10000002".to_string(),
            side: OrderSide::Buy,
            size: "0.01".to_string(),
            price: "65000.1".to_string(),
            status: OrderStatus::Filled,
        });
        handle_message(&ctx, &update, 1.0);
        let content = std::fs::read_to_string(ctx.tx_log.path()).unwrap();
        assert!(content.contains(",77,BUY,0.01,65000.1,FILLED"));
    }

    #[test]
    fn foreign_contract_updates_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.fill_signal.arm("77");
        let update = Message::OrderUpdate(OrderUpdateEvent {
            id: "77".to_string(),
            contract_id: "99999999".to_string(),
            side: OrderSide::Buy,
            size: "0.01".to_string(),
            price: "1.0".to_string(),
            status: OrderStatus::Filled,
        });
        handle_message(&ctx, &update, 1.0);
        assert!(!ctx.tx_log.path().exists());
    }
}
