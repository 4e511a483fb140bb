//! The sequential execution loop.
//!
//! One cycle: reconcile, hedge emergencies, throttle, wait out volatility,
//! pick a direction, open and monitor one order. Everything runs on a
//! single task; the only concurrency is the WS feed task writing into the
//! price window and the fill signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use tracing::{error, info, warn};

use crate::bot::lifecycle::OrderLifecycle;
use crate::bot::logging::targets;
use crate::bot::market_data::VolatilityGate;
use crate::bot::reconcile::Reconciler;
use crate::bot::risk::{InventoryManager, RiskTier};
use crate::bot::throttle::OpenThrottle;
use crate::bot::tx_log::DecisionLog;
use crate::exchange::ExchangeApi;
use crate::helpers::unix_now;
use crate::prelude::*;
use crate::retry::{with_retries, RetryPolicy};
use crate::types::OrderSide;

/// Let WS subscriptions establish before the first cycle.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

const VOLATILITY_BACKOFF: Duration = Duration::from_secs(30);
const PAUSE_SLEEP: Duration = Duration::from_secs(30);
const SKIP_SLEEP: Duration = Duration::from_secs(5);
const CYCLE_ERROR_SLEEP: Duration = Duration::from_secs(1);

pub struct Engine {
    exchange: Arc<dyn ExchangeApi>,
    lifecycle: OrderLifecycle,
    inventory: InventoryManager,
    throttle: OpenThrottle,
    gate: VolatilityGate,
    reconciler: Reconciler,
    decision_log: DecisionLog,
    contract_id: String,
    default_direction: OrderSide,
    shutdown: Arc<AtomicBool>,
    rng: StdRng,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        lifecycle: OrderLifecycle,
        inventory: InventoryManager,
        throttle: OpenThrottle,
        gate: VolatilityGate,
        reconciler: Reconciler,
        decision_log: DecisionLog,
        contract_id: String,
        default_direction: OrderSide,
        shutdown: Arc<AtomicBool>,
        rng: StdRng,
    ) -> Self {
        Self {
            exchange,
            lifecycle,
            inventory,
            throttle,
            gate,
            reconciler,
            decision_log,
            contract_id,
            default_direction,
            shutdown,
            rng,
        }
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Sleep in 1s slices so a shutdown request never waits out a long
    /// backoff.
    async fn sleep_interruptible(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.stopping() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            tokio::time::sleep(remaining.min(Duration::from_secs(1))).await;
        }
    }

    async fn current_inventory(&self) -> Result<f64> {
        let exchange = Arc::clone(&self.exchange);
        let positions = with_retries(RetryPolicy::quick(), "positions", || {
            let exchange = Arc::clone(&exchange);
            async move { exchange.get_account_positions().await }
        })
        .await?;
        positions
            .iter()
            .find(|p| p.contract_id == self.contract_id)
            .map(|p| p.signed_size())
            .transpose()
            .map(|net| net.unwrap_or(0.0))
    }

    async fn active_order_count(&self) -> Result<usize> {
        let exchange = Arc::clone(&self.exchange);
        let contract_id = self.contract_id.clone();
        let orders = with_retries(RetryPolicy::quick(), "active_orders", || {
            let exchange = Arc::clone(&exchange);
            let contract_id = contract_id.clone();
            async move { exchange.get_active_orders(&contract_id).await }
        })
        .await?;
        Ok(orders.len())
    }

    pub(crate) async fn cycle(&mut self) -> Result<()> {
        let now = Instant::now();

        if self.reconciler.due(now) {
            match self.reconciler.check(&self.inventory, now).await {
                Ok(outcome) if outcome.fatal => {
                    self.shutdown.store(true, Ordering::Relaxed);
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => warn!(
                    target: targets::RECONCILE,
                    error = %e,
                    "reconciliation check failed"
                ),
            }
        }

        let net = self.current_inventory().await?;

        if self.inventory.should_emergency_hedge(net) {
            let batch = self.inventory.hedge_batch_size(net);
            let side = if net > 0.0 {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            };
            warn!(
                target: targets::ENGINE,
                net = net,
                batch = batch,
                side = %side,
                "emergency inventory, hedging before anything else"
            );
            if let Err(e) = self.lifecycle.place_hedge_order(side, batch, true).await {
                error!(target: targets::ENGINE, error = %e, "emergency hedge failed");
            }
            self.sleep_interruptible(CYCLE_ERROR_SLEEP).await;
            return Ok(());
        }

        let active = self.active_order_count().await?;
        let wait = self.throttle.next_wait(active, now);
        if !wait.is_zero() {
            self.sleep_interruptible(wait).await;
            return Ok(());
        }

        while !self.stopping() && !self.gate.is_safe(unix_now()).await {
            self.sleep_interruptible(VOLATILITY_BACKOFF).await;
        }
        if self.stopping() {
            return Ok(());
        }

        let tier = self.inventory.classify(net);
        let decision =
            self.inventory
                .select_direction(tier, net, self.default_direction, &mut self.rng);
        if decision.overridden || decision.side.is_none() {
            if let Err(e) = self.decision_log.record(
                net,
                &tier.to_string(),
                self.default_direction,
                decision.side,
                self.inventory.inventory_usage_pct(net),
            ) {
                warn!(target: targets::INFRA, error = %e, "decision log write failed");
            }
        }

        match decision.side {
            Some(side) => match self.lifecycle.open_and_monitor(side).await {
                Ok(filled) => {
                    info!(
                        target: targets::ENGINE,
                        side = %side,
                        filled = filled,
                        "open sequence complete"
                    );
                    self.throttle.record_open(Instant::now());
                }
                Err(e) => {
                    warn!(target: targets::ENGINE, error = %e, "open sequence failed");
                    self.sleep_interruptible(CYCLE_ERROR_SLEEP).await;
                }
            },
            None => {
                let backoff = if tier == RiskTier::Pause {
                    PAUSE_SLEEP
                } else {
                    SKIP_SLEEP
                };
                self.sleep_interruptible(backoff).await;
            }
        }
        Ok(())
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(
            target: targets::ENGINE,
            contract_id = %self.contract_id,
            direction = %self.default_direction,
            "execution loop starting"
        );
        self.sleep_interruptible(SETTLE_DELAY).await;

        while !self.stopping() {
            if let Err(e) = self.cycle().await {
                warn!(target: targets::ENGINE, error = %e, "cycle aborted");
                self.sleep_interruptible(CYCLE_ERROR_SLEEP).await;
            }
        }

        self.graceful_shutdown().await;
        Ok(())
    }

    /// Best-effort cancel of everything still working on the contract.
    async fn graceful_shutdown(&self) {
        info!(target: targets::ENGINE, "shutting down, canceling active orders");
        match self.exchange.get_active_orders(&self.contract_id).await {
            Ok(orders) => {
                let total = orders.len();
                let mut canceled = 0usize;
                for order in orders {
                    match self.exchange.cancel_order(&order.id).await {
                        Ok(()) => canceled += 1,
                        Err(e) => warn!(
                            target: targets::ENGINE,
                            order_id = %order.id,
                            error = %e,
                            "cancel failed during shutdown"
                        ),
                    }
                }
                info!(
                    target: targets::ENGINE,
                    canceled = canceled,
                    total = total,
                    "shutdown cleanup done"
                );
            }
            Err(e) => warn!(
                target: targets::ENGINE,
                error = %e,
                "could not list active orders during shutdown"
            ),
        }
    }
}
