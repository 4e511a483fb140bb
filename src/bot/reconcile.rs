//! Periodic exposure reconciliation.
//!
//! A maker bot that opens in one direction and closes in the other should
//! always carry active orders whose net size mirrors its position. When the
//! two drift apart, state tracking is broken and the only safe move is to
//! stop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::bot::logging::targets;
use crate::bot::risk::InventoryManager;
use crate::exchange::ExchangeApi;
use crate::prelude::*;
use crate::types::OrderSide;

const RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Account state gathered for one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureSnapshot {
    /// Signed position size on the contract.
    pub position: f64,
    /// Total size of active buy orders.
    pub active_buy: f64,
    /// Total size of active sell orders.
    pub active_sell: f64,
}

impl ExposureSnapshot {
    pub fn active_net(&self) -> f64 {
        self.active_buy - self.active_sell
    }

    /// Orders outstanding should unwind the position.
    pub fn expected_active(&self) -> f64 {
        -self.position
    }

    pub fn mismatch(&self) -> f64 {
        (self.active_net() - self.expected_active()).abs()
    }

    pub fn exceeds(&self, tolerance: f64) -> bool {
        self.mismatch() > tolerance
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileOutcome {
    pub snapshot: ExposureSnapshot,
    /// Mismatch beyond tolerance; the engine must shut down.
    pub fatal: bool,
}

pub struct Reconciler {
    exchange: Arc<dyn ExchangeApi>,
    contract_id: String,
    tolerance: f64,
    last_tick: Option<Instant>,
}

impl Reconciler {
    pub fn new(exchange: Arc<dyn ExchangeApi>, contract_id: String, tolerance: f64) -> Self {
        Self {
            exchange,
            contract_id,
            tolerance,
            last_tick: None,
        }
    }

    pub fn due(&self, now: Instant) -> bool {
        match self.last_tick {
            Some(last) => now.duration_since(last) >= RECONCILE_INTERVAL,
            None => true,
        }
    }

    /// Fetch exposure, emit the status line, flag fatal drift. Never
    /// places corrective orders.
    pub async fn check(&mut self, inventory: &InventoryManager, now: Instant) -> Result<ReconcileOutcome> {
        self.last_tick = Some(now);

        let orders = self.exchange.get_active_orders(&self.contract_id).await?;
        let mut active_buy = 0.0;
        let mut active_sell = 0.0;
        for order in &orders {
            let size = order.size_f64()?;
            match order.side {
                OrderSide::Buy => active_buy += size,
                OrderSide::Sell => active_sell += size,
            }
        }

        let positions = self.exchange.get_account_positions().await?;
        let position = positions
            .iter()
            .find(|p| p.contract_id == self.contract_id)
            .map(|p| p.signed_size())
            .transpose()?
            .unwrap_or(0.0);

        let snapshot = ExposureSnapshot {
            position,
            active_buy,
            active_sell,
        };

        let tier = inventory.classify(position);
        info!(
            target: targets::RECONCILE,
            position = position,
            active_buy = active_buy,
            active_sell = active_sell,
            active_net = snapshot.active_net(),
            usage_pct = inventory.inventory_usage_pct(position),
            tier = %tier,
            order_count = orders.len(),
            "exposure status"
        );

        let fatal = snapshot.exceeds(self.tolerance);
        if fatal {
            error!(
                target: targets::RECONCILE,
                active_net = snapshot.active_net(),
                expected = snapshot.expected_active(),
                mismatch = snapshot.mismatch(),
                tolerance = self.tolerance,
                "exposure mismatch beyond tolerance, requesting shutdown"
            );
        }

        Ok(ReconcileOutcome { snapshot, fatal })
    }
}
