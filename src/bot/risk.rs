//! Inventory risk tiers and per-cycle direction selection.
//!
//! All thresholds are multiples of the configured base order quantity, so
//! severity tracks how many unhedged fills have stacked up rather than any
//! notional amount.

use std::fmt;

use rand::Rng;
use tracing::{info, warn};

use crate::bot::logging::targets;
use crate::types::OrderSide;

/// Escalating inventory states. Boundaries use strict `<`, so a net
/// position of exactly 2x base quantity already counts as ReduceSameSide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTier {
    /// |net| < 2q: trade the configured direction freely.
    Normal,
    /// |net| < 4q: probabilistically prefer the reducing direction.
    ReduceSameSide,
    /// |net| < 6q: only the reducing direction is allowed.
    OppositeOnly,
    /// |net| <= 8q: no new orders.
    Pause,
    /// |net| > 8q: hedge aggressively before anything else.
    Emergency,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskTier::Normal => "NORMAL",
            RiskTier::ReduceSameSide => "REDUCE_SAME_SIDE",
            RiskTier::OppositeOnly => "OPPOSITE_ONLY",
            RiskTier::Pause => "PAUSE",
            RiskTier::Emergency => "EMERGENCY",
        };
        f.write_str(s)
    }
}

/// Outcome of direction selection for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionDecision {
    /// None means skip this cycle.
    pub side: Option<OrderSide>,
    /// True when the side differs from the configured default.
    pub overridden: bool,
}

#[derive(Debug, Clone)]
pub struct InventoryManager {
    base_qty: f64,
    flip_probability: f64,
}

impl InventoryManager {
    pub fn new(base_qty: f64, flip_probability: f64) -> Self {
        Self {
            base_qty,
            flip_probability,
        }
    }

    pub fn classify(&self, net: f64) -> RiskTier {
        let q = self.base_qty;
        let abs = net.abs();
        if abs < 2.0 * q {
            RiskTier::Normal
        } else if abs < 4.0 * q {
            RiskTier::ReduceSameSide
        } else if abs < 6.0 * q {
            RiskTier::OppositeOnly
        } else if abs <= 8.0 * q {
            RiskTier::Pause
        } else {
            RiskTier::Emergency
        }
    }

    /// Direction that reduces the current position, once the position is
    /// large enough to care (strictly beyond 2q).
    pub fn direction_bias(&self, net: f64) -> Option<OrderSide> {
        let q = self.base_qty;
        if net > 2.0 * q {
            Some(OrderSide::Sell)
        } else if net < -2.0 * q {
            Some(OrderSide::Buy)
        } else {
            None
        }
    }

    pub fn should_emergency_hedge(&self, net: f64) -> bool {
        net.abs() > 8.0 * self.base_qty
    }

    /// Hedge one batch at a time so a fat-fingered position cannot turn
    /// into one giant market-moving order.
    pub fn hedge_batch_size(&self, net: f64) -> f64 {
        (3.0 * self.base_qty).min(net.abs())
    }

    /// Fraction of the pause threshold currently consumed, as a percentage.
    pub fn inventory_usage_pct(&self, net: f64) -> f64 {
        (net.abs() / (8.0 * self.base_qty)) * 100.0
    }

    /// Pick the side to quote this cycle, or None to sit out.
    pub fn select_direction<R: Rng>(
        &self,
        tier: RiskTier,
        net: f64,
        default: OrderSide,
        rng: &mut R,
    ) -> DirectionDecision {
        let bias = self.direction_bias(net);
        let side = match tier {
            RiskTier::Normal => Some(default),
            RiskTier::ReduceSameSide => {
                if rng.gen::<f64>() < self.flip_probability {
                    bias.or(Some(default))
                } else {
                    Some(default)
                }
            }
            RiskTier::OppositeOnly => bias,
            RiskTier::Pause | RiskTier::Emergency => None,
        };
        let overridden = matches!(side, Some(s) if s != default);
        if overridden {
            warn!(
                target: targets::RISK,
                tier = %tier,
                net = net,
                configured = %default,
                executed = %side.map(|s| s.as_str()).unwrap_or("-"),
                usage_pct = self.inventory_usage_pct(net),
                "direction overridden to reduce inventory"
            );
        } else if side.is_none() {
            info!(
                target: targets::RISK,
                tier = %tier,
                net = net,
                usage_pct = self.inventory_usage_pct(net),
                "skipping cycle"
            );
        }
        DirectionDecision { side, overridden }
    }
}
