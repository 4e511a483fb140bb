//! Price window and volatility gate.
//!
//! The WS feed task records reference-contract ticks into a shared
//! [`PriceWindow`]; the execution loop asks the [`VolatilityGate`] whether
//! the last minute of prices is calm enough to quote into.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::bot::logging::targets;
use crate::exchange::ExchangeApi;
use crate::EPSILON;

/// Samples older than this (relative to the newest) are pruned.
const RETENTION_SECS: f64 = 300.0;

/// Window the gate actually inspects.
const CHECK_WINDOW_SECS: f64 = 60.0;

/// Relative amplitude limit: amplitude / latest price.
const MAX_PCT_CHANGE: f64 = 0.005;

/// 24h fallback: |change| above this fraction blocks trading.
const FALLBACK_MAX_24H_CHANGE: f64 = 0.03;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSample {
    pub price: f64,
    pub timestamp: f64,
}

/// Rolling buffer of last-trade prices, shared between the feed task and
/// the execution loop. The lock is never held across an await point.
#[derive(Debug, Default)]
pub struct PriceWindow {
    samples: Mutex<VecDeque<PriceSample>>,
}

impl PriceWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one tick. Consecutive duplicate prices are dropped so a quiet
    /// book does not masquerade as a full window of fresh data.
    pub fn record(&self, price: f64, timestamp: f64) {
        let mut samples = self.samples.lock().unwrap();
        if let Some(last) = samples.back() {
            if (last.price - price).abs() < EPSILON {
                return;
            }
        }
        samples.push_back(PriceSample { price, timestamp });
        while let Some(front) = samples.front() {
            if timestamp - front.timestamp > RETENTION_SECS {
                samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Samples with timestamps within `window_secs` of `now`, oldest first.
    pub fn recent(&self, window_secs: f64, now: f64) -> Vec<PriceSample> {
        let samples = self.samples.lock().unwrap();
        samples
            .iter()
            .filter(|s| now - s.timestamp <= window_secs)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Verdict from the amplitude check over one window of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmplitudeCheck {
    pub high: f64,
    pub low: f64,
    pub amplitude: f64,
    pub pct_change: f64,
    pub safe: bool,
}

/// Pure amplitude check; `None` when there are too few samples to judge.
pub fn check_amplitude(samples: &[PriceSample], max_amplitude: f64) -> Option<AmplitudeCheck> {
    if samples.len() < 2 {
        return None;
    }
    let mut high = f64::MIN;
    let mut low = f64::MAX;
    for s in samples {
        high = high.max(s.price);
        low = low.min(s.price);
    }
    let amplitude = high - low;
    let latest = samples[samples.len() - 1].price;
    let pct_change = if latest > 0.0 { amplitude / latest } else { 0.0 };
    let safe = amplitude <= max_amplitude && pct_change <= MAX_PCT_CHANGE;
    Some(AmplitudeCheck {
        high,
        low,
        amplitude,
        pct_change,
        safe,
    })
}

/// Decides whether current volatility allows quoting.
pub struct VolatilityGate {
    window: Arc<PriceWindow>,
    exchange: Arc<dyn ExchangeApi>,
    reference_contract_id: String,
    max_amplitude: f64,
}

impl VolatilityGate {
    pub fn new(
        window: Arc<PriceWindow>,
        exchange: Arc<dyn ExchangeApi>,
        reference_contract_id: String,
        max_amplitude: f64,
    ) -> Self {
        Self {
            window,
            exchange,
            reference_contract_id,
            max_amplitude,
        }
    }

    /// True when it is safe to place orders. With fewer than two samples in
    /// the last minute the decision falls back to the 24h change; if even
    /// that cannot be fetched, trading is allowed.
    pub async fn is_safe(&self, now: f64) -> bool {
        let samples = self.window.recent(CHECK_WINDOW_SECS, now);
        match check_amplitude(&samples, self.max_amplitude) {
            Some(check) => {
                debug!(
                    target: targets::MARKET_DATA,
                    count = samples.len(),
                    high = check.high,
                    low = check.low,
                    amplitude = check.amplitude,
                    pct_change = check.pct_change,
                    safe = check.safe,
                    prices = ?samples.iter().map(|s| s.price).collect::<Vec<_>>(),
                    "amplitude check"
                );
                if !check.safe {
                    info!(
                        target: targets::MARKET_DATA,
                        amplitude = check.amplitude,
                        max_amplitude = self.max_amplitude,
                        pct_change = check.pct_change,
                        "volatility too high, holding off"
                    );
                }
                check.safe
            }
            None => self.fallback_24h().await,
        }
    }

    async fn fallback_24h(&self) -> bool {
        match self
            .exchange
            .get_24h_quote(&self.reference_contract_id)
            .await
            .and_then(|q| q.change_fraction())
        {
            Ok(change) => {
                let safe = change.abs() <= FALLBACK_MAX_24H_CHANGE;
                debug!(
                    target: targets::MARKET_DATA,
                    change_24h = change,
                    safe = safe,
                    "too few samples, using 24h change"
                );
                safe
            }
            Err(e) => {
                warn!(
                    target: targets::MARKET_DATA,
                    error = %e,
                    "24h quote unavailable, defaulting to safe"
                );
                true
            }
        }
    }
}
