//! Component tests against a scripted exchange.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bot::config::{ContractSpec, TradingConfig};
use crate::bot::engine::Engine;
use crate::bot::lifecycle::{FillSignal, OrderLifecycle, MAX_PLACE_ATTEMPTS};
use crate::bot::market_data::{PriceWindow, VolatilityGate};
use crate::bot::reconcile::Reconciler;
use crate::bot::risk::InventoryManager;
use crate::bot::throttle::OpenThrottle;
use crate::bot::tx_log::DecisionLog;
use crate::exchange::{CreateOrderRequest, ExchangeApi};
use crate::prelude::*;
use crate::types::{
    ActiveOrder, BookLevel, DayQuote, OrderBookDepth, OrderDetail, OrderSide, OrderStatus,
    Position, PositionSide,
};

const CONTRACT: &str = "10000002";
const REFERENCE: &str = "10000001";

#[derive(Clone, Copy, PartialEq)]
enum FillMode {
    /// Accepted orders rest on the book forever.
    Rest,
    /// Accepted orders report FILLED on the first status read.
    FillImmediately,
    /// Orders rest until canceled, then report this much filled.
    PartialThenCancel(f64),
}

struct MockState {
    book: OrderBookDepth,
    positions: Vec<Position>,
    active: Vec<ActiveOrder>,
    quote: Option<DayQuote>,
    /// This many creations get post-only canceled by the venue.
    reject_first: u32,
    /// This many creations fail with a 503 before reaching the venue.
    transient_create_failures: u32,
    fill_mode: FillMode,
    created: Vec<CreateOrderRequest>,
    canceled: Vec<String>,
}

struct MockExchange {
    state: Mutex<MockState>,
}

fn levels(prices: &[&str]) -> Vec<BookLevel> {
    prices
        .iter()
        .map(|p| BookLevel {
            price: p.to_string(),
            size: "1".to_string(),
        })
        .collect()
}

fn default_book() -> OrderBookDepth {
    OrderBookDepth {
        bids: levels(&["99.9", "99.8", "99.7"]),
        asks: levels(&["100.1", "100.2", "100.3"]),
    }
}

impl MockExchange {
    fn new(fill_mode: FillMode) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                book: default_book(),
                positions: vec![],
                active: vec![],
                quote: Some(DayQuote {
                    contract_id: REFERENCE.to_string(),
                    price_change_percent: "0.001".to_string(),
                    last_price: None,
                }),
                reject_first: 0,
                transient_create_failures: 0,
                fill_mode,
                created: vec![],
                canceled: vec![],
            }),
        })
    }

    fn set_reject_first(&self, n: u32) {
        self.state.lock().unwrap().reject_first = n;
    }

    fn set_transient_create_failures(&self, n: u32) {
        self.state.lock().unwrap().transient_create_failures = n;
    }

    fn set_quote(&self, quote: Option<DayQuote>) {
        self.state.lock().unwrap().quote = quote;
    }

    fn set_position(&self, signed: f64) {
        let (side, size) = if signed < 0.0 {
            (PositionSide::Short, -signed)
        } else {
            (PositionSide::Long, signed)
        };
        self.state.lock().unwrap().positions = vec![Position {
            contract_id: CONTRACT.to_string(),
            open_size: format!("{size}"),
            side,
        }];
    }

    fn created(&self) -> Vec<CreateOrderRequest> {
        self.state.lock().unwrap().created.clone()
    }

    fn canceled(&self) -> Vec<String> {
        self.state.lock().unwrap().canceled.clone()
    }
}

#[async_trait]
impl ExchangeApi for MockExchange {
    async fn get_order_book_depth(&self, _contract_id: &str, _limit: u32) -> Result<OrderBookDepth> {
        Ok(self.state.lock().unwrap().book.clone())
    }

    async fn create_limit_order(&self, req: CreateOrderRequest) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.transient_create_failures > 0 {
            state.transient_create_failures -= 1;
            return Err(Error::ServerRequest {
                status_code: 503,
                error_message: "upstream unavailable".to_string(),
            });
        }
        state.created.push(req);
        Ok(state.created.len().to_string())
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .canceled
            .push(order_id.to_string());
        Ok(())
    }

    async fn get_order_by_id(&self, order_id: &str) -> Result<OrderDetail> {
        let state = self.state.lock().unwrap();
        let idx: usize = order_id
            .parse::<usize>()
            .map_err(|_| Error::MalformedResponse("bad id".to_string()))?
            - 1;
        let req = state
            .created
            .get(idx)
            .ok_or_else(|| Error::MalformedResponse("unknown order".to_string()))?
            .clone();

        let rejected = (idx as u32) < state.reject_first;
        let was_canceled = state.canceled.iter().any(|id| id == order_id);
        let (status, cum, reason) = if rejected {
            (OrderStatus::Canceled, "0".to_string(), Some("POST_ONLY_REJECT".to_string()))
        } else {
            match state.fill_mode {
                FillMode::FillImmediately => (OrderStatus::Filled, req.size.clone(), None),
                FillMode::Rest if was_canceled => (OrderStatus::Canceled, "0".to_string(), None),
                FillMode::Rest => (OrderStatus::Open, "0".to_string(), None),
                FillMode::PartialThenCancel(filled) if was_canceled => {
                    (OrderStatus::Canceled, format!("{filled}"), None)
                }
                FillMode::PartialThenCancel(_) => (OrderStatus::Open, "0".to_string(), None),
            }
        };

        Ok(OrderDetail {
            id: order_id.to_string(),
            contract_id: req.contract_id,
            side: req.side,
            size: req.size,
            price: req.price,
            status,
            cum_fill_size: Some(cum),
            cancel_reason: reason,
        })
    }

    async fn get_active_orders(&self, contract_id: &str) -> Result<Vec<ActiveOrder>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .active
            .iter()
            .filter(|o| o.contract_id == contract_id)
            .cloned()
            .collect())
    }

    async fn get_account_positions(&self) -> Result<Vec<Position>> {
        Ok(self.state.lock().unwrap().positions.clone())
    }

    async fn get_24h_quote(&self, _contract_id: &str) -> Result<DayQuote> {
        self.state
            .lock()
            .unwrap()
            .quote
            .clone()
            .ok_or_else(|| Error::GenericRequest("quote unavailable".to_string()))
    }
}

fn trading_config() -> TradingConfig {
    TradingConfig {
        contract_id: CONTRACT.to_string(),
        quantity: 0.01,
        take_profit: 0.003,
        direction: OrderSide::Buy,
        max_orders: 40,
        wait_time_secs: 450,
    }
}

fn contract_spec() -> ContractSpec {
    ContractSpec {
        price_step: 0.1,
        price_delta: 0.1,
    }
}

fn lifecycle(mock: &Arc<MockExchange>) -> OrderLifecycle {
    let exchange: Arc<dyn ExchangeApi> = Arc::clone(mock) as Arc<dyn ExchangeApi>;
    OrderLifecycle::new(
        exchange,
        Arc::new(FillSignal::new()),
        &trading_config(),
        &contract_spec(),
    )
}

fn engine(mock: &Arc<MockExchange>, tolerance: f64) -> Engine {
    let exchange: Arc<dyn ExchangeApi> = Arc::clone(mock) as Arc<dyn ExchangeApi>;
    let trading = trading_config();
    let contract = contract_spec();
    let fill_signal = Arc::new(FillSignal::new());
    let lifecycle = OrderLifecycle::new(Arc::clone(&exchange), fill_signal, &trading, &contract);
    let gate = VolatilityGate::new(
        Arc::new(PriceWindow::new()),
        Arc::clone(&exchange),
        REFERENCE.to_string(),
        105.0,
    );
    Engine::new(
        Arc::clone(&exchange),
        lifecycle,
        InventoryManager::new(trading.quantity, 0.5),
        OpenThrottle::new(trading.wait_time(), trading.max_orders),
        gate,
        Reconciler::new(Arc::clone(&exchange), CONTRACT.to_string(), tolerance),
        DecisionLog::new(&std::env::temp_dir(), CONTRACT),
        CONTRACT.to_string(),
        OrderSide::Buy,
        Arc::new(AtomicBool::new(false)),
        StdRng::seed_from_u64(7),
    )
}

fn day_quote(pct: &str) -> DayQuote {
    DayQuote {
        contract_id: REFERENCE.to_string(),
        price_change_percent: pct.to_string(),
        last_price: None,
    }
}

fn gate(mock: &Arc<MockExchange>, window: Arc<PriceWindow>) -> VolatilityGate {
    VolatilityGate::new(
        window,
        Arc::clone(mock) as Arc<dyn ExchangeApi>,
        REFERENCE.to_string(),
        105.0,
    )
}

#[tokio::test(start_paused = true)]
async fn sparse_window_falls_back_to_daily_change() {
    let mock = MockExchange::new(FillMode::Rest);
    let window = Arc::new(PriceWindow::new());
    // one sample is not enough for an amplitude verdict
    window.record(65000.0, 0.0);
    let gate = gate(&mock, Arc::clone(&window));

    mock.set_quote(Some(day_quote("0.05")));
    assert!(!gate.is_safe(1.0).await);

    mock.set_quote(Some(day_quote("-0.05")));
    assert!(!gate.is_safe(1.0).await);

    mock.set_quote(Some(day_quote("0.01")));
    assert!(gate.is_safe(1.0).await);
}

#[tokio::test(start_paused = true)]
async fn unavailable_daily_quote_defaults_to_allowing_trades() {
    let mock = MockExchange::new(FillMode::Rest);
    let gate = gate(&mock, Arc::new(PriceWindow::new()));

    mock.set_quote(None);
    assert!(gate.is_safe(0.0).await);

    mock.set_quote(Some(day_quote("not-a-number")));
    assert!(gate.is_safe(0.0).await);
}

#[tokio::test(start_paused = true)]
async fn open_retries_until_post_only_accepts() {
    let mock = MockExchange::new(FillMode::Rest);
    mock.set_reject_first(3);
    let placed = lifecycle(&mock).place_open_order(OrderSide::Buy).await.unwrap();
    assert_eq!(placed.order_id, "4");
    let created = mock.created();
    assert_eq!(created.len(), 4);
    for req in &created {
        assert!(req.post_only);
        assert_eq!(req.side, OrderSide::Buy);
        // buy rests one delta inside the ask
        assert_eq!(req.price, "100.0");
    }
}

#[tokio::test(start_paused = true)]
async fn open_gives_up_after_attempt_budget() {
    let mock = MockExchange::new(FillMode::Rest);
    mock.set_reject_first(u32::MAX);
    let result = lifecycle(&mock).place_open_order(OrderSide::Sell).await;
    match result {
        Err(Error::MakerRejected { attempts }) => assert_eq!(attempts, MAX_PLACE_ATTEMPTS),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(mock.created().len(), MAX_PLACE_ATTEMPTS as usize);
}

#[tokio::test(start_paused = true)]
async fn transient_create_errors_share_the_budget() {
    let mock = MockExchange::new(FillMode::Rest);
    mock.set_transient_create_failures(2);
    let placed = lifecycle(&mock).place_open_order(OrderSide::Buy).await.unwrap();
    assert_eq!(placed.status, OrderStatus::Open);
    // two attempts died before the venue saw them
    assert_eq!(mock.created().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn filled_open_places_take_profit_close() {
    let mock = MockExchange::new(FillMode::FillImmediately);
    let handled = lifecycle(&mock).open_and_monitor(OrderSide::Buy).await.unwrap();
    assert!(handled);
    let created = mock.created();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].side, OrderSide::Buy);
    assert_eq!(created[0].price, "100.0");
    // close is the opposite side at fill price * (1 + take_profit)
    assert_eq!(created[1].side, OrderSide::Sell);
    assert_eq!(created[1].price, "100.3");
    assert_eq!(created[1].size, "0.01");
}

#[tokio::test(start_paused = true)]
async fn unfilled_open_is_canceled_without_close() {
    let mock = MockExchange::new(FillMode::Rest);
    let handled = lifecycle(&mock).open_and_monitor(OrderSide::Buy).await.unwrap();
    assert!(!handled);
    assert_eq!(mock.created().len(), 1);
    assert_eq!(mock.canceled(), vec!["1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn partial_fill_closes_only_the_filled_size() {
    let mock = MockExchange::new(FillMode::PartialThenCancel(0.004));
    let handled = lifecycle(&mock).open_and_monitor(OrderSide::Buy).await.unwrap();
    assert!(handled);
    let created = mock.created();
    assert_eq!(created.len(), 2);
    assert_eq!(created[1].side, OrderSide::Sell);
    assert_eq!(created[1].size, "0.004");
}

#[tokio::test(start_paused = true)]
async fn close_price_moves_off_a_crossing_target() {
    let mock = MockExchange::new(FillMode::Rest);
    // a sell at 99.5 would cross the 99.9 bid
    let placed = lifecycle(&mock)
        .place_close_order(OrderSide::Sell, 0.01, 99.5)
        .await
        .unwrap();
    assert_eq!(placed.price, 100.0);
    assert_eq!(mock.created()[0].price, "100.0");
}

#[tokio::test(start_paused = true)]
async fn close_price_keeps_a_resting_target() {
    let mock = MockExchange::new(FillMode::Rest);
    let placed = lifecycle(&mock)
        .place_close_order(OrderSide::Sell, 0.01, 100.3)
        .await
        .unwrap();
    assert_eq!(placed.price, 100.3);
}

#[tokio::test(start_paused = true)]
async fn aggressive_hedge_walks_into_the_book() {
    let mock = MockExchange::new(FillMode::Rest);
    let placed = lifecycle(&mock)
        .place_hedge_order(OrderSide::Sell, 0.03, true)
        .await
        .unwrap();
    // third bid level
    assert_eq!(placed.price, 99.7);
    let req = &mock.created()[0];
    assert!(req.post_only);
    assert_eq!(req.size, "0.03");
}

#[tokio::test(start_paused = true)]
async fn conservative_hedge_rests_inside_the_touch() {
    let mock = MockExchange::new(FillMode::Rest);
    let placed = lifecycle(&mock)
        .place_hedge_order(OrderSide::Sell, 0.01, false)
        .await
        .unwrap();
    assert_eq!(placed.price, 100.0);
}

#[tokio::test(start_paused = true)]
async fn shallow_book_falls_back_past_the_touch() {
    let mock = MockExchange::new(FillMode::Rest);
    mock.state.lock().unwrap().book = OrderBookDepth {
        bids: levels(&["99.9"]),
        asks: levels(&["100.1"]),
    };
    let placed = lifecycle(&mock)
        .place_hedge_order(OrderSide::Sell, 0.03, true)
        .await
        .unwrap();
    assert_eq!(placed.price, 99.8);
}

#[tokio::test(start_paused = true)]
async fn emergency_inventory_hedges_before_trading() {
    let mock = MockExchange::new(FillMode::Rest);
    mock.set_position(0.09); // 9x base quantity
    let mut eng = engine(&mock, 1.0);
    eng.cycle().await.unwrap();
    let created = mock.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].side, OrderSide::Sell);
    assert_eq!(created[0].size, "0.03");
    // aggressive: third bid level
    assert_eq!(created[0].price, "99.7");
}

#[tokio::test(start_paused = true)]
async fn normal_cycle_opens_and_closes() {
    let mock = MockExchange::new(FillMode::FillImmediately);
    let mut eng = engine(&mock, 1.0);
    eng.cycle().await.unwrap();
    let created = mock.created();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].side, OrderSide::Buy);
    assert_eq!(created[1].side, OrderSide::Sell);
}

#[tokio::test(start_paused = true)]
async fn exposure_mismatch_shuts_the_engine_down() {
    let mock = MockExchange::new(FillMode::Rest);
    // long 0.05 with no working closes, tolerance 2x quantity
    mock.set_position(0.05);
    let mut eng = engine(&mock, 0.02);
    let shutdown = eng.shutdown_handle();
    eng.run().await.unwrap();
    assert!(shutdown.load(std::sync::atomic::Ordering::Relaxed));
    // no trading happened on the way out
    assert!(mock.created().is_empty());
}
