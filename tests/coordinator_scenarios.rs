//! End-to-end order lifecycle scenarios through the execution coordinator.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ordex::config::{AggregatorConfig, ExecutionConfig};
use ordex::domain::{Order, OrderSide, OrderStatus, PriceTick};
use ordex::engine::{Evaluation, ExecutionCoordinator, IdempotencyGuard};
use ordex::error::Result;
use ordex::pricing::{PriceAggregator, ProviderQuote, QuoteProvider, SyntheticMarket};
use ordex::services::audit::TracingAuditSink;
use ordex::store::{MemoryOrderStore, OrderStore};
use ordex::venue::{ExecutionVenue, FillReport, PaperVenue, RetryingSubmitter, SubmitRequest};

/// Wraps a venue and counts submissions, for at-most-once assertions.
struct CountingVenue {
    inner: PaperVenue,
    submissions: Arc<AtomicUsize>,
}

#[async_trait]
impl ExecutionVenue for CountingVenue {
    fn name(&self) -> &str {
        "counting-paper"
    }

    fn is_paper(&self) -> bool {
        true
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<FillReport> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.inner.submit(request).await
    }
}

struct FailingProvider;

#[async_trait]
impl QuoteProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn quote(&self, _: &str, _: OrderSide, _: Decimal) -> Result<ProviderQuote> {
        Err(ordex::error::OrdexError::InvalidMarketData(
            "provider offline".to_string(),
        ))
    }
}

struct SlowProvider {
    market: Arc<SyntheticMarket>,
    delay_ms: u64,
}

#[async_trait]
impl QuoteProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn quote(&self, _: &str, _: OrderSide, _: Decimal) -> Result<ProviderQuote> {
        tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        Ok(ProviderQuote {
            price: self.market.price().await,
            liquidity_usd: None,
        })
    }
}

struct Harness {
    market: Arc<SyntheticMarket>,
    store: Arc<MemoryOrderStore>,
    coordinator: ExecutionCoordinator,
    submissions: Arc<AtomicUsize>,
}

impl Harness {
    fn with_market(market: Arc<SyntheticMarket>, fill_ratio: Decimal) -> Self {
        let providers = vec![market.provider("synthetic")];
        Self::build(market, providers, fill_ratio, ExecutionConfig::default())
    }

    fn build(
        market: Arc<SyntheticMarket>,
        providers: Vec<Arc<dyn QuoteProvider>>,
        fill_ratio: Decimal,
        execution: ExecutionConfig,
    ) -> Self {
        let aggregator = Arc::new(PriceAggregator::new(
            providers,
            market.spot_source(),
            AggregatorConfig::default(),
        ));
        let store = Arc::new(MemoryOrderStore::new());
        let idempotency = Arc::new(IdempotencyGuard::new(ChronoDuration::hours(24)));
        let submissions = Arc::new(AtomicUsize::new(0));
        let venue = Arc::new(CountingVenue {
            inner: PaperVenue::with_fill_ratio(fill_ratio),
            submissions: Arc::clone(&submissions),
        });
        let submitter = RetryingSubmitter::new(venue, &execution);

        let coordinator = ExecutionCoordinator::new(
            store.clone() as Arc<dyn OrderStore>,
            aggregator,
            idempotency,
            submitter,
            Arc::new(TracingAuditSink),
            execution,
        );

        Self {
            market,
            store,
            coordinator,
            submissions,
        }
    }

    async fn tick(&self, order_id: i64, price: Decimal) -> Evaluation {
        self.market.set_price(price).await;
        let tick = PriceTick {
            symbol: "BTC/USD".to_string(),
            price,
            timestamp: Utc::now(),
        };
        self.coordinator.evaluate(order_id, &tick).await.unwrap()
    }
}

fn harness(start_price: Decimal) -> Harness {
    Harness::with_market(Arc::new(SyntheticMarket::new(start_price)), Decimal::ONE)
}

#[tokio::test]
async fn trailing_stop_ratchets_then_executes() {
    let h = harness(dec!(100));
    let order = Order::trailing_stop(1, "BTC/USD", OrderSide::Sell, dec!(10), Some(dec!(0.05)), None);
    let order = h.store.insert(order).await.unwrap();

    // 100: watermark established, trigger at 95.00
    assert_eq!(h.tick(order.id, dec!(100)).await, Evaluation::NotTriggered);
    let saved = h.store.load(order.id).await.unwrap();
    assert_eq!(saved.highest_price, Some(dec!(100)));

    // 110: watermark ratchets up, trigger moves to 104.50
    assert_eq!(h.tick(order.id, dec!(110)).await, Evaluation::NotTriggered);
    let saved = h.store.load(order.id).await.unwrap();
    assert_eq!(saved.highest_price, Some(dec!(110)));

    // 90: crosses 104.50, executes at the quoted price
    match h.tick(order.id, dec!(90)).await {
        Evaluation::Executed(outcome) => {
            assert_eq!(outcome.status, OrderStatus::Filled);
            assert_eq!(outcome.filled_amount, dec!(10));
            assert_eq!(outcome.quote_price, dec!(90));
        }
        other => panic!("expected execution, got {other:?}"),
    }

    let saved = h.store.load(order.id).await.unwrap();
    assert_eq!(saved.status, OrderStatus::Filled);
    assert_eq!(saved.average_fill_price, Some(dec!(90)));
    // Watermark never moved down
    assert_eq!(saved.highest_price, Some(dec!(110)));
    assert_eq!(h.submissions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn oco_fill_cancels_sibling() {
    let h = harness(dec!(100));
    let (stop, tp) = Order::oco_pair(1, "BTC/USD", OrderSide::Sell, dec!(5), dec!(90), dec!(120));
    let mut stop = h.store.insert(stop).await.unwrap();
    let mut tp = h.store.insert(tp).await.unwrap();
    Order::link_pair(&mut stop, &mut tp);
    h.store.save(&stop).await.unwrap();
    h.store.save(&tp).await.unwrap();

    match h.tick(stop.id, dec!(85)).await {
        Evaluation::Executed(outcome) => assert_eq!(outcome.status, OrderStatus::Filled),
        other => panic!("expected execution, got {other:?}"),
    }

    let sibling = h.store.load(tp.id).await.unwrap();
    assert_eq!(sibling.status, OrderStatus::Cancelled);
    assert!(sibling.status_reason.unwrap().contains("filled"));

    // A later tick on the cancelled sibling is a no-op
    assert!(matches!(
        h.tick(tp.id, dec!(125)).await,
        Evaluation::Skipped {
            status: OrderStatus::Cancelled
        }
    ));
    assert_eq!(h.submissions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_oco_triggers_fill_exactly_one() {
    let h = Arc::new(harness(dec!(100)));
    let (stop, tp) = Order::oco_pair(1, "BTC/USD", OrderSide::Sell, dec!(5), dec!(90), dec!(120));
    let mut stop = h.store.insert(stop).await.unwrap();
    let mut tp = h.store.insert(tp).await.unwrap();
    Order::link_pair(&mut stop, &mut tp);
    h.store.save(&stop).await.unwrap();
    h.store.save(&tp).await.unwrap();

    // Both legs cross at once; the pair lock serializes them
    let h_stop = Arc::clone(&h);
    let stop_id = stop.id;
    let stop_task = tokio::spawn(async move { h_stop.tick(stop_id, dec!(85)).await });
    let h_tp = Arc::clone(&h);
    let tp_id = tp.id;
    let tp_task = tokio::spawn(async move { h_tp.tick(tp_id, dec!(125)).await });

    let (a, b) = (stop_task.await.unwrap(), tp_task.await.unwrap());

    let filled = [&a, &b]
        .iter()
        .filter(|e| matches!(e, Evaluation::Executed(_)))
        .count();
    assert_eq!(filled, 1, "exactly one leg may fill, got {a:?} / {b:?}");
    assert_eq!(h.submissions.load(Ordering::SeqCst), 1);

    let statuses = [
        h.store.load(stop.id).await.unwrap().status,
        h.store.load(tp.id).await.unwrap().status,
    ];
    assert!(statuses.contains(&OrderStatus::Filled));
    assert!(statuses.contains(&OrderStatus::Cancelled));
}

#[tokio::test]
async fn replayed_trigger_submits_exactly_once() {
    let h = harness(dec!(100));
    let order = Order::stop_loss(1, "BTC/USD", OrderSide::Sell, dec!(10), dec!(95));
    let order = h.store.insert(order).await.unwrap();
    let snapshot = h.store.load(order.id).await.unwrap();

    let first = match h.tick(order.id, dec!(94)).await {
        Evaluation::Executed(outcome) => outcome,
        other => panic!("expected execution, got {other:?}"),
    };
    assert_eq!(h.submissions.load(Ordering::SeqCst), 1);

    // Simulate a crash after the idempotency record committed but before the
    // caller observed it: the pre-trigger snapshot (same updated_at) comes
    // back and the same tick is evaluated again.
    h.store.save(&snapshot).await.unwrap();
    match h.tick(order.id, dec!(94)).await {
        Evaluation::Replayed(outcome) => {
            assert_eq!(outcome, first);
        }
        other => panic!("expected replay, got {other:?}"),
    }

    // Nothing was resubmitted and the final state is identical
    assert_eq!(h.submissions.load(Ordering::SeqCst), 1);
    let saved = h.store.load(order.id).await.unwrap();
    assert_eq!(saved.status, OrderStatus::Filled);
    assert_eq!(saved.filled_amount, first.filled_amount);
    assert_eq!(saved.average_fill_price, first.average_fill_price);
}

#[tokio::test]
async fn provider_outage_leaves_order_standing() {
    let market = Arc::new(SyntheticMarket::new(dec!(100)));
    let h = Harness::build(
        Arc::clone(&market),
        vec![Arc::new(FailingProvider), Arc::new(FailingProvider)],
        Decimal::ONE,
        ExecutionConfig::default(),
    );
    let order = Order::stop_loss(1, "BTC/USD", OrderSide::Sell, dec!(10), dec!(95));
    let order = h.store.insert(order).await.unwrap();

    match h.tick(order.id, dec!(90)).await {
        Evaluation::Deferred { reason } => assert!(reason.contains("providers")),
        other => panic!("expected deferral, got {other:?}"),
    }

    // Nothing persisted; order is still open and re-evaluated next tick
    let saved = h.store.load(order.id).await.unwrap();
    assert_eq!(saved.status, OrderStatus::Open);
    assert_eq!(h.submissions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn excessive_slippage_withholds_execution() {
    // 10% half-spread: a sell quotes at 90 against a spot of 100
    let market = Arc::new(SyntheticMarket::new(dec!(100)).with_spread(dec!(0.1)));
    let h = Harness::with_market(Arc::clone(&market), Decimal::ONE);
    let order = Order::stop_loss(1, "BTC/USD", OrderSide::Sell, dec!(10), dec!(100));
    let order = h.store.insert(order).await.unwrap();

    match h.tick(order.id, dec!(100)).await {
        Evaluation::Withheld {
            actual_pct,
            limit_pct,
        } => {
            assert_eq!(actual_pct, dec!(10));
            assert_eq!(limit_pct, dec!(5));
        }
        other => panic!("expected withheld execution, got {other:?}"),
    }

    // Triggered with the reason recorded; nothing was submitted
    let saved = h.store.load(order.id).await.unwrap();
    assert_eq!(saved.status, OrderStatus::Triggered);
    assert!(saved.status_reason.unwrap().contains("slippage"));
    assert_eq!(h.submissions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn withheld_order_executes_once_slippage_clears() {
    let market = Arc::new(SyntheticMarket::new(dec!(100)).with_spread(dec!(0.1)));
    let h = Harness::with_market(Arc::clone(&market), Decimal::ONE);
    let order = Order::stop_loss(1, "BTC/USD", OrderSide::Sell, dec!(10), dec!(100));
    let order = h.store.insert(order).await.unwrap();

    assert!(matches!(
        h.tick(order.id, dec!(100)).await,
        Evaluation::Withheld { .. }
    ));

    // Liquidity improves: the spread collapses on a calm market
    let calm = Arc::new(SyntheticMarket::new(dec!(100)));
    let h2 = Harness::with_market(Arc::clone(&calm), Decimal::ONE);
    // Carry the withheld order over to the calm market
    let withheld = h.store.load(order.id).await.unwrap();
    let carried = h2.store.insert(withheld).await.unwrap();

    match h2.tick(carried.id, dec!(100)).await {
        Evaluation::Executed(outcome) => assert_eq!(outcome.status, OrderStatus::Filled),
        other => panic!("expected execution, got {other:?}"),
    }
}

#[tokio::test]
async fn partial_fills_accumulate_across_ticks() {
    let market = Arc::new(SyntheticMarket::new(dec!(100)));
    let h = Harness::with_market(Arc::clone(&market), dec!(0.4));
    let order = Order::stop_loss(1, "BTC/USD", OrderSide::Sell, dec!(10), dec!(95));
    let order = h.store.insert(order).await.unwrap();

    match h.tick(order.id, dec!(94)).await {
        Evaluation::Executed(outcome) => {
            assert_eq!(outcome.status, OrderStatus::PartiallyFilled);
            assert_eq!(outcome.filled_amount, dec!(4.0));
        }
        other => panic!("expected partial execution, got {other:?}"),
    }

    // Next tick resumes the remainder without re-checking the trigger
    match h.tick(order.id, dec!(94)).await {
        Evaluation::Executed(outcome) => {
            assert_eq!(outcome.status, OrderStatus::PartiallyFilled);
            // 4 + 0.4 * 6 = 6.4
            assert_eq!(outcome.filled_amount, dec!(6.4));
        }
        other => panic!("expected partial execution, got {other:?}"),
    }
    assert_eq!(h.submissions.load(Ordering::SeqCst), 2);
}

struct RejectingVenue;

#[async_trait]
impl ExecutionVenue for RejectingVenue {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn is_paper(&self) -> bool {
        true
    }

    async fn submit(&self, _: &SubmitRequest) -> Result<FillReport> {
        Err(ordex::error::OrderError::Rejected("insufficient balance".to_string()).into())
    }
}

#[tokio::test]
async fn exhausted_retries_fail_the_order() {
    let market = Arc::new(SyntheticMarket::new(dec!(100)));
    let execution = ExecutionConfig {
        max_retries: 2,
        ..ExecutionConfig::default()
    };
    let aggregator = Arc::new(PriceAggregator::new(
        vec![market.provider("synthetic")],
        market.spot_source(),
        AggregatorConfig::default(),
    ));
    let store = Arc::new(MemoryOrderStore::new());
    let coordinator = ExecutionCoordinator::new(
        store.clone() as Arc<dyn OrderStore>,
        aggregator,
        Arc::new(IdempotencyGuard::new(ChronoDuration::hours(24))),
        RetryingSubmitter::new(Arc::new(RejectingVenue), &execution),
        Arc::new(TracingAuditSink),
        execution,
    );

    let order = Order::stop_loss(1, "BTC/USD", OrderSide::Sell, dec!(10), dec!(95));
    let order = store.insert(order).await.unwrap();
    market.set_price(dec!(90)).await;
    let tick = PriceTick {
        symbol: "BTC/USD".to_string(),
        price: dec!(90),
        timestamp: Utc::now(),
    };

    match coordinator.evaluate(order.id, &tick).await.unwrap() {
        Evaluation::Failed { reason } => assert!(reason.contains("retries")),
        other => panic!("expected failure, got {other:?}"),
    }

    let saved = store.load(order.id).await.unwrap();
    assert_eq!(saved.status, OrderStatus::Failed);
    // Terminal: a later recovery of the price changes nothing
    assert!(matches!(
        coordinator.evaluate(order.id, &tick).await.unwrap(),
        Evaluation::Skipped {
            status: OrderStatus::Failed
        }
    ));
}

#[tokio::test]
async fn expired_order_never_triggers() {
    let h = harness(dec!(100));
    let mut order = Order::stop_loss(1, "BTC/USD", OrderSide::Sell, dec!(10), dec!(95));
    order.expires_at = Some(Utc::now() - ChronoDuration::seconds(1));
    let order = h.store.insert(order).await.unwrap();

    assert_eq!(h.tick(order.id, dec!(90)).await, Evaluation::Expired);

    let saved = h.store.load(order.id).await.unwrap();
    assert_eq!(saved.status, OrderStatus::Expired);
    assert_eq!(h.submissions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tick_budget_exhaustion_defers_evaluation() {
    let market = Arc::new(SyntheticMarket::new(dec!(100)));
    let execution = ExecutionConfig {
        tick_budget_ms: 50,
        ..ExecutionConfig::default()
    };
    let h = Harness::build(
        Arc::clone(&market),
        vec![Arc::new(SlowProvider {
            market: Arc::clone(&market),
            delay_ms: 500,
        })],
        Decimal::ONE,
        execution,
    );
    let order = Order::stop_loss(1, "BTC/USD", OrderSide::Sell, dec!(10), dec!(95));
    let order = h.store.insert(order).await.unwrap();

    match h.tick(order.id, dec!(90)).await {
        Evaluation::Deferred { reason } => assert!(reason.contains("budget")),
        other => panic!("expected deferral, got {other:?}"),
    }

    let saved = h.store.load(order.id).await.unwrap();
    assert_eq!(saved.status, OrderStatus::Open);
    assert_eq!(h.submissions.load(Ordering::SeqCst), 0);
}
