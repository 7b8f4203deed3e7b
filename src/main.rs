use clap::{Parser, Subcommand};
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ordex::config::AppConfig;
use ordex::domain::{Order, OrderSide, PriceTick};
use ordex::engine::{ExecutionCoordinator, IdempotencyGuard};
use ordex::error::{OrdexError, Result};
use ordex::pricing::{HttpSpotSource, PriceAggregator, SpotPriceSource, SyntheticMarket};
use ordex::services::{TickMonitor, TracingAuditSink};
use ordex::store::{MemoryOrderStore, OrderStore};
use ordex::venue::{PaperVenue, RetryingSubmitter};

#[derive(Parser)]
#[command(name = "ordex")]
#[command(version = "0.1.0")]
#[command(about = "Standing-order execution engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file directory
    #[arg(short, long, default_value = "config")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine against a synthetic paper market
    Run {
        /// Symbol to trade
        #[arg(short, long, default_value = "BTC/USD")]
        symbol: String,
        /// Starting synthetic price
        #[arg(short, long, default_value = "100")]
        price: Decimal,
        /// Tick interval in milliseconds
        #[arg(short, long, default_value = "500")]
        interval_ms: u64,
    },
    /// Load and validate configuration, then print it
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config).map_err(OrdexError::Config)?;
    init_logging(&config);

    if let Err(problems) = config.validate() {
        for problem in &problems {
            warn!(%problem, "invalid configuration");
        }
        return Err(OrdexError::Validation(problems.join("; ")));
    }

    match cli.command {
        Some(Commands::Config) => {
            println!("{config:#?}");
            Ok(())
        }
        Some(Commands::Run {
            symbol,
            price,
            interval_ms,
        }) => run_paper(config, symbol, price, interval_ms).await,
        None => run_paper(config, "BTC/USD".to_string(), dec!(100), 500).await,
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,ordex={}", config.logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Paper demo: seeds a trailing stop and an OCO pair, then drives a random
/// walk through the monitor until every order is terminal or ctrl-c.
async fn run_paper(
    config: AppConfig,
    symbol: String,
    start_price: Decimal,
    interval_ms: u64,
) -> Result<()> {
    let market = Arc::new(SyntheticMarket::new(start_price).with_spread(dec!(0.001)));

    // External spot reference when configured, otherwise the synthetic one
    let spot_source: Arc<dyn SpotPriceSource> = match &config.aggregator.spot_url {
        Some(url) => Arc::new(HttpSpotSource::new(url.clone())?),
        None => market.spot_source(),
    };
    let aggregator = Arc::new(PriceAggregator::new(
        vec![market.provider("synthetic")],
        spot_source,
        config.aggregator.clone(),
    ));
    let store: Arc<dyn OrderStore> = Arc::new(MemoryOrderStore::new());
    let idempotency = Arc::new(IdempotencyGuard::new(chrono::Duration::seconds(
        config.idempotency.ttl_secs as i64,
    )));
    let submitter = RetryingSubmitter::new(Arc::new(PaperVenue::new()), &config.execution);
    let audit = Arc::new(TracingAuditSink);

    let coordinator = Arc::new(ExecutionCoordinator::new(
        Arc::clone(&store),
        aggregator,
        Arc::clone(&idempotency),
        submitter,
        audit,
        config.execution.clone(),
    ));

    seed_demo_orders(&store, &symbol, start_price).await?;

    let monitor = Arc::new(TickMonitor::new(
        coordinator,
        Arc::clone(&store),
        idempotency,
        Duration::from_secs(config.idempotency.sweep_interval_secs),
    ));

    let (tick_tx, tick_rx) = mpsc::channel::<PriceTick>(64);

    let feed_market = Arc::clone(&market);
    let feed_symbol = symbol.clone();
    let feed = tokio::spawn(async move {
        let mut rng_walk = 0i64;
        loop {
            // Random walk with a mild downward drift so stops eventually fire
            let step: i64 = rand::thread_rng().gen_range(-60..=50);
            rng_walk += step;
            let base = feed_market.price().await;
            let next = base + Decimal::new(step, 2);
            let price = if next > Decimal::ZERO {
                feed_market.set_price(next).await;
                next
            } else {
                base
            };
            let tick = PriceTick {
                symbol: feed_symbol.clone(),
                price,
                timestamp: Utc::now(),
            };
            if tick_tx.send(tick).await.is_err() {
                break;
            }
            info!(symbol = %feed_symbol, price = %price, drift = rng_walk, "tick");
            sleep(Duration::from_millis(interval_ms)).await;
        }
    });

    let run_monitor = Arc::clone(&monitor);
    let monitor_task = tokio::spawn(async move { run_monitor.run(tick_rx).await });

    signal::ctrl_c().await.map_err(OrdexError::Io)?;
    info!("shutdown requested");
    monitor.shutdown();
    feed.abort();
    let _ = monitor_task.await;
    Ok(())
}

async fn seed_demo_orders(
    store: &Arc<dyn OrderStore>,
    symbol: &str,
    start_price: Decimal,
) -> Result<()> {
    let trailing = Order::trailing_stop(
        1,
        symbol,
        OrderSide::Sell,
        dec!(1),
        Some(dec!(0.03)),
        None,
    );
    let trailing = store.insert(trailing).await?;
    info!(order_id = trailing.id, "seeded 3% trailing stop");

    let (stop, tp) = Order::oco_pair(
        1,
        symbol,
        OrderSide::Sell,
        dec!(2),
        start_price * dec!(0.95),
        start_price * dec!(1.05),
    );
    let mut stop = store.insert(stop).await?;
    let mut tp = store.insert(tp).await?;
    Order::link_pair(&mut stop, &mut tp);
    store.save(&stop).await?;
    store.save(&tp).await?;
    info!(
        stop_id = stop.id,
        take_profit_id = tp.id,
        "seeded OCO pair at 95% / 105%"
    );

    Ok(())
}
