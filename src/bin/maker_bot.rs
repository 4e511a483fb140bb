use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{error, info, warn};

use perpmaker::{
    init_logging, spawn_feed_task, AppConfig, DecisionLog, Engine, ExchangeApi, FeedContext,
    FillSignal, HttpClient, InventoryManager, OpenThrottle, OrderLifecycle, OrderSide,
    PriceWindow, Reconciler, RestClient, Subscription, TransactionLog, VolatilityGate, WsManager,
};

#[derive(Parser)]
#[command(name = "maker_bot", about = "Single-contract maker-order execution bot")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "maker_bot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample configuration file
    GenerateConfig {
        #[arg(short, long, default_value = "maker_bot.toml")]
        output: PathBuf,
    },
    /// Parse and validate the configuration, then exit
    ValidateConfig,
    /// Run the bot
    Run {
        /// Override trading.contract_id
        #[arg(long)]
        contract_id: Option<String>,
        /// Override trading.quantity
        #[arg(long)]
        quantity: Option<f64>,
        /// Override trading.direction (buy or sell)
        #[arg(long)]
        direction: Option<String>,
        /// Override trading.take_profit
        #[arg(long)]
        take_profit: Option<f64>,
        /// API credential; overrides the config value
        #[arg(long, env = "MAKER_BOT_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// tracing filter override (e.g. "warn,maker_bot::risk=debug")
        #[arg(long)]
        env_filter: Option<String>,
    },
}

fn parse_direction(raw: &str) -> Result<OrderSide, Box<dyn std::error::Error>> {
    match raw.to_ascii_lowercase().as_str() {
        "buy" => Ok(OrderSide::Buy),
        "sell" => Ok(OrderSide::Sell),
        other => Err(format!("invalid direction {other:?}, expected buy or sell").into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::GenerateConfig { output } => {
            if output.exists() {
                return Err(format!("{} already exists", output.display()).into());
            }
            std::fs::write(&output, AppConfig::sample_toml())?;
            println!("wrote sample configuration to {}", output.display());
            Ok(())
        }
        Commands::ValidateConfig => {
            let config = AppConfig::load(&cli.config)?;
            println!(
                "configuration ok: contract {} on {}",
                config.trading.contract_id, config.exchange.base_url
            );
            Ok(())
        }
        Commands::Run {
            contract_id,
            quantity,
            direction,
            take_profit,
            api_key,
            env_filter,
        } => {
            let mut config = AppConfig::load(&cli.config)?;
            if let Some(contract_id) = contract_id {
                config.trading.contract_id = contract_id;
            }
            if let Some(quantity) = quantity {
                config.trading.quantity = quantity;
            }
            if let Some(direction) = direction {
                config.trading.direction = parse_direction(&direction)?;
            }
            if let Some(take_profit) = take_profit {
                config.trading.take_profit = take_profit;
            }
            if let Some(api_key) = api_key {
                config.exchange.api_key = Some(api_key);
            }
            config.validate()?;

            let _guards = init_logging(&config.logging, env_filter.as_deref())?;
            run_bot(config).await
        }
    }
}

async fn run_bot(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let trading = config.trading.clone();
    let contract = config.contract_spec();
    let risk = config.risk.clone();

    info!(
        contract_id = %trading.contract_id,
        direction = %trading.direction,
        quantity = trading.quantity,
        take_profit = trading.take_profit,
        max_orders = trading.max_orders,
        wait_time_secs = trading.wait_time_secs,
        "maker bot starting"
    );

    let http = HttpClient::new(
        reqwest::Client::new(),
        config.exchange.base_url.clone(),
        config.exchange.api_key.clone(),
    );
    if http.is_mainnet() {
        warn!("running against the mainnet venue, orders use real funds");
    }
    let exchange: Arc<dyn ExchangeApi> = Arc::new(RestClient::new(
        http,
        config.exchange.account_id.clone(),
    ));

    let window = Arc::new(PriceWindow::new());
    let fill_signal = Arc::new(FillSignal::new());
    let tx_log = TransactionLog::new(&config.logging.log_dir, &trading.contract_id);
    let decision_log = DecisionLog::new(&config.logging.log_dir, &trading.contract_id);

    let (feed_tx, feed_rx) = unbounded_channel();
    let quote_ws = WsManager::new(
        format!("{}/api/v1/public/ws", config.exchange.ws_url),
        feed_tx.clone(),
    )
    .await?;
    quote_ws
        .subscribe(Subscription::Ticker {
            contract_id: risk.reference_contract_id.clone(),
        })
        .await?;
    let trade_ws = WsManager::new(
        format!(
            "{}/api/v1/private/ws?accountId={}",
            config.exchange.ws_url, config.exchange.account_id
        ),
        feed_tx,
    )
    .await?;
    trade_ws.subscribe(Subscription::OrderUpdates).await?;

    let feed_handle = spawn_feed_task(
        feed_rx,
        FeedContext {
            contract_id: trading.contract_id.clone(),
            reference_contract_id: risk.reference_contract_id.clone(),
            window: Arc::clone(&window),
            fill_signal: Arc::clone(&fill_signal),
            tx_log,
        },
    );

    let lifecycle = OrderLifecycle::new(
        Arc::clone(&exchange),
        Arc::clone(&fill_signal),
        &trading,
        &contract,
    );
    let gate = VolatilityGate::new(
        Arc::clone(&window),
        Arc::clone(&exchange),
        risk.reference_contract_id.clone(),
        risk.max_amplitude,
    );
    let mut engine = Engine::new(
        Arc::clone(&exchange),
        lifecycle,
        InventoryManager::new(trading.quantity, risk.flip_probability),
        OpenThrottle::new(trading.wait_time(), trading.max_orders),
        gate,
        Reconciler::new(
            Arc::clone(&exchange),
            trading.contract_id.clone(),
            risk.reconcile_tolerance_mult * trading.quantity,
        ),
        decision_log,
        trading.contract_id.clone(),
        trading.direction,
        Arc::new(AtomicBool::new(false)),
        StdRng::from_entropy(),
    );

    let shutdown = engine.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, requesting shutdown");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    let result = engine.run().await;

    quote_ws.shutdown().await;
    trade_ws.shutdown().await;
    feed_handle.abort();

    if let Err(e) = &result {
        error!(error = %e, "engine exited with error");
    }
    result.map_err(Into::into)
}
