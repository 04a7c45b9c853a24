//! Session Trader CLI
//!
//! Command-line interface for running trading iterations over delegated sessions.

use clap::{Parser, Subcommand};
use serde_json::json;
use session_trader::chain::AlloyChainClient;
use session_trader::decision::{
    DecisionEngine, DecisionRequest, DecisionSource, FallbackDecisionSource,
    HeuristicDecisionSource, RemoteDecisionSource,
};
use session_trader::market_data::{HttpMarketDataClient, MarketDataSource};
use session_trader::strategy::pair_for;
use session_trader::types::{StrategyType, TradingPair};
use session_trader::wallet::DerivedKeyStore;
use session_trader::{
    ActivityLogger, Config, Error, MemoryStore, Result, TradeExecutor, TradingEngine,
    TradingStore, MASTER_KEY_ENV,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "session-trader")]
#[command(about = "Automated trading iterations for delegated sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one trading iteration for a session
    Run {
        #[arg(short, long)]
        session: Uuid,

        /// Quote and check profitability, but don't sign or submit
        #[arg(long)]
        dry_run: bool,
    },

    /// Run iterations for every active session on an interval
    Watch {
        #[arg(long)]
        dry_run: bool,

        /// Override check_interval_ms from the config
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Fetch market data and print the decision for a pair (no trading)
    Analyze {
        /// Pair as TOKEN_A/TOKEN_B; defaults to the strategy type's pair
        #[arg(short, long)]
        pair: Option<String>,

        /// MEMECOIN, ARBITRAGE or LIMIT_ORDER
        #[arg(short = 't', long, default_value = "ARBITRAGE")]
        strategy_type: String,

        /// Budget the suggested amount is sized against
        #[arg(short, long, default_value = "100")]
        budget: rust_decimal::Decimal,
    },

    /// Print the delegated wallet address for a session
    DeriveWallet {
        #[arg(short, long)]
        session: Uuid,
    },

    /// Show trades and activity for a session
    History {
        #[arg(short, long)]
        session: Uuid,

        /// Only the last N activity entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Record an operator note as a manual intervention
    Annotate {
        #[arg(short, long)]
        session: Uuid,

        #[arg(short, long)]
        message: String,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Run { session, dry_run } => run_once(config, session, dry_run).await?,
        Commands::Watch {
            dry_run,
            interval_ms,
        } => watch(config, dry_run, interval_ms).await?,
        Commands::Analyze {
            pair,
            strategy_type,
            budget,
        } => analyze(config, pair, strategy_type, budget).await?,
        Commands::DeriveWallet { session } => {
            let keys = DerivedKeyStore::from_env(MASTER_KEY_ENV)?;
            println!("{}", keys.derive_wallet_address(session)?);
        }
        Commands::History { session, limit } => history(config, session, limit).await?,
        Commands::Annotate { session, message } => {
            let store = open_store(&config).await?;
            let activity = activity_logger(&config, store);
            activity
                .log_manual(session, json!({ "message": message }))
                .await?;
            println!("Recorded manual intervention for {}", session);
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<MemoryStore>> {
    let store = match &config.store_path {
        Some(path) => MemoryStore::load_or_create(path).await?,
        None => MemoryStore::new(),
    };
    Ok(Arc::new(store))
}

fn activity_logger(config: &Config, store: Arc<MemoryStore>) -> ActivityLogger {
    let logger = ActivityLogger::new(store);
    match &config.audit_log_path {
        Some(path) => logger.with_audit_file(path),
        None => logger,
    }
}

fn decision_source(config: &Config) -> Result<Arc<dyn DecisionSource>> {
    let heuristic: Arc<dyn DecisionSource> = Arc::new(HeuristicDecisionSource);
    match &config.decision.analysis_endpoint {
        Some(endpoint) => {
            let remote = RemoteDecisionSource::new(
                endpoint.clone(),
                Duration::from_millis(config.decision.timeout_ms),
            )?;
            Ok(Arc::new(FallbackDecisionSource::new(Arc::new(remote), heuristic)))
        }
        None => {
            tracing::info!("No analysis endpoint configured, using the local heuristic");
            Ok(heuristic)
        }
    }
}

/// Key material is only needed when trades are actually signed
struct NoKeys;

#[async_trait::async_trait]
impl session_trader::wallet::KeyStore for NoKeys {
    async fn private_key(&self, _session_id: Uuid) -> Result<Option<secrecy::SecretString>> {
        Ok(None)
    }
}

async fn build_engine(config: &Config, dry_run: bool) -> Result<TradingEngine> {
    let store = open_store(config).await?;
    let activity = activity_logger(config, store.clone());

    let rpc_url = config.rpc_url()?;
    let chain = Arc::new(AlloyChainClient::new(
        &rpc_url,
        config.chain.confirmation_timeout(),
    )?);

    let keys: Arc<dyn session_trader::wallet::KeyStore> = if dry_run {
        Arc::new(NoKeys)
    } else {
        Arc::new(DerivedKeyStore::from_env(MASTER_KEY_ENV)?)
    };

    let executor = TradeExecutor::new(chain, keys, store.clone(), activity.clone(), config)
        .with_dry_run(dry_run);
    let market = Arc::new(HttpMarketDataClient::new(&config.market_data)?);
    let decisions = DecisionEngine::new(decision_source(config)?, config.decision.dust_floor);

    tracing::info!(
        chain_id = config.chain.chain_id,
        router = ?config.chain.router_address,
        dry_run,
        "Trading engine ready"
    );

    Ok(TradingEngine::new(
        store, activity, market, decisions, executor, config,
    ))
}

async fn run_once(config: Config, session: Uuid, dry_run: bool) -> Result<()> {
    let engine = build_engine(&config, dry_run).await?;
    let completed = engine.run_iteration(session).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "sessionId": session, "completed": completed }))?
    );
    Ok(())
}

async fn watch(config: Config, dry_run: bool, interval_ms: Option<u64>) -> Result<()> {
    let engine = build_engine(&config, dry_run).await?;
    let period = Duration::from_millis(interval_ms.unwrap_or(config.check_interval_ms));

    tracing::info!(interval_ms = period.as_millis() as u64, "Watching active sessions");

    let ticks = engine
        .watch(period, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await;
    tracing::info!(ticks, "Shutting down");
    Ok(())
}

async fn analyze(
    config: Config,
    pair: Option<String>,
    strategy_type: String,
    budget: rust_decimal::Decimal,
) -> Result<()> {
    let strategy_type: StrategyType =
        serde_json::from_value(json!(strategy_type.to_uppercase())).map_err(|_| {
            Error::InvalidArgument(format!("Unknown strategy type: {}", strategy_type))
        })?;
    let pair: TradingPair = match pair {
        Some(p) => p.parse()?,
        None => pair_for(strategy_type),
    };

    let market = HttpMarketDataClient::new(&config.market_data)?;
    let snapshot = market.fetch(&pair).await?;

    let decisions = DecisionEngine::new(decision_source(&config)?, config.decision.dust_floor);
    let request = DecisionRequest::new(&snapshot, pair, strategy_type, budget);
    let decision = decisions.decide(&request).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "pair": request.pair.to_string(),
            "market": snapshot,
            "decision": decision,
            "actionable": decision.action.direction().is_some()
                && decision.confidence >= config.decision.min_confidence,
        }))?
    );
    Ok(())
}

async fn history(config: Config, session: Uuid, limit: Option<usize>) -> Result<()> {
    let store = open_store(&config).await?;
    if store.session(session).await?.is_none() {
        return Err(Error::SessionNotFound(session));
    }

    let trades = store.trades_for_session(session).await?;
    let mut activity = store.activity_for_session(session).await?;
    if let Some(n) = limit {
        let skip = activity.len().saturating_sub(n);
        activity.drain(..skip);
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "trades": trades, "activity": activity }))?
    );
    Ok(())
}
