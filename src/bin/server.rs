//! FX signal engine server - headless, no UI, no inbound HTTP surface.
//!
//! Polls a broker's candle API on a per-(instrument, timeframe) schedule,
//! evaluates a dual-SMA/ATR crossover strategy, gates candidates through
//! risk management and deduplication, persists accepted signals, and
//! fans them out to configured webhook channels. Every stage records
//! into a shared `Metrics` registry, exposed as `fxsig_`-prefixed
//! Prometheus series alongside structured logs; there is no scrape
//! endpoint bound here, only the registry itself.
//!
//! Exit codes: 0 normal shutdown, 1 configuration error, 2 broker
//! authentication fatally rejected, 3 durable store unreachable.

use anyhow::Result;
use fx_signal_engine::application::dedup::Deduplicator;
use fx_signal_engine::application::delivery::{DeliveryChannel, DeliveryDispatcher};
use fx_signal_engine::application::market_data::MarketDataClient;
use fx_signal_engine::application::risk_management::RiskManager;
use fx_signal_engine::application::scheduler::Orchestrator;
use fx_signal_engine::application::strategies::StrategyRegistry;
use fx_signal_engine::config::Config;
use fx_signal_engine::domain::errors::BrokerError;
use fx_signal_engine::domain::repositories::SignalStore;
use fx_signal_engine::infrastructure::broker::OandaBrokerClient;
use fx_signal_engine::infrastructure::http::WebhookChannel;
use fx_signal_engine::infrastructure::observability::Metrics;
use fx_signal_engine::infrastructure::persistence::repositories::{
    SqliteCandleRepository, SqliteDeliveryAttemptRepository, SqliteRiskStateRepository,
    SqliteSignalStore, SqliteStressEventRepository,
};
use fx_signal_engine::infrastructure::persistence::Database;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("fx-signal-engine {} starting", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "configuration error");
            return ExitCode::from(1);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fatal error");
            match err.downcast_ref::<BrokerError>() {
                Some(BrokerError::Auth { .. }) => ExitCode::from(2),
                _ => ExitCode::from(3),
            }
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let metrics = Arc::new(Metrics::new()?);
    let started_at = std::time::Instant::now();
    let uptime_metrics = metrics.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(15));
        loop {
            ticker.tick().await;
            uptime_metrics.set_uptime(started_at.elapsed().as_secs_f64());
        }
    });

    let database = Database::new(&config.store_connection).await?;

    let candle_repo = Arc::new(SqliteCandleRepository::new(database.clone()));
    let signal_store = Arc::new(SqliteSignalStore::new(database.clone()));
    let risk_state_repo = Arc::new(SqliteRiskStateRepository::new(database.clone()));
    let stress_event_repo = Arc::new(SqliteStressEventRepository::new(database.clone()));
    let attempt_repo = Arc::new(SqliteDeliveryAttemptRepository::new(database.clone()));

    let broker = Arc::new(
        OandaBrokerClient::new(config.broker_base_url.clone(), config.broker_api_key.clone(), config.broker_account_id.clone())
            .with_metrics(metrics.clone()),
    );
    let market_data = Arc::new(MarketDataClient::new(broker));

    // Verify the broker credentials against the first configured lane
    // before committing to startup; an auth rejection here is fatal and
    // distinct from a transient connectivity problem.
    if let (Some(instrument), Some(&timeframe)) =
        (config.instruments.first(), config.timeframes.first())
    {
        if let Err(BrokerError::Auth { reason }) = market_data.poll(instrument, timeframe).await {
            return Err(BrokerError::Auth { reason }.into());
        }
    }

    let risk = Arc::new(
        RiskManager::restore(
            risk_state_repo,
            stress_event_repo,
            config.to_risk_config(),
            config.portfolio_initial_value,
        )
        .await?
        .with_emergency_enabled(config.emergency_enabled)
        .with_metrics(metrics.clone()),
    );

    let dedup = Arc::new(Deduplicator::new(
        config.dedup_capacity,
        chrono::Duration::minutes(config.dedup_ttl_minutes),
    ));

    let registry = Arc::new(StrategyRegistry::new());
    registry.load(config.strategies()?)?;

    let channels: Vec<Arc<dyn DeliveryChannel>> = WebhookChannel::from_urls(&config.webhook_urls)
        .into_iter()
        .map(|c| Arc::new(c) as Arc<dyn DeliveryChannel>)
        .collect();
    if channels.is_empty() {
        warn!("no WEBHOOK_URLS configured; accepted signals will be persisted but never delivered");
    }

    let dispatcher = Arc::new(
        DeliveryDispatcher::new(
            channels,
            attempt_repo,
            signal_store.clone(),
            config.delivery_max_attempts,
            config.delivery_concurrency_per_channel,
        )
        .with_metrics(metrics.clone()),
    );

    // Resume delivery for any signal that was accepted but not yet
    // delivered before a prior crash or restart.
    for signal in signal_store.list_new().await? {
        info!(signal_id = %signal.id, "resuming delivery for signal pending from a previous run");
        dispatcher.dispatch(&signal).await;
    }

    let orchestrator = Arc::new(
        Orchestrator::new(registry, market_data, risk, dedup, signal_store, dispatcher)
            .with_drain_window(std::time::Duration::from_secs(config.drain_window_seconds))
            .with_candle_repository(candle_repo)
            .with_metrics(metrics),
    );

    let handles = orchestrator.spawn_lanes();
    info!(lanes = handles.len(), "signal engine running");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining lanes");
    orchestrator.shutdown(handles).await;

    Ok(())
}
