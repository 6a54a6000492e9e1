//! Two strategies identical in parameters both fire on the same bar for
//! the same instrument: the first persists as NEW, the second is
//! suppressed as a duplicate but still durably recorded.

use async_trait::async_trait;
use fx_signal_engine::application::dedup::Deduplicator;
use fx_signal_engine::application::delivery::channel::{DeliveryChannel, DeliveryResponse, TransportError};
use fx_signal_engine::application::delivery::payload::SignalPayload;
use fx_signal_engine::application::delivery::DeliveryDispatcher;
use fx_signal_engine::application::market_data::{BrokerClient, MarketDataClient};
use fx_signal_engine::application::risk_management::RiskManager;
use fx_signal_engine::application::scheduler::Orchestrator;
use fx_signal_engine::application::strategies::StrategyRegistry;
use fx_signal_engine::domain::delivery::DeliveryAttempt;
use fx_signal_engine::domain::errors::BrokerError;
use fx_signal_engine::domain::health::{HealthCounters, HealthSnapshot};
use fx_signal_engine::domain::market::{Candle, Timeframe};
use fx_signal_engine::domain::repositories::{AppendOutcome, DeliveryAttemptRepository, SignalStore};
use fx_signal_engine::domain::risk::RiskConfig;
use fx_signal_engine::domain::trading::{Signal, SignalStatus, StrategyConfig};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex as StdMutex};

struct FixedBroker {
    candles: Vec<Candle>,
}

#[async_trait]
impl BrokerClient for FixedBroker {
    async fn latest_candles(&self, _instrument: &str, _timeframe: Timeframe, _count: usize) -> Result<Vec<Candle>, BrokerError> {
        Ok(self.candles.clone())
    }

    async fn backfill(&self, _instrument: &str, _timeframe: Timeframe, _from: i64, _to: i64) -> Result<Vec<Candle>, BrokerError> {
        Ok(vec![])
    }

    fn health(&self) -> HealthSnapshot {
        HealthCounters::default().snapshot()
    }
}

struct AcceptingChannel;

#[async_trait]
impl DeliveryChannel for AcceptingChannel {
    fn id(&self) -> &str {
        "webhook-1"
    }

    async fn post(&self, _payload: &SignalPayload) -> Result<DeliveryResponse, TransportError> {
        Ok(DeliveryResponse { status: 200, retry_after: None })
    }
}

#[derive(Default)]
struct NoopAttemptRepo;

#[async_trait]
impl DeliveryAttemptRepository for NoopAttemptRepo {
    async fn record(&self, _attempt: &DeliveryAttempt) -> anyhow::Result<()> {
        Ok(())
    }

    async fn for_signal(&self, _signal_id: uuid::Uuid) -> anyhow::Result<Vec<DeliveryAttempt>> {
        Ok(vec![])
    }
}

#[derive(Default)]
struct CapturingStore {
    signals: StdMutex<Vec<Signal>>,
}

#[async_trait]
impl SignalStore for CapturingStore {
    async fn append(&self, signal: &Signal) -> anyhow::Result<AppendOutcome> {
        self.signals.lock().unwrap().push(signal.clone());
        Ok(AppendOutcome::Inserted)
    }

    async fn list(&self, _since: chrono::DateTime<chrono::Utc>, _limit: usize) -> anyhow::Result<Vec<Signal>> {
        Ok(self.signals.lock().unwrap().clone())
    }

    async fn list_new(&self) -> anyhow::Result<Vec<Signal>> {
        Ok(self
            .signals
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.status == SignalStatus::New)
            .cloned()
            .collect())
    }

    async fn update_status(&self, signal_id: uuid::Uuid, status: SignalStatus) -> anyhow::Result<()> {
        if let Some(s) = self.signals.lock().unwrap().iter_mut().find(|s| s.id == signal_id) {
            s.status = status;
        }
        Ok(())
    }

    async fn latest_bar_open_time(&self, _strategy_id: &str) -> anyhow::Result<Option<chrono::DateTime<chrono::Utc>>> {
        Ok(None)
    }
}

fn candle(close: f64, open_time: i64) -> Candle {
    let close = Decimal::try_from(close).unwrap();
    Candle::new(
        "EUR_USD",
        Timeframe::H4,
        open_time,
        close - dec!(0.0002),
        close + dec!(0.0005),
        close - dec!(0.0005),
        close,
        dec!(1000),
        true,
    )
    .unwrap()
}

fn identical_strategy() -> StrategyConfig {
    StrategyConfig {
        id: "dual_sma_3_5".into(),
        instrument: "EUR_USD".into(),
        timeframe: Timeframe::H4,
        fast_period: 3,
        slow_period: 5,
        atr_period: 5,
        sl_atr_mult: dec!(1.5),
        tp_atr_mult: dec!(3.0),
        min_atr: dec!(0.00001),
        min_rr: dec!(1.5),
    }
}

/// `StrategyRegistry::active_for` returns every matching config for a
/// lane, including duplicates left behind by a misconfigured source —
/// the registry itself doesn't dedup by id, only the Deduplicator catches
/// the resulting identical fingerprints downstream.
#[tokio::test]
async fn second_identical_strategy_is_suppressed_not_rejected() {
    let registry = Arc::new(StrategyRegistry::new());
    registry.load(vec![identical_strategy(), identical_strategy()]).unwrap();

    let closes = [1.0800, 1.0795, 1.0790, 1.0795, 1.0800, 1.0830];
    let candles: Vec<Candle> = closes
        .iter()
        .enumerate()
        .map(|(i, c)| candle(*c, i as i64 * 14_400))
        .collect();
    let broker = Arc::new(FixedBroker { candles });
    let market_data = Arc::new(MarketDataClient::new(broker));

    let risk = Arc::new(RiskManager::new(dec!(10000), RiskConfig::default()));
    let dedup = Arc::new(Deduplicator::new(100, chrono::Duration::hours(8)));
    let store = Arc::new(CapturingStore::default());
    let dispatcher = Arc::new(DeliveryDispatcher::new(
        vec![Arc::new(AcceptingChannel)],
        Arc::new(NoopAttemptRepo),
        store.clone(),
        8,
        4,
    ));

    let orchestrator = Orchestrator::new(registry, market_data, risk, dedup, store.clone(), dispatcher);
    orchestrator.tick_lane("EUR_USD", Timeframe::H4).await.unwrap();

    let signals = store.signals.lock().unwrap().clone();
    assert_eq!(signals.len(), 2, "both strategies' candidates must be durably recorded");

    let statuses: Vec<_> = signals.iter().map(|s| s.status).collect();
    assert_eq!(statuses.iter().filter(|&&s| s == SignalStatus::Delivered).count(), 1);
    assert_eq!(statuses.iter().filter(|&&s| s == SignalStatus::Suppressed).count(), 1);

    // Both candidates share the same bar/instrument fingerprint despite
    // carrying different strategy ids.
    assert_eq!(signals[0].fingerprint, signals[1].fingerprint);
}
