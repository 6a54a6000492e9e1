use crate::application::dedup::Deduplicator;
use crate::application::delivery::DeliveryDispatcher;
use crate::application::indicators::{true_range, IndicatorCache};
use crate::application::market_data::MarketDataClient;
use crate::application::scheduler::status::{LaneStatus, StatusSnapshot};
use crate::application::risk_management::RiskManager;
use crate::application::strategies::{crossover, StrategyRegistry};
use crate::domain::health::HealthCounters;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::repositories::{AppendOutcome, CandleRepository, SignalStore};
use crate::domain::trading::{Signal, SignalStatus, StrategyConfig};
use crate::infrastructure::observability::Metrics;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

type LaneKey = (String, Timeframe);

struct LaneState {
    last_tick_at: Option<chrono::DateTime<chrono::Utc>>,
    candles_ingested: u64,
    prev_close: Option<Decimal>,
    configured: bool,
}

impl Default for LaneState {
    fn default() -> Self {
        Self {
            last_tick_at: None,
            candles_ingested: 0,
            prev_close: None,
            configured: false,
        }
    }
}

/// Drives the periodic per-lane tick loop and composes every other
/// component into the pipeline: MarketDataClient ->
/// IndicatorCache -> SignalEvaluator -> RiskManager -> Deduplicator ->
/// SignalStore -> DeliveryDispatcher. Each (instrument, timeframe) lane
/// is single-flight: one `tokio::sync::Mutex` held for the duration of
/// a tick serializes work within the lane while lanes run concurrently.
pub struct Orchestrator {
    registry: Arc<StrategyRegistry>,
    market_data: Arc<MarketDataClient>,
    indicators: Mutex<IndicatorCache>,
    risk: Arc<RiskManager>,
    dedup: Arc<Deduplicator>,
    store: Arc<dyn SignalStore>,
    dispatcher: Arc<DeliveryDispatcher>,
    candles: Option<Arc<dyn CandleRepository>>,
    metrics: Option<Arc<Metrics>>,
    lanes: Mutex<HashMap<LaneKey, Arc<Mutex<LaneState>>>>,
    shutdown: Notify,
    drain_window: Duration,
    scheduler_health: HealthCounters,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        market_data: Arc<MarketDataClient>,
        risk: Arc<RiskManager>,
        dedup: Arc<Deduplicator>,
        store: Arc<dyn SignalStore>,
        dispatcher: Arc<DeliveryDispatcher>,
    ) -> Self {
        Self {
            registry,
            market_data,
            indicators: Mutex::new(IndicatorCache::new()),
            risk,
            dedup,
            store,
            dispatcher,
            candles: None,
            metrics: None,
            lanes: Mutex::new(HashMap::new()),
            shutdown: Notify::new(),
            drain_window: Duration::from_secs(30),
            scheduler_health: HealthCounters::default(),
        }
    }

    pub fn with_drain_window(mut self, drain_window: Duration) -> Self {
        self.drain_window = drain_window;
        self
    }

    /// Enables the durable candle audit log used to warm-restart
    /// indicator state after a restart.
    pub fn with_candle_repository(mut self, candles: Arc<dyn CandleRepository>) -> Self {
        self.candles = Some(candles);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawns one polling task per (instrument, timeframe) lane active in
    /// the registry and returns their join handles. Each task ticks at
    /// the timeframe's recommended poll interval until `shutdown` fires.
    pub fn spawn_lanes(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        self.registry
            .lanes()
            .into_iter()
            .map(|(instrument, timeframe)| {
                let orchestrator = self.clone();
                tokio::spawn(async move { orchestrator.run_lane(instrument, timeframe).await })
            })
            .collect()
    }

    async fn run_lane(self: Arc<Self>, instrument: String, timeframe: Timeframe) {
        let interval = Duration::from_secs(timeframe.poll_interval_seconds());
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(err) = self.tick_lane(&instrument, timeframe).await {
                        self.scheduler_health.record_transient_fail(err.to_string());
                        warn!(instrument, %timeframe, error = %err, "lane tick failed");
                    }
                }
                _ = self.shutdown.notified() => {
                    info!(instrument, %timeframe, "lane shutting down");
                    return;
                }
            }
        }
    }

    async fn lane_state(&self, key: &LaneKey) -> Arc<Mutex<LaneState>> {
        self.lanes
            .lock()
            .await
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(LaneState::default())))
            .clone()
    }

    /// Runs one evaluation cycle for a single lane: fetch, index,
    /// evaluate, gate, dedup, persist, deliver. Serialized per lane by
    /// the lane's own mutex; concurrent across lanes.
    pub async fn tick_lane(&self, instrument: &str, timeframe: Timeframe) -> anyhow::Result<()> {
        let key = (instrument.to_string(), timeframe);
        let lane = self.lane_state(&key).await;
        let mut lane = lane.lock().await;

        let strategies = self.registry.active_for(instrument, timeframe);
        if strategies.is_empty() {
            return Ok(());
        }

        if !lane.configured {
            let primary = &strategies[0];
            self.indicators.lock().await.configure(
                instrument,
                timeframe,
                primary.fast_period,
                primary.slow_period,
                primary.atr_period,
            );
            lane.configured = true;
        }

        let new_candles = self.market_data.poll(instrument, timeframe).await?;
        for candle in new_candles {
            self.process_candle(&mut lane, candle, &strategies).await;
        }

        lane.last_tick_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn process_candle(&self, lane: &mut LaneState, candle: Candle, strategies: &[StrategyConfig]) {
        let now = chrono::Utc::now();
        let tr = true_range(&candle, lane.prev_close);
        lane.prev_close = Some(candle.close);
        lane.candles_ingested += 1;

        if let Some(metrics) = &self.metrics {
            metrics.inc_candles(&candle.instrument, &candle.timeframe.to_string(), 1);
        }

        if let Some(repo) = &self.candles {
            if let Err(err) = repo.append(&candle).await {
                warn!(instrument = %candle.instrument, error = %err, "failed to persist candle");
            }
        }

        if let Some(event) = self
            .risk
            .monitor_stress(&candle.instrument, candle.timeframe, tr, now)
            .await
        {
            info!(instrument = %candle.instrument, severity = event.severity, "stress event observed");
        }

        let state = {
            let mut indicators = self.indicators.lock().await;
            indicators.on_candle(candle)
        };
        let Some(state) = state else { return };

        for strategy in strategies {
            if let Some(signal) = crossover::evaluate(strategy, &state, now) {
                self.handle_candidate(signal, strategy.min_atr).await;
            }
        }
    }

    /// Gates a candidate through RiskManager, then the Deduplicator, then
    /// durable append, then (for non-suppressed signals) delivery.
    async fn handle_candidate(&self, mut signal: Signal, min_atr: Decimal) {
        let now = chrono::Utc::now();
        let outcome = self.risk.validate(&signal, min_atr, now).await;
        if let crate::domain::risk::ValidationOutcome::Reject { reason } = &outcome {
            info!(strategy = %signal.strategy_id, instrument = %signal.instrument, "candidate rejected by risk manager");
            if let Some(metrics) = &self.metrics {
                metrics.inc_signal_rejected(reason);
            }
            return;
        }

        signal.position_size_multiplier = outcome.size_multiplier();
        signal.emergency_level_at_signal = self.risk.current_level().await.value();
        signal.status = if self.dedup.accept(signal.fingerprint, now) {
            SignalStatus::New
        } else {
            SignalStatus::Suppressed
        };

        if let Some(metrics) = &self.metrics {
            if signal.status == SignalStatus::New {
                metrics.inc_signal_emitted(&signal.strategy_id, &signal.direction.to_string());
            } else {
                metrics.inc_signal_suppressed("duplicate_fingerprint");
            }
        }

        match self.store.append(&signal).await {
            Ok(AppendOutcome::Inserted) => {
                if signal.status == SignalStatus::New {
                    self.dispatcher.dispatch(&signal).await;
                }
            }
            Ok(AppendOutcome::AlreadyExists) => {
                // Idempotent append on replay; nothing further to do.
            }
            Err(err) => {
                error!(signal_id = %signal.id, error = %err, "failed to persist signal");
            }
        }
    }

    pub async fn status(&self) -> StatusSnapshot {
        let lanes = self.lanes.lock().await;
        let mut out = Vec::with_capacity(lanes.len());
        for ((instrument, timeframe), state) in lanes.iter() {
            let state = state.lock().await;
            out.push(LaneStatus {
                instrument: instrument.clone(),
                timeframe: *timeframe,
                last_tick_at: state.last_tick_at,
                candles_ingested: state.candles_ingested,
            });
        }
        StatusSnapshot {
            lanes: out,
            emergency_level: self.risk.current_level().await.value(),
            market_data_health: self.market_data.health(),
            risk_health: self.risk.health(),
            delivery_health: self.dispatcher.health(),
        }
    }

    /// Signals every lane to stop accepting new ticks and waits up to
    /// `drain_window` for in-flight work to finish.
    pub async fn shutdown(&self, handles: Vec<JoinHandle<()>>) {
        self.shutdown.notify_waiters();
        let drain = tokio::time::timeout(self.drain_window, futures_util::future::join_all(handles)).await;
        if drain.is_err() {
            warn!(seconds = self.drain_window.as_secs(), "drain window elapsed before all lanes stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::delivery::channel::{DeliveryChannel, DeliveryResponse, TransportError};
    use crate::application::delivery::payload::SignalPayload;
    use crate::application::market_data::BrokerClient;
    use crate::domain::delivery::DeliveryAttempt;
    use crate::domain::errors::BrokerError;
    use crate::domain::health::HealthCounters as MarketHealthCounters;
    use crate::domain::repositories::DeliveryAttemptRepository;
    use crate::domain::risk::RiskConfig;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex as StdMutex;

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

    struct OneShotBroker {
        candles: Vec<Candle>,
    }

    #[async_trait]
    impl BrokerClient for OneShotBroker {
        async fn latest_candles(&self, _instrument: &str, _timeframe: Timeframe, _count: usize) -> Result<Vec<Candle>, BrokerError> {
            Ok(self.candles.clone())
        }

        async fn backfill(&self, _instrument: &str, _timeframe: Timeframe, _from: i64, _to: i64) -> Result<Vec<Candle>, BrokerError> {
            Ok(vec![])
        }

        fn health(&self) -> crate::domain::health::HealthSnapshot {
            MarketHealthCounters::default().snapshot()
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
            Ok(self.signals.lock().unwrap().iter().filter(|s| s.status == SignalStatus::New).cloned().collect())
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

    fn config() -> StrategyConfig {
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

    #[tokio::test]
    async fn full_pipeline_persists_and_delivers_a_crossover_signal() {
        let registry = Arc::new(StrategyRegistry::new());
        registry.load(vec![config()]).unwrap();

        let closes = [1.0800, 1.0795, 1.0790, 1.0795, 1.0800, 1.0830];
        let candles: Vec<Candle> = closes.iter().enumerate().map(|(i, c)| candle(*c, i as i64 * 14_400)).collect();
        let broker = Arc::new(OneShotBroker { candles });
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
        assert_eq!(signals.len(), 1, "expected exactly one persisted signal");
        let signal = &signals[0];
        assert_eq!(signal.direction, crate::domain::trading::Direction::Long);
        assert_eq!(signal.entry_price, dec!(1.0830));
        assert_eq!(signal.status, SignalStatus::Delivered);
    }

    #[tokio::test]
    async fn level_four_emergency_blocks_persistence() {
        let registry = Arc::new(StrategyRegistry::new());
        registry.load(vec![config()]).unwrap();

        let closes = [1.0800, 1.0795, 1.0790, 1.0795, 1.0800, 1.0830];
        let candles: Vec<Candle> = closes.iter().enumerate().map(|(i, c)| candle(*c, i as i64 * 14_400)).collect();
        let broker = Arc::new(OneShotBroker { candles });
        let market_data = Arc::new(MarketDataClient::new(broker));

        let risk = Arc::new(RiskManager::new(dec!(10000), RiskConfig::default()));
        risk.update_portfolio(dec!(7000), chrono::Utc::now()).await; // drawdown 0.30 -> level 4
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

        assert!(store.signals.lock().unwrap().is_empty(), "emergency stop must veto the candidate before persistence");
    }
}
