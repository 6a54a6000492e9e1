//! HTTP implementation of `BrokerClient` against an OANDA-shaped candle
//! API: bearer-token auth, JSON array of candle objects with timestamp,
//! OHLC, volume, and a completeness flag.

use crate::application::market_data::BrokerClient;
use crate::domain::errors::BrokerError;
use crate::domain::health::{HealthCounters, HealthSnapshot};
use crate::domain::market::{Candle, Timeframe};
use crate::infrastructure::core::{BackoffPolicy, CircuitBreaker};
use crate::infrastructure::observability::Metrics;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, warn};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_FETCH_ATTEMPTS: u32 = 5;

#[derive(Debug, Deserialize)]
struct WireOhlc {
    o: Decimal,
    h: Decimal,
    l: Decimal,
    c: Decimal,
}

#[derive(Debug, Deserialize)]
struct WireCandle {
    time: String,
    complete: bool,
    volume: Decimal,
    mid: WireOhlc,
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    candles: Vec<WireCandle>,
}

enum Query<'a> {
    Count(&'a str, Timeframe, usize),
    Range(&'a str, Timeframe, i64, i64),
}

pub struct OandaBrokerClient {
    client: Client,
    base_url: String,
    api_key: String,
    account_id: String,
    circuit: CircuitBreaker,
    backoff: BackoffPolicy,
    health: HealthCounters,
    metrics: Option<Arc<Metrics>>,
}

impl OandaBrokerClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, account_id: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            account_id: account_id.into(),
            circuit: CircuitBreaker::new("oanda_broker", 5, 2, Duration::from_secs(30)),
            backoff: BackoffPolicy::broker(),
            health: HealthCounters::default(),
            metrics: None,
        }
    }

    /// Also wires the circuit breaker's open/closed transitions into
    /// `fxsig_circuit_breaker_status`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.circuit = self.circuit.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    async fn fetch(&self, query: Query<'_>) -> Result<Vec<Candle>, BrokerError> {
        for attempt in 0.. {
            match self.circuit.call(self.request_once(&query)).await {
                Ok(candles) => {
                    self.health.record_success();
                    return Ok(candles);
                }
                Err(BrokerError::Auth { reason }) => {
                    self.health.record_permanent_fail(reason.clone());
                    return Err(BrokerError::Auth { reason });
                }
                Err(BrokerError::DataUnavailable { instrument, timeframe, from, to }) => {
                    self.health.record_permanent_fail("data unavailable for requested range");
                    return Err(BrokerError::DataUnavailable { instrument, timeframe, from, to });
                }
                Err(BrokerError::Transient { reason }) => {
                    self.health.record_transient_fail(reason.clone());
                    if attempt + 1 >= MAX_FETCH_ATTEMPTS {
                        return Err(BrokerError::Transient { reason });
                    }
                    warn!(attempt, reason = %reason, "retrying broker fetch");
                    tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                }
            }
        }
        unreachable!("loop returns before running out of u32 attempts")
    }

    async fn request_once(&self, query: &Query<'_>) -> Result<Vec<Candle>, BrokerError> {
        let (instrument, timeframe, url, params) = match query {
            Query::Count(instrument, timeframe, count) => (
                *instrument,
                *timeframe,
                format!("{}/v3/accounts/{}/instruments/{}/candles", self.base_url, self.account_id, instrument),
                vec![
                    ("granularity".to_string(), oanda_granularity(*timeframe).to_string()),
                    ("count".to_string(), count.to_string()),
                    ("price".to_string(), "M".to_string()),
                ],
            ),
            Query::Range(instrument, timeframe, from, to) => (
                *instrument,
                *timeframe,
                format!("{}/v3/accounts/{}/instruments/{}/candles", self.base_url, self.account_id, instrument),
                vec![
                    ("granularity".to_string(), oanda_granularity(*timeframe).to_string()),
                    ("from".to_string(), from.to_string()),
                    ("to".to_string(), to.to_string()),
                    ("price".to_string(), "M".to_string()),
                ],
            ),
        };

        let started = Instant::now();
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&params)
            .send()
            .await
            .map_err(|e| BrokerError::Transient { reason: e.to_string() })?;
        if let Some(metrics) = &self.metrics {
            metrics.observe_api_latency("oanda", "candles", started.elapsed().as_secs_f64());
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BrokerError::Auth { reason: format!("broker rejected credentials: {status}") });
        }
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            let (from, to) = match query {
                Query::Range(_, _, from, to) => (from.to_string(), to.to_string()),
                Query::Count(..) => (String::new(), String::new()),
            };
            return Err(BrokerError::DataUnavailable {
                instrument: instrument.to_string(),
                timeframe: timeframe.to_string(),
                from,
                to,
            });
        }
        if !status.is_success() {
            return Err(BrokerError::Transient { reason: format!("broker returned status {status}") });
        }

        let body: CandleResponse =
            response.json().await.map_err(|e| BrokerError::Transient { reason: format!("malformed response: {e}") })?;

        let mut candles = Vec::with_capacity(body.candles.len());
        for wire in body.candles {
            if !wire.complete {
                continue;
            }
            let open_time = match chrono::DateTime::parse_from_rfc3339(&wire.time) {
                Ok(dt) => dt.timestamp(),
                Err(e) => {
                    warn!(time = %wire.time, error = %e, "dropping candle with unparseable timestamp");
                    continue;
                }
            };
            match Candle::new(
                instrument,
                timeframe,
                open_time,
                wire.mid.o,
                wire.mid.h,
                wire.mid.l,
                wire.mid.c,
                wire.volume,
                wire.complete,
            ) {
                Ok(candle) => candles.push(candle),
                Err(e) => error!(instrument, %e, "dropping candle with invalid OHLC invariant"),
            }
        }

        Ok(candles)
    }
}

#[async_trait]
impl BrokerClient for OandaBrokerClient {
    async fn latest_candles(&self, instrument: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Candle>, BrokerError> {
        self.fetch(Query::Count(instrument, timeframe, count)).await
    }

    async fn backfill(&self, instrument: &str, timeframe: Timeframe, from: i64, to: i64) -> Result<Vec<Candle>, BrokerError> {
        self.fetch(Query::Range(instrument, timeframe, from, to)).await
    }

    fn health(&self) -> HealthSnapshot {
        self.health.snapshot()
    }
}

fn oanda_granularity(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::M5 => "M5",
        Timeframe::M15 => "M15",
        Timeframe::H1 => "H1",
        Timeframe::H4 => "H4",
        Timeframe::D => "D",
        Timeframe::W => "W",
    }
}
