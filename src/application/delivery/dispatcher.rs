use crate::application::delivery::channel::DeliveryChannel;
use crate::application::delivery::payload::SignalPayload;
use crate::domain::delivery::{DeliveryAttempt, DeliveryOutcome};
use crate::domain::errors::DeliveryError;
use crate::domain::health::{HealthCounters, HealthSnapshot};
use crate::domain::repositories::{DeliveryAttemptRepository, SignalStore};
use crate::domain::trading::{Signal, SignalStatus};
use crate::infrastructure::core::BackoffPolicy;
use crate::infrastructure::observability::Metrics;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Fans out each NEW signal to every configured channel with
/// at-least-once semantics. One worker slot per channel is
/// bounded by a semaphore; excess work simply awaits its turn rather
/// than being rejected.
pub struct DeliveryDispatcher {
    channels: Vec<Arc<dyn DeliveryChannel>>,
    attempts: Arc<dyn DeliveryAttemptRepository>,
    store: Arc<dyn SignalStore>,
    max_attempts: u32,
    backoff: BackoffPolicy,
    permits: HashMap<String, Arc<Semaphore>>,
    health: Arc<HealthCounters>,
    metrics: Option<Arc<Metrics>>,
}

impl DeliveryDispatcher {
    pub fn new(
        channels: Vec<Arc<dyn DeliveryChannel>>,
        attempts: Arc<dyn DeliveryAttemptRepository>,
        store: Arc<dyn SignalStore>,
        max_attempts: u32,
        concurrency_per_channel: usize,
    ) -> Self {
        let permits = channels
            .iter()
            .map(|c| (c.id().to_string(), Arc::new(Semaphore::new(concurrency_per_channel))))
            .collect();
        Self {
            channels,
            attempts,
            store,
            max_attempts,
            backoff: BackoffPolicy::delivery(),
            permits,
            health: Arc::new(HealthCounters::default()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn health(&self) -> HealthSnapshot {
        self.health.snapshot()
    }

    /// Delivers one signal to all channels, concurrently across
    /// channels. Marks the signal DELIVERED once every channel has
    /// either succeeded or permanently failed. Callers (the Scheduler)
    /// are responsible for invoking this in `created_at` order per
    /// (instrument, timeframe) lane.
    pub async fn dispatch(&self, signal: &Signal) {
        let mut handles = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let channel = channel.clone();
            let permit = self
                .permits
                .get(channel.id())
                .expect("semaphore registered at construction for every channel")
                .clone();
            let attempts = self.attempts.clone();
            let backoff = self.backoff;
            let max_attempts = self.max_attempts;
            let health = self.health.clone();
            let metrics = self.metrics.clone();
            let signal = signal.clone();
            handles.push(tokio::spawn(async move {
                deliver_to_channel(channel, signal, attempts, backoff, max_attempts, permit, health, metrics).await
            }));
        }

        let mut all_succeeded = true;
        for handle in handles {
            match handle.await {
                Ok(succeeded) => all_succeeded &= succeeded,
                Err(_) => all_succeeded = false,
            }
        }

        if all_succeeded && !self.channels.is_empty() {
            if let Err(err) = self.store.update_status(signal.id, SignalStatus::Delivered).await {
                warn!(signal_id = %signal.id, error = %err, "failed to mark signal delivered");
            }
        }
    }
}

/// Drives one (signal, channel) pair to a terminal outcome: success,
/// terminal failure, or attempt-cap exhaustion. Returns `true` iff the
/// channel ultimately accepted the signal.
async fn deliver_to_channel(
    channel: Arc<dyn DeliveryChannel>,
    signal: Signal,
    attempts: Arc<dyn DeliveryAttemptRepository>,
    backoff: BackoffPolicy,
    max_attempts: u32,
    permit: Arc<Semaphore>,
    health: Arc<HealthCounters>,
    metrics: Option<Arc<Metrics>>,
) -> bool {
    let payload = SignalPayload::from(&signal);
    let mut attempt = DeliveryAttempt::first(signal.id, channel.id(), Utc::now());

    loop {
        let _permit = permit.acquire().await.expect("semaphore never closed");
        let outcome = channel.post(&payload).await;
        drop(_permit);

        match outcome {
            Ok(resp) if (200..300).contains(&resp.status) => {
                attempt.last_status = Some(resp.status);
                attempt.outcome = DeliveryOutcome::Success;
                record(&attempts, &attempt).await;
                health.record_success();
                if let Some(m) = &metrics {
                    m.inc_delivery_attempt(channel.id(), "success");
                }
                info!(signal_id = %signal.id, channel = channel.id(), attempt = attempt.attempt_number, "delivery succeeded");
                return true;
            }
            Ok(resp) if resp.status == 429 => {
                let delay = resp
                    .retry_after
                    .unwrap_or_else(|| backoff.delay_for_attempt(attempt.attempt_number));
                attempt.last_status = Some(429);
                attempt.next_retry_at = Some(Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default());
                record(&attempts, &attempt).await;
                health.record_transient_fail("rate limited (429)");
                if let Some(m) = &metrics {
                    m.inc_delivery_attempt(channel.id(), "rate_limited");
                }
                if attempt.attempt_number >= max_attempts {
                    return terminal(&attempts, &mut attempt, &health, &metrics, channel.id()).await;
                }
                tokio::time::sleep(delay).await;
                attempt = attempt.next(Utc::now());
            }
            Ok(resp) if (500..600).contains(&resp.status) => {
                attempt.last_status = Some(resp.status);
                health.record_transient_fail(format!("server error {}", resp.status));
                if let Some(m) = &metrics {
                    m.inc_delivery_attempt(channel.id(), "server_error");
                }
                if attempt.attempt_number >= max_attempts {
                    return terminal(&attempts, &mut attempt, &health, &metrics, channel.id()).await;
                }
                let delay = backoff.delay_for_attempt(attempt.attempt_number);
                attempt.next_retry_at = Some(Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default());
                record(&attempts, &attempt).await;
                tokio::time::sleep(delay).await;
                attempt = attempt.next(Utc::now());
            }
            Ok(resp) => {
                attempt.last_status = Some(resp.status);
                health.record_permanent_fail(format!("terminal status {}", resp.status));
                let err = DeliveryError::Terminal { channel: channel.id().to_string(), status: resp.status };
                warn!(signal_id = %signal.id, error = %err, "terminal delivery status");
                return terminal(&attempts, &mut attempt, &health, &metrics, channel.id()).await;
            }
            Err(err) => {
                attempt.last_error = Some(err.0.clone());
                health.record_transient_fail(err.0.clone());
                let delivery_err = DeliveryError::Transient { channel: channel.id().to_string(), reason: err.0 };
                warn!(signal_id = %signal.id, error = %delivery_err, "transport error delivering signal");
                if let Some(m) = &metrics {
                    m.inc_delivery_attempt(channel.id(), "transport_error");
                }
                if attempt.attempt_number >= max_attempts {
                    return terminal(&attempts, &mut attempt, &health, &metrics, channel.id()).await;
                }
                let delay = backoff.delay_for_attempt(attempt.attempt_number);
                attempt.next_retry_at = Some(Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default());
                record(&attempts, &attempt).await;
                tokio::time::sleep(delay).await;
                attempt = attempt.next(Utc::now());
            }
        }
    }
}

async fn terminal(
    attempts: &Arc<dyn DeliveryAttemptRepository>,
    attempt: &mut DeliveryAttempt,
    health: &HealthCounters,
    metrics: &Option<Arc<Metrics>>,
    channel_id: &str,
) -> bool {
    attempt.outcome = DeliveryOutcome::TerminalFailure;
    record(attempts, attempt).await;
    health.record_permanent_fail("delivery attempt cap reached");
    if let Some(m) = metrics {
        m.inc_delivery_attempt(channel_id, "terminal");
    }
    false
}

async fn record(attempts: &Arc<dyn DeliveryAttemptRepository>, attempt: &DeliveryAttempt) {
    if let Err(err) = attempts.record(attempt).await {
        warn!(signal_id = %attempt.signal_id, channel = %attempt.channel_id, error = %err, "failed to record delivery attempt");
    }
}
