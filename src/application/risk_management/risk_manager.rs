use crate::domain::errors::RiskError;
use crate::domain::health::HealthCounters;
use crate::domain::market::Timeframe;
use crate::domain::repositories::{RiskStateRepository, StressEventRepository};
use crate::domain::risk::{EmergencyLevel, RiskConfig, RiskState, StressEvent, StressKind, ValidationOutcome, VolatilityManager};
use crate::domain::trading::{PortfolioState, Signal};
use crate::infrastructure::observability::Metrics;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

struct LevelState {
    portfolio: PortfolioState,
    level: EmergencyLevel,
    level_below_threshold_since: Option<DateTime<Utc>>,
}

/// Tracks portfolio value and the hysteretic EmergencyLevel state
/// machine, gates/resizes candidate signals, and detects per-instrument
/// stress events. Never bypassed: the Scheduler routes every
/// accepted candidate through `validate` before it reaches the
/// Deduplicator.
pub struct RiskManager {
    config: RiskConfig,
    state: RwLock<LevelState>,
    volatility: Mutex<HashMap<(String, Timeframe), VolatilityManager>>,
    stress_events: RwLock<HashMap<String, Vec<StressEvent>>>,
    health: HealthCounters,
    repo: Option<Arc<dyn RiskStateRepository>>,
    stress_repo: Option<Arc<dyn StressEventRepository>>,
    enabled: bool,
    metrics: Option<Arc<Metrics>>,
}

impl RiskManager {
    pub fn new(initial_value: Decimal, config: RiskConfig) -> Self {
        Self {
            config,
            state: RwLock::new(LevelState {
                portfolio: PortfolioState::new(initial_value),
                level: EmergencyLevel::ZERO,
                level_below_threshold_since: None,
            }),
            volatility: Mutex::new(HashMap::new()),
            stress_events: RwLock::new(HashMap::new()),
            health: HealthCounters::default(),
            repo: None,
            stress_repo: None,
            enabled: true,
            metrics: None,
        }
    }

    /// Operator kill switch: when disabled, every candidate is accepted
    /// at full size regardless of drawdown or stress, and the emergency
    /// level state machine still updates but no longer gates anything.
    pub fn with_emergency_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_repositories(
        mut self,
        repo: Arc<dyn RiskStateRepository>,
        stress_repo: Arc<dyn StressEventRepository>,
    ) -> Self {
        self.repo = Some(repo);
        self.stress_repo = Some(stress_repo);
        self
    }

    /// Resumes portfolio/emergency-level state from a persisted snapshot.
    pub async fn restore(repo: Arc<dyn RiskStateRepository>, stress_repo: Arc<dyn StressEventRepository>, config: RiskConfig, fallback_initial_value: Decimal) -> anyhow::Result<Self> {
        let persisted = repo.load().await?;
        let manager = match persisted {
            Some(saved) => {
                let manager = Self::new(saved.current_value, config);
                let mut state = manager.state.write().await;
                state.portfolio.peak_value = saved.peak_value;
                state.level = EmergencyLevel::from_value(saved.emergency_level);
                state.level_below_threshold_since = saved.level_below_threshold_since;
                drop(state);
                manager
            }
            None => Self::new(fallback_initial_value, config),
        };
        Ok(manager.with_repositories(repo, stress_repo))
    }

    pub fn health(&self) -> crate::domain::health::HealthSnapshot {
        self.health.snapshot()
    }

    /// Updates the mark-to-market value, recomputes drawdown, and
    /// advances/recedes EmergencyLevel under hysteresis: upward
    /// transitions are immediate, downward transitions require the
    /// drawdown to stay below the lower level's threshold for the
    /// configured dwell period. Level 4 never auto-recedes.
    pub async fn update_portfolio(&self, current_value: Decimal, now: DateTime<Utc>) -> EmergencyLevel {
        let mut state = self.state.write().await;
        state.portfolio.mark(current_value, now);
        let drawdown = state.portfolio.drawdown();
        let raw_level = EmergencyLevel::from_drawdown(drawdown);
        let current = state.level;

        let next_level = if raw_level.value() > current.value() {
            state.level_below_threshold_since = None;
            raw_level
        } else if raw_level.value() < current.value() {
            if current.is_sticky_maximum() {
                current
            } else {
                let since = *state.level_below_threshold_since.get_or_insert(now);
                if now - since >= self.config.emergency_dwell {
                    state.level_below_threshold_since = None;
                    raw_level
                } else {
                    current
                }
            }
        } else {
            state.level_below_threshold_since = None;
            current
        };

        if next_level != current {
            info!(
                from = current.value(),
                to = next_level.value(),
                drawdown = %drawdown,
                "emergency level transition"
            );
        }
        state.level = next_level;

        if let Some(metrics) = &self.metrics {
            metrics.set_emergency_level(next_level.value());
        }

        let snapshot = RiskState {
            id: "global".to_string(),
            current_value: state.portfolio.current_value,
            peak_value: state.portfolio.peak_value,
            emergency_level: state.level.value(),
            level_below_threshold_since: state.level_below_threshold_since,
            updated_at: now,
        };
        let result_level = state.level;
        drop(state);

        if let Some(repo) = &self.repo {
            if let Err(err) = repo.save(&snapshot).await {
                self.health.record_transient_fail(err.to_string());
            } else {
                self.health.record_success();
            }
        }

        result_level
    }

    pub async fn current_level(&self) -> EmergencyLevel {
        self.state.read().await.level
    }

    pub async fn portfolio_snapshot(&self) -> PortfolioState {
        self.state.read().await.portfolio.clone()
    }

    /// Compares short-window realized volatility against the baseline
    /// for (instrument, timeframe); records and returns a StressEvent
    /// when the ratio crosses the detection threshold.
    pub async fn monitor_stress(&self, instrument: &str, timeframe: Timeframe, true_range: f64, now: DateTime<Utc>) -> Option<StressEvent> {
        let ratio = {
            let mut vols = self.volatility.lock().await;
            let manager = vols.entry((instrument.to_string(), timeframe)).or_insert_with(|| {
                VolatilityManager::new(self.config.stress_short_window, self.config.stress_baseline_window)
            });
            manager.update(true_range);
            manager.severity_ratio()
        }?;

        if ratio < StressEvent::DETECTION_THRESHOLD {
            return None;
        }

        let event = StressEvent {
            instrument: instrument.to_string(),
            timeframe,
            detected_at: now,
            severity: ratio,
            kind: StressKind::VolSpike,
        };

        warn!(instrument, %timeframe, severity = ratio, critical = event.is_critical(), "stress event detected");

        if let Some(metrics) = &self.metrics {
            metrics.inc_stress_event(instrument);
        }

        self.stress_events
            .write()
            .await
            .entry(instrument.to_string())
            .or_default()
            .push(event.clone());

        if let Some(repo) = &self.stress_repo {
            if let Err(err) = repo.record(&event).await {
                self.health.record_transient_fail(err.to_string());
            }
        }

        Some(event)
    }

    async fn has_active_stress(&self, instrument: &str, now: DateTime<Utc>) -> bool {
        let mut events = self.stress_events.write().await;
        if let Some(list) = events.get_mut(instrument) {
            list.retain(|e| !e.has_expired(now, self.config.stress_event_expiry));
            !list.is_empty()
        } else {
            false
        }
    }

    /// Gates or resizes a candidate signal. `min_atr` is
    /// the originating strategy's configured floor, required to judge
    /// the level-3 ATR condition. Any unexpected level value fails
    /// closed (REJECT) and increments the permanent-fail counter.
    pub async fn validate(&self, signal: &Signal, min_atr: Decimal, now: DateTime<Utc>) -> ValidationOutcome {
        if !self.enabled {
            self.health.record_success();
            return ValidationOutcome::Accept {
                size_multiplier: Decimal::ONE,
            };
        }

        let level = self.current_level().await;
        let outcome = match level.value() {
            4 => ValidationOutcome::Reject {
                reason: "emergency_stop".to_string(),
            },
            3 => {
                let rr_ok = signal.reward_risk() >= self.config.level3_min_rr;
                let atr_ok = signal.atr_at_signal >= self.config.level3_min_atr_mult * min_atr;
                if rr_ok && atr_ok {
                    ValidationOutcome::Resize {
                        size_multiplier: level.size_multiplier(),
                    }
                } else {
                    ValidationOutcome::Reject {
                        reason: "crisis_rr_insufficient".to_string(),
                    }
                }
            }
            1 | 2 => {
                if self.has_active_stress(&signal.instrument, now).await {
                    if signal.reward_risk() >= self.config.stressed_level_1_2_min_rr {
                        ValidationOutcome::Resize {
                            size_multiplier: level.size_multiplier(),
                        }
                    } else {
                        ValidationOutcome::Reject {
                            reason: "stress_rr_insufficient".to_string(),
                        }
                    }
                } else {
                    ValidationOutcome::Resize {
                        size_multiplier: level.size_multiplier(),
                    }
                }
            }
            0 => ValidationOutcome::Accept {
                size_multiplier: Decimal::ONE,
            },
            other => {
                let err = RiskError::Internal {
                    reason: format!("unexpected emergency level {other}"),
                };
                self.health.record_permanent_fail(err.to_string());
                ValidationOutcome::Reject {
                    reason: "internal_error".to_string(),
                }
            }
        };

        if !outcome.is_rejected() {
            self.health.record_success();
        }
        outcome
    }
}
