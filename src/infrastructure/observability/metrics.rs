//! Prometheus metrics for the signal engine.
//!
//! All metrics use the `fxsig_` prefix and are read-only from the
//! outside; nothing here accepts inbound requests, it is scraped or
//! pushed.

use prometheus::{CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    pub candles_ingested_total: CounterVec,
    pub signals_emitted_total: CounterVec,
    pub signals_rejected_total: CounterVec,
    pub signals_suppressed_total: CounterVec,
    pub emergency_level_current: Gauge,
    pub stress_events_total: CounterVec,
    pub delivery_attempts_total: CounterVec,
    pub api_latency_seconds: HistogramVec,
    pub uptime_seconds: Gauge,
    pub circuit_breaker_status: GaugeVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let candles_ingested_total = CounterVec::new(
            Opts::new("fxsig_candles_ingested_total", "Total complete candles ingested"),
            &["instrument", "timeframe"],
        )?;
        registry.register(Box::new(candles_ingested_total.clone()))?;

        let signals_emitted_total = CounterVec::new(
            Opts::new("fxsig_signals_emitted_total", "Total persisted signals by strategy and direction"),
            &["strategy", "direction"],
        )?;
        registry.register(Box::new(signals_emitted_total.clone()))?;

        let signals_rejected_total = CounterVec::new(
            Opts::new("fxsig_signals_rejected_total", "Total candidates rejected by the risk manager, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(signals_rejected_total.clone()))?;

        let signals_suppressed_total = CounterVec::new(
            Opts::new("fxsig_signals_suppressed_total", "Total signals suppressed by the deduplicator, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(signals_suppressed_total.clone()))?;

        let emergency_level_current =
            Gauge::with_opts(Opts::new("fxsig_emergency_level_current", "Current emergency level (0-4)"))?;
        registry.register(Box::new(emergency_level_current.clone()))?;

        let stress_events_total = CounterVec::new(
            Opts::new("fxsig_stress_events_total", "Total stress events detected, by instrument"),
            &["instrument"],
        )?;
        registry.register(Box::new(stress_events_total.clone()))?;

        let delivery_attempts_total = CounterVec::new(
            Opts::new("fxsig_delivery_attempts_total", "Total delivery attempts by channel and outcome"),
            &["channel", "outcome"],
        )?;
        registry.register(Box::new(delivery_attempts_total.clone()))?;

        let api_latency_seconds = HistogramVec::new(
            HistogramOpts::new("fxsig_api_latency_seconds", "External API request latency in seconds")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["service", "endpoint"],
        )?;
        registry.register(Box::new(api_latency_seconds.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new("fxsig_uptime_seconds", "Process uptime in seconds"))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let circuit_breaker_status = GaugeVec::new(
            Opts::new("fxsig_circuit_breaker_status", "Circuit breaker status by component (0=closed, 1=open)"),
            &["component"],
        )?;
        registry.register(Box::new(circuit_breaker_status.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            candles_ingested_total,
            signals_emitted_total,
            signals_rejected_total,
            signals_suppressed_total,
            emergency_level_current,
            stress_events_total,
            delivery_attempts_total,
            api_latency_seconds,
            uptime_seconds,
            circuit_breaker_status,
        })
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }

    pub fn inc_candles(&self, instrument: &str, timeframe: &str, count: u64) {
        self.candles_ingested_total.with_label_values(&[instrument, timeframe]).inc_by(count as f64);
    }

    pub fn inc_signal_emitted(&self, strategy: &str, direction: &str) {
        self.signals_emitted_total.with_label_values(&[strategy, direction]).inc();
    }

    pub fn inc_signal_rejected(&self, reason: &str) {
        self.signals_rejected_total.with_label_values(&[reason]).inc();
    }

    pub fn inc_signal_suppressed(&self, reason: &str) {
        self.signals_suppressed_total.with_label_values(&[reason]).inc();
    }

    pub fn set_emergency_level(&self, level: u8) {
        self.emergency_level_current.set(level as f64);
    }

    pub fn inc_stress_event(&self, instrument: &str) {
        self.stress_events_total.with_label_values(&[instrument]).inc();
    }

    pub fn inc_delivery_attempt(&self, channel: &str, outcome: &str) {
        self.delivery_attempts_total.with_label_values(&[channel, outcome]).inc();
    }

    pub fn observe_api_latency(&self, service: &str, endpoint: &str, latency: f64) {
        self.api_latency_seconds.with_label_values(&[service, endpoint]).observe(latency);
    }

    pub fn set_circuit_breaker_status(&self, component: &str, open: bool) {
        self.circuit_breaker_status.with_label_values(&[component]).set(if open { 1.0 } else { 0.0 });
    }

    pub fn set_uptime(&self, seconds: f64) {
        self.uptime_seconds.set(seconds);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to construct default Metrics registry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_render_with_fxsig_prefix() {
        let metrics = Metrics::new().expect("failed to create metrics");
        assert!(metrics.render().contains("fxsig_"));
    }

    #[test]
    fn emergency_level_gauge_tracks_latest_value() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.set_emergency_level(3);
        assert!(metrics.render().contains("fxsig_emergency_level_current 3"));
    }

    #[test]
    fn signal_counters_are_labeled() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.inc_signal_emitted("dual_sma_10_20", "LONG");
        metrics.inc_signal_rejected("crisis_rr_insufficient");
        let output = metrics.render();
        assert!(output.contains("fxsig_signals_emitted_total"));
        assert!(output.contains("crisis_rr_insufficient"));
    }

    #[test]
    fn circuit_breaker_status_tracks_the_named_component() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.set_circuit_breaker_status("oanda_broker", true);
        let output = metrics.render();
        assert!(output.contains("fxsig_circuit_breaker_status"));
        assert!(output.contains("oanda_broker"));
        assert!(output.contains("fxsig_circuit_breaker_status{component=\"oanda_broker\"} 1"));
    }

    #[test]
    fn uptime_gauge_tracks_latest_value() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.set_uptime(42.0);
        assert!(metrics.render().contains("fxsig_uptime_seconds 42"));
    }
}
