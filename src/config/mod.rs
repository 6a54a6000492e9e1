//! Environment-driven configuration for the signal engine.
//!
//! Every field is readable from an environment variable (and, for local
//! runs, an `.env` file picked up by the binary entrypoint) via `clap`'s
//! `env` feature, collapsed into one struct since this domain has a
//! single cohesive configuration surface rather than per-broker variants.

use crate::domain::market::Timeframe;
use crate::domain::risk::RiskConfig;
use crate::domain::trading::{StrategyConfig, StrategyConfigError};
use clap::Parser;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Parser)]
#[command(name = "fx-signal-engine", about = "Automated FX signal engine")]
pub struct Config {
    /// Bearer token for the broker market data API.
    #[arg(long, env = "BROKER_API_KEY")]
    pub broker_api_key: String,

    /// Broker account identifier, embedded in the candles endpoint path.
    #[arg(long, env = "BROKER_ACCOUNT_ID")]
    pub broker_account_id: String,

    #[arg(
        long,
        env = "BROKER_BASE_URL",
        default_value = "https://api-fxpractice.oanda.com"
    )]
    pub broker_base_url: String,

    /// Durable store connection string, e.g. `sqlite://data/signals.db`.
    #[arg(long, env = "STORE_CONNECTION", default_value = "sqlite://data/signals.db")]
    pub store_connection: String,

    /// Comma-separated webhook endpoints; empty means no delivery channels.
    #[arg(long, env = "WEBHOOK_URLS", default_value = "")]
    pub webhook_urls: String,

    #[arg(long, env = "PORTFOLIO_INITIAL_VALUE", default_value = "10000")]
    pub portfolio_initial_value: Decimal,

    #[arg(long, env = "EMERGENCY_ENABLED", default_value_t = true)]
    pub emergency_enabled: bool,

    /// Timeframes to evaluate for every configured instrument.
    #[arg(long, env = "TIMEFRAMES", default_value = "H4", value_delimiter = ',')]
    pub timeframes: Vec<Timeframe>,

    /// Instruments to evaluate across every configured timeframe.
    #[arg(long, env = "INSTRUMENTS", default_value = "EUR_USD", value_delimiter = ',')]
    pub instruments: Vec<String>,

    #[arg(long, env = "DELIVERY_MAX_ATTEMPTS", default_value_t = 8)]
    pub delivery_max_attempts: u32,

    #[arg(long, env = "DELIVERY_CONCURRENCY_PER_CHANNEL", default_value_t = 4)]
    pub delivery_concurrency_per_channel: usize,

    #[arg(long, env = "STRESS_BASELINE_WINDOW", default_value_t = 400)]
    pub stress_baseline_window: usize,

    #[arg(long, env = "STRESS_SHORT_WINDOW", default_value_t = 20)]
    pub stress_short_window: usize,

    #[arg(long, env = "EMERGENCY_DWELL_MINUTES", default_value_t = 15)]
    pub emergency_dwell_minutes: i64,

    /// Bounded shutdown drain window, in seconds.
    #[arg(long, env = "DRAIN_WINDOW_SECONDS", default_value_t = 30)]
    pub drain_window_seconds: u64,

    /// Dedup fingerprint cache capacity and TTL.
    #[arg(long, env = "DEDUP_CAPACITY", default_value_t = 4096)]
    pub dedup_capacity: usize,

    #[arg(long, env = "DEDUP_TTL_MINUTES", default_value_t = 60)]
    pub dedup_ttl_minutes: i64,

    /// Default crossover strategy parameters applied to every configured
    /// (instrument, timeframe) lane.
    #[arg(long, env = "STRATEGY_FAST_PERIOD", default_value_t = 10)]
    pub strategy_fast_period: usize,

    #[arg(long, env = "STRATEGY_SLOW_PERIOD", default_value_t = 20)]
    pub strategy_slow_period: usize,

    #[arg(long, env = "STRATEGY_ATR_PERIOD", default_value_t = 14)]
    pub strategy_atr_period: usize,

    #[arg(long, env = "STRATEGY_SL_ATR_MULT", default_value = "1.5")]
    pub strategy_sl_atr_mult: Decimal,

    #[arg(long, env = "STRATEGY_TP_ATR_MULT", default_value = "3.0")]
    pub strategy_tp_atr_mult: Decimal,

    #[arg(long, env = "STRATEGY_MIN_ATR", default_value = "0.0003")]
    pub strategy_min_atr: Decimal,

    #[arg(long, env = "STRATEGY_MIN_RR", default_value = "1.5")]
    pub strategy_min_rr: Decimal,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::try_parse()?)
    }

    pub fn to_risk_config(&self) -> RiskConfig {
        RiskConfig {
            emergency_dwell: chrono::Duration::minutes(self.emergency_dwell_minutes),
            stress_short_window: self.stress_short_window,
            stress_baseline_window: self.stress_baseline_window,
            ..RiskConfig::default()
        }
    }

    /// One default crossover strategy per (instrument, timeframe) pair in
    /// the configured cross product.
    pub fn strategies(&self) -> Result<Vec<StrategyConfig>, StrategyConfigError> {
        let mut configs = Vec::with_capacity(self.instruments.len() * self.timeframes.len());
        for instrument in &self.instruments {
            for &timeframe in &self.timeframes {
                let config = StrategyConfig {
                    id: format!(
                        "dual_sma_{}_{}",
                        self.strategy_fast_period, self.strategy_slow_period
                    ),
                    instrument: instrument.clone(),
                    timeframe,
                    fast_period: self.strategy_fast_period,
                    slow_period: self.strategy_slow_period,
                    atr_period: self.strategy_atr_period,
                    sl_atr_mult: self.strategy_sl_atr_mult,
                    tp_atr_mult: self.strategy_tp_atr_mult,
                    min_atr: self.strategy_min_atr,
                    min_rr: self.strategy_min_rr,
                };
                config.validate()?;
                configs.push(config);
            }
        }
        Ok(configs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once(&"fx-signal-engine").chain(args))
            .expect("config should parse")
    }

    #[test]
    fn required_broker_fields_must_be_supplied() {
        let result = Config::try_parse_from(["fx-signal-engine"]);
        assert!(result.is_err());
    }

    #[test]
    fn timeframes_and_instruments_split_on_comma() {
        let config = parse(&[
            "--broker-api-key",
            "key",
            "--broker-account-id",
            "acct",
            "--timeframes",
            "H1,H4",
            "--instruments",
            "EUR_USD,GBP_USD",
        ]);
        assert_eq!(config.timeframes, vec![Timeframe::H1, Timeframe::H4]);
        assert_eq!(
            config.instruments,
            vec!["EUR_USD".to_string(), "GBP_USD".to_string()]
        );
    }

    #[test]
    fn strategies_builds_cross_product_of_instruments_and_timeframes() {
        let config = parse(&[
            "--broker-api-key",
            "key",
            "--broker-account-id",
            "acct",
            "--timeframes",
            "H1,H4",
            "--instruments",
            "EUR_USD,GBP_USD",
        ]);
        let strategies = config.strategies().unwrap();
        assert_eq!(strategies.len(), 4);
    }

    #[test]
    fn risk_config_carries_env_tunable_fields_and_defaults_the_rest() {
        let config = parse(&[
            "--broker-api-key",
            "key",
            "--broker-account-id",
            "acct",
            "--emergency-dwell-minutes",
            "30",
        ]);
        let risk_config = config.to_risk_config();
        assert_eq!(risk_config.emergency_dwell, chrono::Duration::minutes(30));
        assert_eq!(risk_config.level3_min_rr, RiskConfig::default().level3_min_rr);
    }
}
