use crate::domain::market::Timeframe;
use crate::domain::trading::{StrategyConfig, StrategyConfigError};
use std::sync::RwLock;

/// Owns the active set of `StrategyConfig` records and the
/// (instrument, timeframe) -> strategies mapping. `reload` performs an
/// atomic whole-value swap so no evaluation tick ever sees a torn mix of
/// old and new parameters.
pub struct StrategyRegistry {
    configs: RwLock<Vec<StrategyConfig>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            configs: RwLock::new(Vec::new()),
        }
    }

    /// Validates every config in the batch; rejects the whole batch on
    /// any violation, leaving the previously loaded set untouched.
    pub fn load(&self, source: Vec<StrategyConfig>) -> Result<(), StrategyConfigError> {
        for cfg in &source {
            cfg.validate()?;
        }
        *self.configs.write().unwrap() = source;
        Ok(())
    }

    /// Alias for `load`, named for the atomic-swap semantics a config
    /// hot-reload depends on.
    pub fn reload(&self, source: Vec<StrategyConfig>) -> Result<(), StrategyConfigError> {
        self.load(source)
    }

    pub fn active_for(&self, instrument: &str, timeframe: Timeframe) -> Vec<StrategyConfig> {
        self.configs
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.instrument == instrument && c.timeframe == timeframe)
            .cloned()
            .collect()
    }

    pub fn lanes(&self) -> Vec<(String, Timeframe)> {
        let mut lanes: Vec<(String, Timeframe)> = self
            .configs
            .read()
            .unwrap()
            .iter()
            .map(|c| (c.instrument.clone(), c.timeframe))
            .collect();
        lanes.sort();
        lanes.dedup();
        lanes
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
