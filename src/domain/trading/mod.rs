pub mod portfolio;
pub mod signal;
pub mod strategy_config;

pub use portfolio::PortfolioState;
pub use signal::{Direction, Signal, SignalStatus};
pub use strategy_config::{StrategyConfig, StrategyConfigError};
