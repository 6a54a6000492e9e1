pub mod crossover;
pub mod registry;

pub use registry::StrategyRegistry;
