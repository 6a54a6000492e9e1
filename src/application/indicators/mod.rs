pub mod cache;

pub use cache::{IndicatorCache, true_range};
