use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Canonical, immutable instrument configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub pip_size: Decimal,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        let pip_size = if symbol.ends_with("_JPY") || symbol.starts_with("JPY_") {
            dec!(0.01)
        } else {
            dec!(0.0001)
        };
        Self { symbol, pip_size }
    }
}
