pub mod candle;
pub mod indicator_state;
pub mod instrument;
pub mod timeframe;

pub use candle::{Candle, CandleError};
pub use indicator_state::IndicatorState;
pub use instrument::Instrument;
pub use timeframe::Timeframe;
