use crate::domain::market::Timeframe;

/// A missing run of bars between the last known complete candle and the
/// first candle of a freshly-fetched batch, expressed as open_time
/// epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub from: i64,
    pub to: i64,
}

/// Compares the expected next bar boundary (one step after `last_known`)
/// against the open_time of the first candle in a new batch. Returns
/// `None` when the batch is contiguous or there is no prior reference.
pub fn detect_gap(last_known: Option<i64>, timeframe: Timeframe, first_new_open_time: Option<i64>) -> Option<Gap> {
    let last_known = last_known?;
    let first_new = first_new_open_time?;
    let expected_next = last_known + timeframe.to_seconds();
    if first_new > expected_next {
        Some(Gap {
            from: expected_next,
            to: first_new,
        })
    } else {
        None
    }
}
