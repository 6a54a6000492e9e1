//! Push-based observability for the signal engine.
//!
//! Metrics are exposed as `fxsig_`-prefixed Prometheus series (scraped,
//! not pushed) alongside structured `tracing` logs emitted throughout
//! the application layer. There is no inbound HTTP surface here.

pub mod metrics;

pub use metrics::Metrics;
