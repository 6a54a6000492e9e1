pub mod attempt;

pub use attempt::{DeliveryAttempt, DeliveryOutcome};
