pub mod sqlite_candle_repository;
pub mod sqlite_delivery_attempt_repository;
pub mod sqlite_risk_state_repository;
pub mod sqlite_signal_store;
pub mod sqlite_stress_event_repository;

pub use sqlite_candle_repository::SqliteCandleRepository;
pub use sqlite_delivery_attempt_repository::SqliteDeliveryAttemptRepository;
pub use sqlite_risk_state_repository::SqliteRiskStateRepository;
pub use sqlite_signal_store::SqliteSignalStore;
pub use sqlite_stress_event_repository::SqliteStressEventRepository;
