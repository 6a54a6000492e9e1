pub mod emergency_level;
pub mod risk_config;
pub mod state;
pub mod stress_event;
pub mod validation_outcome;
pub mod volatility_manager;

pub use emergency_level::EmergencyLevel;
pub use risk_config::{RiskConfig, RiskConfigError};
pub use state::RiskState;
pub use stress_event::{StressEvent, StressKind};
pub use validation_outcome::ValidationOutcome;
pub use volatility_manager::VolatilityManager;
