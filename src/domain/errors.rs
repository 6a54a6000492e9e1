use thiserror::Error;

/// Errors surfaced by the broker market data client.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    #[error("requested range unavailable: {instrument} {timeframe} [{from}, {to}]")]
    DataUnavailable {
        instrument: String,
        timeframe: String,
        from: String,
        to: String,
    },

    #[error("transient broker error: {reason}")]
    Transient { reason: String },
}

/// Errors surfaced by the RiskManager's internal computation.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("internal risk computation error: {reason}")]
    Internal { reason: String },
}

/// Errors surfaced by the SignalStore.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("signal already exists: {0}")]
    Duplicate(uuid::Uuid),

    #[error("transient storage error: {reason}")]
    Transient { reason: String },

    #[error("fatal storage error: {reason}")]
    Fatal { reason: String },
}

/// Errors surfaced by the DeliveryDispatcher.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transient delivery error for channel {channel}: {reason}")]
    Transient { channel: String, reason: String },

    #[error("terminal delivery error for channel {channel}: status {status}")]
    Terminal { channel: String, status: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_auth_error_formats_reason() {
        let err = BrokerError::Auth {
            reason: "invalid bearer token".to_string(),
        };
        assert!(err.to_string().contains("invalid bearer token"));
    }

    #[test]
    fn store_duplicate_formats_id() {
        let id = uuid::Uuid::nil();
        let err = StoreError::Duplicate(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
