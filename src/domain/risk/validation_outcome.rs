use rust_decimal::Decimal;

/// Tagged outcome of `RiskManager::validate`, replacing exception-driven
/// validation with an explicit variant the caller must match on.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Accept { size_multiplier: Decimal },
    Resize { size_multiplier: Decimal },
    Reject { reason: String },
}

impl ValidationOutcome {
    pub fn size_multiplier(&self) -> Decimal {
        match self {
            ValidationOutcome::Accept { size_multiplier } => *size_multiplier,
            ValidationOutcome::Resize { size_multiplier } => *size_multiplier,
            ValidationOutcome::Reject { .. } => Decimal::ZERO,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ValidationOutcome::Reject { .. })
    }
}
