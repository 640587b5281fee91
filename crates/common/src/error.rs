use thiserror::Error;

use crate::types::TokenId;

/// Errors produced by the risk preview engine and its readers.
#[derive(Debug, Error)]
pub enum RiskError {
    /// No accepted baseline yet, or the source reported a zero/negative price.
    #[error("Price unavailable for token {0}")]
    PriceUnavailable(TokenId),

    /// Transient failure reading the contract or a price source.
    #[error("Source unreachable: {0}")]
    SourceUnreachable(String),

    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("Unknown collateral token: {0}")]
    UnknownToken(TokenId),

    /// A redeem asks for more than the account has minted or deposited.
    #[error("Exceeds position: {0}")]
    ExceedsPosition(String),

    /// An amount too large for 256-bit fixed-point math.
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RiskError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RiskError::SourceUnreachable(_) | RiskError::PriceUnavailable(_)
        )
    }
}

pub type RiskResult<T> = Result<T, RiskError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    #[test]
    fn test_transient_classification() {
        assert!(RiskError::SourceUnreachable("timeout".into()).is_transient());
        assert!(RiskError::PriceUnavailable(Address::ZERO).is_transient());
        assert!(!RiskError::InvalidAccount("zero address".into()).is_transient());
        assert!(!RiskError::Config("bad".into()).is_transient());
    }

    #[test]
    fn test_error_message_names_token() {
        let token = Address::repeat_byte(0xAB);
        let msg = RiskError::PriceUnavailable(token).to_string();
        assert!(msg.contains(&format!("{token}")));
    }
}
