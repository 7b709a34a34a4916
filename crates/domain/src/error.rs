//! Unified error types for the domain layer
//!
//! Provides a common error type used across all domain operations, enabling
//! consistent error handling without forcing callers to use String or anyhow.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Player name does not exist in the registry
    #[error("Unknown player: {0}")]
    UnknownPlayer(String),

    /// Player name was registered twice
    #[error("Player already registered: {0}")]
    DuplicatePlayer(String),

    /// A decision returned by the oracle does not satisfy the requested schema
    #[error("Invalid decision: {0}")]
    InvalidDecision(String),
}

impl DomainError {
    /// Creates a validation error for business rule violations.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an unknown-player error
    pub fn unknown_player(name: impl Into<String>) -> Self {
        Self::UnknownPlayer(name.into())
    }

    /// Create a duplicate-player error
    pub fn duplicate_player(name: impl Into<String>) -> Self {
        Self::DuplicatePlayer(name.into())
    }

    /// Create an invalid-decision error
    pub fn invalid_decision(msg: impl Into<String>) -> Self {
        Self::InvalidDecision(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = DomainError::validation("role distribution must cover 9 players");
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Validation failed: role distribution must cover 9 players"
        );
    }

    #[test]
    fn test_unknown_player_error() {
        let err = DomainError::unknown_player("Player12");
        assert!(matches!(err, DomainError::UnknownPlayer(_)));
        assert!(err.to_string().contains("Player12"));
    }
}
