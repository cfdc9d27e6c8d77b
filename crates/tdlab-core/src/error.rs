//! Error types for the tdlab core library

use thiserror::Error;

/// Core error type for RL operations
#[derive(Error, Debug)]
pub enum RLError {
    /// Missing or invalid hyperparameter
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// State or action index outside the declared bounds
    #[error("{kind} index {index} out of bounds (size {bound})")]
    IndexOutOfBounds {
        /// What was being indexed ("state", "action", ...)
        kind: &'static str,
        /// Offending index
        index: usize,
        /// Exclusive upper bound
        bound: usize,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Length the operation required
        expected: usize,
        /// Length it was given
        actual: usize,
    },

    /// Environment-related errors
    #[error("Environment error: {0}")]
    Environment(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RLError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type alias for RL operations
pub type Result<T> = std::result::Result<T, RLError>;

/// Check that `index < bound`, reporting `kind` on failure.
pub(crate) fn check_index(kind: &'static str, index: usize, bound: usize) -> Result<()> {
    if index < bound {
        Ok(())
    } else {
        Err(RLError::IndexOutOfBounds { kind, index, bound })
    }
}

/// Check that two lengths agree.
pub(crate) fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RLError::DimensionMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_reports_both_lengths() {
        assert!(check_len(3, 3).is_ok());
        let err = check_len(3, 2).unwrap_err();
        assert!(matches!(
            err,
            RLError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(err.to_string(), "Dimension mismatch: expected 3, got 2");
    }
}
