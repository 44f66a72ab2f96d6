//! Summary-builder error types

use thiserror::Error;

use regsum_core::DesignError;

/// Errors surfaced by the summary builder and its model adapters
///
/// Error messages name the offending option/model-family combination so
/// callers can correct configuration rather than guess.
#[derive(Debug, Error)]
pub enum SummError {
    /// Model family not recognized by the dispatcher
    #[error("Unsupported model family: {family}")]
    UnsupportedModel {
        /// Family tag as reported by the model
        family: String,
    },

    /// Requested option combination is invalid for the model family
    #[error("Invalid configuration: {message}")]
    Configuration {
        /// What was requested and why it is invalid
        message: String,
    },

    /// A delegated refit or covariance computation failed
    #[error("Estimation failed during {operation}: {message}")]
    Estimation {
        /// Operation that failed
        operation: String,
        /// Underlying cause
        message: String,
    },

    /// Invalid design construction or transform
    #[error("Design error: {0}")]
    Design(#[from] DesignError),
}

impl SummError {
    /// Shorthand for a configuration failure
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for an estimation failure
    pub fn estimation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Estimation {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
