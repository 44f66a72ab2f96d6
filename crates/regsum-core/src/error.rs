//! Design-related error types

/// Errors raised while constructing or transforming a design
#[derive(thiserror::Error, Debug)]
pub enum DesignError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    #[error("Empty design: {0}")]
    Empty(&'static str),

    #[error("Grouping column '{0}' not found")]
    GroupNotFound(String),

    #[error("Duplicate grouping column: {0}")]
    DuplicateGroup(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
