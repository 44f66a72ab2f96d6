//! Core plumbing for the regsum reporting toolkit
//!
//! This crate provides the model-independent pieces the summary builder
//! works with: the [`Design`] value type (design matrix, response, term
//! metadata), pure centering/standardization transforms, and the
//! process-wide default-digits option.

pub mod design;
pub mod error;
pub mod options;
pub mod transform;

// Re-exports
pub use design::{Design, Matrix, Vector};
pub use error::DesignError;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, DesignError>;
