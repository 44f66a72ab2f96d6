//! Model-agnostic regression summary builder
//!
//! Given a fitted regression model (anything implementing the
//! [`FittedModel`] capability trait) and a [`SummaryConfig`], the
//! builder produces a [`SummaryResult`]: a normalized coefficient table
//! with display rounding applied, an unrounded copy for programmatic
//! reuse, family-appropriate fit statistics and warning-level notes.
//!
//! Behavior dispatches on the model's [`ModelFamily`] tag, not on a
//! type hierarchy: linear, generalized linear, mixed-effects and
//! survey-weighted models all flow through the same [`summ`] entry
//! point.

pub mod covariance;
pub mod error;
pub mod model;
pub mod summ;
pub mod vif;

// Re-exports
pub use covariance::HcVariant;
pub use error::SummError;
pub use model::glm::GlmFit;
pub use model::linear::LinearFit;
pub use model::mixed::MixedFit;
pub use model::survey::SurveyFit;
pub use model::{FitStatistics, FittedModel, GlmFamily, Link, ModelFamily, ScoreParts};
pub use summ::{summ, Cluster, CoefficientRow, ReferenceDist, SummaryConfig, SummaryResult};

/// Result type for summary operations
pub type Result<T> = std::result::Result<T, SummError>;
