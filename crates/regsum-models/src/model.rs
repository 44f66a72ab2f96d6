//! Model capability abstraction
//!
//! The summary builder never inspects a concrete model type. Everything
//! it needs is behind [`FittedModel`]: a family tag, the fitted design,
//! coefficient and covariance estimates, fit statistics, score parts for
//! robust sandwiches, and a refit hook for the transform-then-refit
//! pattern. Adapters for the four supported families live in the
//! submodules.

use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use regsum_core::Design;

use crate::Result;

pub mod glm;
pub mod linear;
pub mod mixed;
pub mod survey;

/// Model family tag used for capability dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelFamily {
    /// Ordinary least squares
    Linear,
    /// Generalized linear model
    GeneralizedLinear {
        /// Response distribution
        family: GlmFamily,
        /// Link function
        link: Link,
    },
    /// Mixed-effects model (externally estimated)
    MixedEffects,
    /// Survey-weighted model with design-based errors
    SurveyWeighted,
    /// Anything else; rejected by the dispatcher
    Other(String),
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::Linear => write!(f, "linear (OLS)"),
            ModelFamily::GeneralizedLinear { family, link } => {
                write!(f, "generalized linear ({}, {} link)", family, link)
            }
            ModelFamily::MixedEffects => write!(f, "mixed effects"),
            ModelFamily::SurveyWeighted => write!(f, "survey-weighted"),
            ModelFamily::Other(s) => write!(f, "{}", s),
        }
    }
}

/// GLM response distributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlmFamily {
    Gaussian,
    Binomial,
    Poisson,
}

impl fmt::Display for GlmFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlmFamily::Gaussian => write!(f, "gaussian"),
            GlmFamily::Binomial => write!(f, "binomial"),
            GlmFamily::Poisson => write!(f, "poisson"),
        }
    }
}

/// Link functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Link {
    Identity,
    Logit,
    Log,
}

impl Link {
    /// Whether exponentiated coefficients are meaningful (odds/rate ratios)
    pub fn is_log_scale(&self) -> bool {
        matches!(self, Link::Logit | Link::Log)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Link::Identity => write!(f, "identity"),
            Link::Logit => write!(f, "logit"),
            Link::Log => write!(f, "log"),
        }
    }
}

/// Model fit statistics
///
/// Every field is optional; each family fills in what it can compute.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FitStatistics {
    /// R-squared (linear, survey-weighted)
    pub r_squared: Option<f64>,
    /// Adjusted R-squared
    pub adj_r_squared: Option<f64>,
    /// Residual standard error
    pub residual_std_error: Option<f64>,
    /// F-statistic
    pub f_statistic: Option<f64>,
    /// F-statistic p-value
    pub f_p_value: Option<f64>,
    /// Log-likelihood
    pub log_likelihood: Option<f64>,
    /// AIC
    pub aic: Option<f64>,
    /// BIC
    pub bic: Option<f64>,
    /// Null deviance (GLM)
    pub null_deviance: Option<f64>,
    /// Residual deviance (GLM)
    pub residual_deviance: Option<f64>,
    /// Pseudo R-squared (GLM)
    pub pseudo_r_squared: Option<f64>,
    /// Marginal R-squared (mixed, external Nakagawa-Schielzeth capability)
    pub marginal_r_squared: Option<f64>,
    /// Conditional R-squared (mixed, external capability)
    pub conditional_r_squared: Option<f64>,
    /// Residual degrees of freedom
    pub df_residual: Option<f64>,
    /// Convergence status
    pub converged: Option<bool>,
}

/// Pieces a robust sandwich covariance is assembled from
///
/// `rows` are the (weight-adjusted) design rows whose cross-product
/// inverse is `bread`; `scores` are per-observation score residuals such
/// that `rows[i] * scores[i]` is the i-th estimating-function
/// contribution.
#[derive(Debug, Clone)]
pub struct ScoreParts {
    pub rows: Array2<f64>,
    pub scores: Array1<f64>,
    pub bread: Array2<f64>,
}

/// Capability trait for fitted regression models
///
/// Implementations are read-only views of a completed fit; nothing here
/// mutates the receiver. `refit` produces a fresh model on a new design
/// and is the only potentially long-running call.
pub trait FittedModel: std::fmt::Debug + Send + Sync {
    /// Family tag used for dispatch
    fn family(&self) -> &ModelFamily;

    /// The design the model was fitted against
    fn design(&self) -> &Design;

    /// Coefficient estimates, in design-column order
    fn coefficients(&self) -> &Array1<f64>;

    /// Native (dispersion-scaled) coefficient covariance
    fn covariance(&self) -> &Array2<f64>;

    /// Fit statistics for the summary header
    fn fit_statistics(&self) -> FitStatistics;

    /// Residual degrees of freedom, when the family defines them
    fn df_residual(&self) -> Option<f64>;

    /// External degrees-of-freedom approximation (mixed models)
    fn approx_df(&self) -> Option<f64> {
        None
    }

    /// Score parts for robust sandwich assembly
    ///
    /// `None` for families without estimating-equation scores, or whose
    /// native covariance is already a sandwich.
    fn score_parts(&self) -> Option<ScoreParts>;

    /// Re-estimate the same model structure on a new design
    fn refit(&self, design: &Design) -> Result<Box<dyn FittedModel>>;

    /// Term names, in design-column order
    fn term_names(&self) -> &[String] {
        self.design().terms()
    }

    /// Number of observations
    fn n_obs(&self) -> usize {
        self.design().n_obs()
    }
}
