//! Mixed-effects fitted-model adapter
//!
//! Mixed models are estimated by an external library; this adapter
//! wraps the standard outputs such an estimator returns (fixed-effect
//! coefficients, their covariance, optional fit statistics). Two
//! external capabilities are optional and never approximated here:
//! a Kenward-Roger-style degrees-of-freedom value, and
//! Nakagawa-Schielzeth marginal/conditional R-squared (carried inside
//! [`FitStatistics`]). Without the df value the builder reports
//! standard errors but omits t-based inference.

use ndarray::{Array1, Array2};

use regsum_core::{Design, Matrix, Vector};

use crate::error::SummError;
use crate::model::{FitStatistics, FittedModel, ModelFamily, ScoreParts};
use crate::Result;

/// An externally estimated mixed-effects model
#[derive(Debug, Clone)]
pub struct MixedFit {
    family: ModelFamily,
    design: Design,
    coefficients: Vector,
    covariance: Matrix,
    approx_df: Option<f64>,
    stats: FitStatistics,
}

impl MixedFit {
    /// Wrap externally estimated fixed-effect outputs
    pub fn from_parts(
        design: Design,
        coefficients: Vector,
        covariance: Matrix,
        stats: FitStatistics,
    ) -> Result<Self> {
        let p = design.n_terms();
        if coefficients.len() != p {
            return Err(SummError::estimation(
                "mixed model wrap",
                format!("{} coefficients for {} design terms", coefficients.len(), p),
            ));
        }
        if covariance.nrows() != p || covariance.ncols() != p {
            return Err(SummError::estimation(
                "mixed model wrap",
                format!(
                    "covariance is {}x{} for {} design terms",
                    covariance.nrows(),
                    covariance.ncols(),
                    p
                ),
            ));
        }

        Ok(Self {
            family: ModelFamily::MixedEffects,
            design,
            coefficients,
            covariance,
            approx_df: None,
            stats,
        })
    }

    /// Attach an external degrees-of-freedom approximation
    pub fn with_approx_df(mut self, df: f64) -> Self {
        self.approx_df = Some(df);
        self
    }
}

impl FittedModel for MixedFit {
    fn family(&self) -> &ModelFamily {
        &self.family
    }

    fn design(&self) -> &Design {
        &self.design
    }

    fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    fn fit_statistics(&self) -> FitStatistics {
        self.stats
    }

    fn df_residual(&self) -> Option<f64> {
        self.stats.df_residual
    }

    fn approx_df(&self) -> Option<f64> {
        self.approx_df
    }

    fn score_parts(&self) -> Option<ScoreParts> {
        // No estimating-equation scores available for REML fits
        None
    }

    fn refit(&self, _design: &Design) -> Result<Box<dyn FittedModel>> {
        Err(SummError::estimation(
            "refit",
            "mixed-effects refit requires the external estimator; \
             re-estimate on the transformed data and wrap the new outputs",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn wrapped() -> MixedFit {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let d = Design::with_intercept(x, y, vec!["x".into()]).unwrap();

        MixedFit::from_parts(
            d,
            array![0.5, 1.5],
            array![[0.04, 0.0], [0.0, 0.09]],
            FitStatistics {
                marginal_r_squared: Some(0.42),
                conditional_r_squared: Some(0.61),
                ..FitStatistics::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn wraps_external_estimates() {
        let fit = wrapped();
        assert_eq!(fit.family(), &ModelFamily::MixedEffects);
        assert_eq!(fit.coefficients().len(), 2);
        assert_eq!(fit.approx_df(), None);
        assert_eq!(fit.with_approx_df(17.3).approx_df(), Some(17.3));
    }

    #[test]
    fn rejects_mismatched_covariance() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        let d = Design::with_intercept(x, y, vec!["x".into()]).unwrap();

        let err = MixedFit::from_parts(
            d,
            array![0.5, 1.5],
            array![[0.04]],
            FitStatistics::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SummError::Estimation { .. }));
    }

    #[test]
    fn refit_is_unavailable() {
        let fit = wrapped();
        let centered = regsum_core::transform::center(fit.design());
        assert!(matches!(
            fit.refit(&centered).unwrap_err(),
            SummError::Estimation { .. }
        ));
    }
}
