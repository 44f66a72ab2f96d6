//! Linear (OLS) fitted-model adapter
//!
//! Estimation is delegated to `ndarray-linalg`: SVD least squares for
//! the coefficients, matrix inversion for the classical covariance
//! σ²(X'X)⁻¹. The adapter keeps the design, residuals and unscaled
//! bread around so the builder can assemble robust sandwiches and
//! refit on transformed designs.

use ndarray::{Array1, Array2};
use ndarray_linalg::{Inverse, LeastSquaresSvd};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use regsum_core::{Design, Vector};

use crate::error::SummError;
use crate::model::{FitStatistics, FittedModel, ModelFamily, ScoreParts};
use crate::Result;

/// A fitted ordinary least squares model
#[derive(Debug, Clone)]
pub struct LinearFit {
    family: ModelFamily,
    design: Design,
    coefficients: Vector,
    residuals: Vector,
    fitted_values: Vector,
    xtx_inv: Array2<f64>,
    covariance: Array2<f64>,
    stats: FitStatistics,
}

impl LinearFit {
    /// Fit by least squares on the given design
    pub fn fit(design: Design) -> Result<Self> {
        let x = design.x();
        let y = design.y();
        let n = x.nrows();
        let p = x.ncols();

        if n <= p {
            return Err(SummError::estimation(
                "fit",
                format!("{} observations for {} terms leave no residual df", n, p),
            ));
        }

        let coefficients = x
            .least_squares(y)
            .map_err(|e| SummError::estimation("fit", format!("SVD least squares failed: {}", e)))?
            .solution;

        let fitted_values = x.dot(&coefficients);
        let residuals = y - &fitted_values;

        let rss = residuals.mapv(|r| r * r).sum();
        let y_mean = y.mean().unwrap_or(0.0);
        let tss: f64 = y.iter().map(|&yi| (yi - y_mean).powi(2)).sum();

        let sigma2 = rss / (n - p) as f64;

        let xtx_inv = x.t().dot(x).inv().map_err(|e| {
            SummError::estimation("fit", format!("failed to invert X'X: {}", e))
        })?;
        let covariance = &xtx_inv * sigma2;

        let r_squared = if tss > 1e-12 { 1.0 - rss / tss } else { 1.0 };
        let adj_r_squared =
            1.0 - (1.0 - r_squared) * ((n as f64 - 1.0) / (n as f64 - p as f64));

        // Normal log-likelihood at the MLE variance rss/n; a variance at
        // rounding-noise level means an exact fit, where the likelihood
        // degenerates and AIC/BIC carry no information.
        let mle_var = rss / n as f64;
        let (log_likelihood, aic, bic) = if mle_var > f64::EPSILON {
            let ll =
                -0.5 * n as f64 * (2.0 * std::f64::consts::PI * mle_var).ln() - 0.5 * n as f64;
            (
                Some(ll),
                Some(2.0 * p as f64 - 2.0 * ll),
                Some((n as f64).ln() * p as f64 - 2.0 * ll),
            )
        } else {
            (None, None, None)
        };

        let (f_statistic, f_p_value) = if design.has_intercept() && p >= 2 && tss > rss {
            let df_model = (p - 1) as f64;
            let df_residual = (n - p) as f64;
            let f = ((tss - rss) / df_model) / (rss / df_residual);
            let f_dist = FisherSnedecor::new(df_model, df_residual).map_err(|e| {
                SummError::estimation("fit", format!("failed to create F-distribution: {}", e))
            })?;
            (Some(f), Some(1.0 - f_dist.cdf(f)))
        } else {
            (None, None)
        };

        let stats = FitStatistics {
            r_squared: Some(r_squared),
            adj_r_squared: Some(adj_r_squared),
            residual_std_error: Some(sigma2.sqrt()),
            f_statistic,
            f_p_value,
            log_likelihood,
            aic,
            bic,
            df_residual: Some((n - p) as f64),
            converged: Some(true),
            ..FitStatistics::default()
        };

        Ok(Self {
            family: ModelFamily::Linear,
            design,
            coefficients,
            residuals,
            fitted_values,
            xtx_inv,
            covariance,
            stats,
        })
    }

    /// Fitted values
    pub fn fitted_values(&self) -> &Vector {
        &self.fitted_values
    }

    /// Residuals
    pub fn residuals(&self) -> &Vector {
        &self.residuals
    }
}

impl FittedModel for LinearFit {
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

    fn score_parts(&self) -> Option<ScoreParts> {
        Some(ScoreParts {
            rows: self.design.x().clone(),
            scores: self.residuals.clone(),
            bread: self.xtx_inv.clone(),
        })
    }

    fn refit(&self, design: &Design) -> Result<Box<dyn FittedModel>> {
        Ok(Box::new(Self::fit(design.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn simple_design() -> Design {
        // y = 1 + 2x, exactly
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![3.0, 5.0, 7.0, 9.0, 11.0];
        Design::with_intercept(x, y, vec!["x".into()]).unwrap()
    }

    #[test]
    fn recovers_exact_line() {
        let fit = LinearFit::fit(simple_design()).unwrap();

        let coeffs = fit.coefficients();
        assert_eq!(coeffs.len(), 2);
        assert_abs_diff_eq!(coeffs[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(coeffs[1], 2.0, epsilon = 1e-10);

        assert_abs_diff_eq!(fit.residuals().sum(), 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.fit_statistics().r_squared.unwrap(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn exact_fit_omits_likelihood_stats() {
        let fit = LinearFit::fit(simple_design()).unwrap();
        let stats = fit.fit_statistics();

        assert_abs_diff_eq!(stats.r_squared.unwrap(), 1.0, epsilon = 1e-10);
        assert_eq!(stats.log_likelihood, None);
        assert_eq!(stats.aic, None);
        assert_eq!(stats.bic, None);
    }

    #[test]
    fn recovers_coefficients_under_noise() {
        use rand::{rngs::StdRng, SeedableRng};
        use rand_distr::{Distribution, Normal};

        let mut rng = StdRng::seed_from_u64(42);
        let noise = Normal::new(0.0, 0.1).unwrap();

        let n = 200;
        let mut x = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let a = i as f64 / 20.0;
            let b = ((i * 7) % 13) as f64 / 13.0;
            x[(i, 0)] = a;
            x[(i, 1)] = b;
            y[i] = 2.0 + 0.5 * a - 1.5 * b + noise.sample(&mut rng);
        }
        let d = Design::with_intercept(x, y, vec!["a".into(), "b".into()]).unwrap();
        let fit = LinearFit::fit(d).unwrap();

        assert_abs_diff_eq!(fit.coefficients()[0], 2.0, epsilon = 0.1);
        assert_abs_diff_eq!(fit.coefficients()[1], 0.5, epsilon = 0.05);
        assert_abs_diff_eq!(fit.coefficients()[2], -1.5, epsilon = 0.1);
    }

    #[test]
    fn covariance_is_symmetric() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![3.1, 4.8, 7.2, 8.9, 11.1];
        let d = Design::with_intercept(x, y, vec!["x".into()]).unwrap();
        let fit = LinearFit::fit(d).unwrap();

        let cov = fit.covariance();
        assert_abs_diff_eq!(cov[(0, 1)], cov[(1, 0)], epsilon = 1e-12);
        assert!(cov[(0, 0)] > 0.0);
        assert!(cov[(1, 1)] > 0.0);
    }

    #[test]
    fn too_few_observations_fail() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let y = array![1.0, 2.0];
        let d = Design::with_intercept(x, y, vec!["a".into(), "b".into()]).unwrap();

        let err = LinearFit::fit(d).unwrap_err();
        assert!(matches!(err, SummError::Estimation { .. }));
    }

    #[test]
    fn refit_leaves_original_untouched() {
        let fit = LinearFit::fit(simple_design()).unwrap();
        let before = fit.coefficients().clone();

        let centered = regsum_core::transform::center(fit.design());
        let refit = fit.refit(&centered).unwrap();

        assert_abs_diff_eq!(fit.coefficients()[0], before[0], epsilon = 1e-12);
        // Centering moves the intercept to the response mean, slope unchanged
        assert_abs_diff_eq!(refit.coefficients()[0], 7.0, epsilon = 1e-10);
        assert_abs_diff_eq!(refit.coefficients()[1], 2.0, epsilon = 1e-10);
    }
}
