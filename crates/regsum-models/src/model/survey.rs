//! Survey-weighted fitted-model adapter
//!
//! Probability-weighted least squares with a design-based linearized
//! covariance. The covariance is already a sandwich built from the
//! survey weights, so robust-SE requests on this family are redundant;
//! the builder degrades them to a note instead of recomputing.

use ndarray::{Array1, Array2};
use ndarray_linalg::{Inverse, LeastSquaresSvd};

use regsum_core::{Design, Vector};

use crate::error::SummError;
use crate::model::{FitStatistics, FittedModel, ModelFamily, ScoreParts};
use crate::Result;

/// A fitted survey-weighted linear model
#[derive(Debug, Clone)]
pub struct SurveyFit {
    family: ModelFamily,
    design: Design,
    coefficients: Vector,
    residuals: Vector,
    covariance: Array2<f64>,
    stats: FitStatistics,
}

impl SurveyFit {
    /// Fit by probability-weighted least squares
    ///
    /// The design must carry observation weights.
    pub fn fit(design: Design) -> Result<Self> {
        let weights = design
            .weights()
            .ok_or_else(|| {
                SummError::config(
                    "survey-weighted models require observation weights on the design",
                )
            })?
            .clone();

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

        // Weighted least squares through sqrt-weight adjusted rows
        let sqrt_w = weights.mapv(f64::sqrt);
        let mut xw = x.clone();
        for (i, mut row) in xw.rows_mut().into_iter().enumerate() {
            row.mapv_inplace(|v| v * sqrt_w[i]);
        }
        let yw: Vector = (0..n).map(|i| y[i] * sqrt_w[i]).collect();

        let coefficients = xw
            .least_squares(&yw)
            .map_err(|e| {
                SummError::estimation("fit", format!("weighted least squares failed: {}", e))
            })?
            .solution;

        let fitted = x.dot(&coefficients);
        let residuals = y - &fitted;

        let bread = xw.t().dot(&xw).inv().map_err(|e| {
            SummError::estimation("fit", format!("failed to invert X'WX: {}", e))
        })?;

        // Linearized (design-based) variance: sandwich over weighted
        // score contributions w_i * e_i * x_i, with an n/(n-1) factor.
        let mut meat = Array2::zeros((p, p));
        for i in 0..n {
            let s = weights[i] * residuals[i];
            let xi = x.row(i);
            for a in 0..p {
                for b in 0..p {
                    meat[(a, b)] += s * s * xi[a] * xi[b];
                }
            }
        }
        let covariance = bread.dot(&meat).dot(&bread) * (n as f64 / (n as f64 - 1.0));

        // Weighted R-squared
        let w_sum = weights.sum();
        let y_bar = y
            .iter()
            .zip(weights.iter())
            .map(|(&yi, &wi)| yi * wi)
            .sum::<f64>()
            / w_sum;
        let rss: f64 = residuals
            .iter()
            .zip(weights.iter())
            .map(|(&e, &wi)| wi * e * e)
            .sum();
        let tss: f64 = y
            .iter()
            .zip(weights.iter())
            .map(|(&yi, &wi)| wi * (yi - y_bar) * (yi - y_bar))
            .sum();
        let r_squared = if tss > 1e-12 { Some(1.0 - rss / tss) } else { None };

        let stats = FitStatistics {
            r_squared,
            residual_std_error: Some((rss / (n - p) as f64).sqrt()),
            df_residual: Some((n - p) as f64),
            converged: Some(true),
            ..FitStatistics::default()
        };

        Ok(Self {
            family: ModelFamily::SurveyWeighted,
            design,
            coefficients,
            residuals,
            covariance,
            stats,
        })
    }

    /// Residuals on the response scale
    pub fn residuals(&self) -> &Vector {
        &self.residuals
    }
}

impl FittedModel for SurveyFit {
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
        // The native covariance is already a sandwich; robust requests
        // are soft-ignored upstream.
        None
    }

    fn refit(&self, design: &Design) -> Result<Box<dyn FittedModel>> {
        Ok(Box::new(Self::fit(design.clone())?))
    }
}
