//! Generalized linear fitted-model adapter
//!
//! A thin IRLS driver: each iteration linearizes the problem into a
//! working response and weights, then delegates to an `ndarray-linalg`
//! weighted least-squares call. Non-convergence is an estimation
//! failure, never a silently degraded fit.

use ndarray::{Array1, Array2};
use ndarray_linalg::{Inverse, LeastSquaresSvd};
use statrs::function::gamma::ln_gamma;

use regsum_core::{Design, Vector};

use crate::error::SummError;
use crate::model::{FitStatistics, FittedModel, GlmFamily, Link, ModelFamily, ScoreParts};
use crate::Result;

const MAX_ITERATIONS: usize = 25;
const TOLERANCE: f64 = 1e-8;
const MIN_WEIGHT: f64 = 1e-10;
const MU_EPS: f64 = 1e-10;

impl Link {
    fn apply(&self, mu: f64) -> f64 {
        match self {
            Link::Identity => mu,
            Link::Logit => (mu / (1.0 - mu)).ln(),
            Link::Log => mu.ln(),
        }
    }

    fn inverse(&self, eta: f64) -> f64 {
        match self {
            Link::Identity => eta,
            Link::Logit => 1.0 / (1.0 + (-eta).exp()),
            Link::Log => eta.exp(),
        }
    }

    /// dη/dμ
    fn derivative(&self, mu: f64) -> f64 {
        match self {
            Link::Identity => 1.0,
            Link::Logit => 1.0 / (mu * (1.0 - mu)),
            Link::Log => 1.0 / mu,
        }
    }
}

impl GlmFamily {
    /// Canonical link
    pub fn default_link(&self) -> Link {
        match self {
            GlmFamily::Gaussian => Link::Identity,
            GlmFamily::Binomial => Link::Logit,
            GlmFamily::Poisson => Link::Log,
        }
    }

    fn variance(&self, mu: f64) -> f64 {
        match self {
            GlmFamily::Gaussian => 1.0,
            GlmFamily::Binomial => mu * (1.0 - mu),
            GlmFamily::Poisson => mu,
        }
    }

    fn clamp_mu(&self, mu: f64) -> f64 {
        match self {
            GlmFamily::Gaussian => mu,
            GlmFamily::Binomial => mu.clamp(MU_EPS, 1.0 - MU_EPS),
            GlmFamily::Poisson => mu.max(MU_EPS),
        }
    }

    fn initialize(&self, y: f64) -> f64 {
        match self {
            GlmFamily::Gaussian => y,
            GlmFamily::Binomial => (y + 0.5) / 2.0,
            GlmFamily::Poisson => y + 0.1,
        }
    }

    /// Unit deviance contribution
    fn deviance(&self, y: f64, mu: f64) -> f64 {
        match self {
            GlmFamily::Gaussian => (y - mu) * (y - mu),
            GlmFamily::Binomial => {
                let a = if y > 0.0 { y * (y / mu).ln() } else { 0.0 };
                let b = if y < 1.0 {
                    (1.0 - y) * ((1.0 - y) / (1.0 - mu)).ln()
                } else {
                    0.0
                };
                2.0 * (a + b)
            }
            GlmFamily::Poisson => {
                if y > 0.0 {
                    2.0 * (y * (y / mu).ln() - (y - mu))
                } else {
                    2.0 * mu
                }
            }
        }
    }

    fn validate_response(&self, y: &Vector) -> Result<()> {
        let ok = match self {
            GlmFamily::Gaussian => y.iter().all(|v| v.is_finite()),
            GlmFamily::Binomial => y.iter().all(|&v| (0.0..=1.0).contains(&v)),
            GlmFamily::Poisson => y.iter().all(|&v| v.is_finite() && v >= 0.0),
        };
        if ok {
            Ok(())
        } else {
            Err(SummError::estimation(
                "fit",
                format!("response is outside the {} family domain", self),
            ))
        }
    }

    fn log_likelihood(&self, y: &Vector, mu: &Vector) -> f64 {
        let n = y.len() as f64;
        match self {
            GlmFamily::Gaussian => {
                let rss: f64 = y
                    .iter()
                    .zip(mu.iter())
                    .map(|(&yi, &mi)| (yi - mi) * (yi - mi))
                    .sum();
                -0.5 * n * ((2.0 * std::f64::consts::PI * rss / n).ln() + 1.0)
            }
            GlmFamily::Binomial => y
                .iter()
                .zip(mu.iter())
                .map(|(&yi, &mi)| yi * mi.ln() + (1.0 - yi) * (1.0 - mi).ln())
                .sum(),
            GlmFamily::Poisson => y
                .iter()
                .zip(mu.iter())
                .map(|(&yi, &mi)| yi * mi.ln() - mi - ln_gamma(yi + 1.0))
                .sum(),
        }
    }
}

/// A fitted generalized linear model
#[derive(Debug, Clone)]
pub struct GlmFit {
    family: ModelFamily,
    glm_family: GlmFamily,
    link: Link,
    design: Design,
    coefficients: Vector,
    fitted_values: Vector,
    irls_weights: Vector,
    score_residuals: Vector,
    unscaled: Array2<f64>,
    covariance: Array2<f64>,
    stats: FitStatistics,
}

impl GlmFit {
    /// Fit with the family's canonical link
    pub fn fit(design: Design, family: GlmFamily) -> Result<Self> {
        let link = family.default_link();
        Self::fit_with_link(design, family, link)
    }

    /// Fit with an explicit link
    pub fn fit_with_link(design: Design, family: GlmFamily, link: Link) -> Result<Self> {
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
        family.validate_response(y)?;

        let prior: Vector = match design.weights() {
            Some(w) => w.clone(),
            None => Array1::ones(n),
        };

        let mut mu: Vector = y.mapv(|v| family.clamp_mu(family.initialize(v)));
        let mut eta: Vector = mu.mapv(|m| link.apply(m));
        let mut coefficients = Array1::zeros(p);
        let mut weights = Array1::ones(n);

        let mut deviance: f64 = y
            .iter()
            .zip(mu.iter())
            .zip(prior.iter())
            .map(|((&yi, &mi), &wi)| wi * family.deviance(yi, mi))
            .sum();
        let mut converged = false;

        for _ in 0..MAX_ITERATIONS {
            // Working weights and response
            for i in 0..n {
                let g_prime = link.derivative(mu[i]);
                let var = family.variance(mu[i]).max(MU_EPS);
                weights[i] = (prior[i] / (var * g_prime * g_prime)).max(MIN_WEIGHT);
            }
            let z: Vector = (0..n)
                .map(|i| eta[i] + (y[i] - mu[i]) * link.derivative(mu[i]))
                .collect();

            // Weighted least squares on sqrt-weight adjusted rows
            let sqrt_w = weights.mapv(f64::sqrt);
            let mut xw = x.clone();
            for (i, mut row) in xw.rows_mut().into_iter().enumerate() {
                row.mapv_inplace(|v| v * sqrt_w[i]);
            }
            let zw: Vector = (0..n).map(|i| z[i] * sqrt_w[i]).collect();

            coefficients = xw
                .least_squares(&zw)
                .map_err(|e| {
                    SummError::estimation("irls", format!("weighted least squares failed: {}", e))
                })?
                .solution;

            eta = x.dot(&coefficients);
            mu = eta.mapv(|e| family.clamp_mu(link.inverse(e)));

            let new_deviance: f64 = y
                .iter()
                .zip(mu.iter())
                .zip(prior.iter())
                .map(|((&yi, &mi), &wi)| wi * family.deviance(yi, mi))
                .sum();

            if ((deviance - new_deviance).abs() / (deviance.abs() + 0.1)) < TOLERANCE {
                deviance = new_deviance;
                converged = true;
                break;
            }
            deviance = new_deviance;
        }

        if !converged {
            return Err(SummError::estimation(
                "irls",
                format!("did not converge after {} iterations", MAX_ITERATIONS),
            ));
        }

        // Final weighted cross-product for the bread
        let sqrt_w = weights.mapv(f64::sqrt);
        let mut xw = x.clone();
        for (i, mut row) in xw.rows_mut().into_iter().enumerate() {
            row.mapv_inplace(|v| v * sqrt_w[i]);
        }
        let unscaled = xw.t().dot(&xw).inv().map_err(|e| {
            SummError::estimation("irls", format!("failed to invert X'WX: {}", e))
        })?;

        let dispersion = match family {
            GlmFamily::Gaussian => {
                let rss: f64 = y
                    .iter()
                    .zip(mu.iter())
                    .zip(prior.iter())
                    .map(|((&yi, &mi), &wi)| wi * (yi - mi) * (yi - mi))
                    .sum();
                rss / (n - p) as f64
            }
            GlmFamily::Binomial | GlmFamily::Poisson => 1.0,
        };
        let covariance = &unscaled * dispersion;

        let score_residuals: Vector = (0..n)
            .map(|i| weights[i] * (y[i] - mu[i]) * link.derivative(mu[i]))
            .collect();

        // Null deviance from the intercept-only (weighted mean) fit
        let w_sum = prior.sum();
        let y_bar = family.clamp_mu(
            y.iter()
                .zip(prior.iter())
                .map(|(&yi, &wi)| yi * wi)
                .sum::<f64>()
                / w_sum,
        );
        let null_deviance: f64 = y
            .iter()
            .zip(prior.iter())
            .map(|(&yi, &wi)| wi * family.deviance(yi, y_bar))
            .sum();

        let pseudo_r_squared = match family {
            GlmFamily::Gaussian => None,
            _ if null_deviance > 1e-12 => Some(1.0 - deviance / null_deviance),
            _ => None,
        };

        let log_likelihood = family.log_likelihood(y, &mu);
        let aic = 2.0 * p as f64 - 2.0 * log_likelihood;
        let bic = (n as f64).ln() * p as f64 - 2.0 * log_likelihood;

        let stats = FitStatistics {
            residual_deviance: Some(deviance),
            null_deviance: Some(null_deviance),
            pseudo_r_squared,
            log_likelihood: Some(log_likelihood),
            aic: Some(aic),
            bic: Some(bic),
            df_residual: Some((n - p) as f64),
            converged: Some(true),
            ..FitStatistics::default()
        };

        Ok(Self {
            family: ModelFamily::GeneralizedLinear { family, link },
            glm_family: family,
            link,
            design,
            coefficients,
            fitted_values: mu,
            irls_weights: weights,
            score_residuals,
            unscaled,
            covariance,
            stats,
        })
    }

    /// Fitted means μ
    pub fn fitted_values(&self) -> &Vector {
        &self.fitted_values
    }

    /// The link the model was fitted with
    pub fn link(&self) -> Link {
        self.link
    }
}

impl FittedModel for GlmFit {
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
        let sqrt_w = self.irls_weights.mapv(f64::sqrt);
        let mut rows = self.design.x().clone();
        for (i, mut row) in rows.rows_mut().into_iter().enumerate() {
            row.mapv_inplace(|v| v * sqrt_w[i]);
        }
        let scores: Vector = (0..self.design.n_obs())
            .map(|i| self.score_residuals[i] / sqrt_w[i])
            .collect();

        Some(ScoreParts {
            rows,
            scores,
            bread: self.unscaled.clone(),
        })
    }

    fn refit(&self, design: &Design) -> Result<Box<dyn FittedModel>> {
        Ok(Box::new(Self::fit_with_link(
            design.clone(),
            self.glm_family,
            self.link,
        )?))
    }
}
