//! Model-agnostic summary builder
//!
//! [`summ`] turns a fitted model plus a [`SummaryConfig`] into a
//! [`SummaryResult`]: one [`CoefficientRow`] per term in native order,
//! display-rounded, with the unrounded copy retained alongside. All
//! option handling lives here; the statistically heavy lifting
//! (refits, covariance assembly, distribution quantiles) is delegated.

use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use regsum_core::{options, transform};

use crate::covariance::{self, HcVariant};
use crate::error::SummError;
use crate::model::{FitStatistics, FittedModel, ModelFamily};
use crate::vif;
use crate::Result;


// ==================== Configuration ====================

/// Cluster specification for cluster-robust standard errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cluster {
    /// Name of a grouping column attached to the design
    Variable(String),
    /// Explicit group id per observation
    Groups(Vec<usize>),
}

/// Options controlling the shape of a summary
///
/// Immutable once handed to [`summ`]; construct with the chainable
/// setters or fill the public fields directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Heteroskedasticity-robust standard errors, by HC variant
    pub robust: Option<HcVariant>,
    /// Cluster-robust grouping; requires `robust`
    pub cluster: Option<Cluster>,
    /// Standardize predictors (refitting the model)
    pub scale: bool,
    /// Standardization divisor, in standard deviations
    pub n_sd: f64,
    /// Apply the standardization to the response as well
    pub scale_response: bool,
    /// Mean-center predictors without rescaling (refitting the model)
    pub center: bool,
    /// Report confidence intervals
    pub confint: bool,
    /// Confidence level, in (0, 1)
    pub ci_width: f64,
    /// Report p-values
    pub pvals: bool,
    /// Exponentiate estimates and interval bounds (log links only)
    pub odds_ratio: bool,
    /// Append a VIF column
    pub vifs: bool,
    /// Display rounding; falls back to the process-wide default, then 2
    pub digits: Option<usize>,
    /// Render the model info header block
    pub model_info: bool,
    /// Render the model fit header block
    pub model_fit: bool,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            robust: None,
            cluster: None,
            scale: false,
            n_sd: 1.0,
            scale_response: false,
            center: false,
            confint: false,
            ci_width: 0.95,
            pvals: true,
            odds_ratio: false,
            vifs: false,
            digits: None,
            model_info: true,
            model_fit: true,
        }
    }
}

impl SummaryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request robust standard errors of the given variant
    pub fn robust(mut self, hc: HcVariant) -> Self {
        self.robust = Some(hc);
        self
    }

    /// Request cluster-robust standard errors (also needs `robust`)
    pub fn cluster(mut self, cluster: Cluster) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Standardize predictors by `n_sd` standard deviations before refitting
    pub fn scale(mut self, n_sd: f64) -> Self {
        self.scale = true;
        self.n_sd = n_sd;
        self
    }

    /// Standardize the response along with the predictors
    pub fn scale_response(mut self) -> Self {
        self.scale_response = true;
        self
    }

    /// Mean-center predictors before refitting
    pub fn center(mut self) -> Self {
        self.center = true;
        self
    }

    /// Report confidence intervals at the given level
    pub fn confint(mut self, ci_width: f64) -> Self {
        self.confint = true;
        self.ci_width = ci_width;
        self
    }

    /// Omit p-values
    pub fn without_pvals(mut self) -> Self {
        self.pvals = false;
        self
    }

    /// Exponentiate estimates and bounds
    pub fn odds_ratio(mut self) -> Self {
        self.odds_ratio = true;
        self
    }

    /// Append variance inflation factors
    pub fn vifs(mut self) -> Self {
        self.vifs = true;
        self
    }

    /// Set display rounding explicitly
    pub fn digits(mut self, digits: usize) -> Self {
        self.digits = Some(digits);
        self
    }

    /// Skip the model info header when rendering
    pub fn without_model_info(mut self) -> Self {
        self.model_info = false;
        self
    }

    /// Skip the model fit header when rendering
    pub fn without_model_fit(mut self) -> Self {
        self.model_fit = false;
        self
    }
}

// ==================== Result types ====================

/// One summary row per model term
///
/// Nullable fields are governed strictly by the configuration: odds
/// ratios null the standard error, `pvals = false` nulls the p-value,
/// and families without a reference distribution null the statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    /// Term name
    pub term: String,
    /// Point estimate (exponentiated when odds ratios are requested)
    pub estimate: f64,
    /// Standard error
    pub std_error: Option<f64>,
    /// Test statistic (t or z)
    pub statistic: Option<f64>,
    /// Two-tailed p-value
    pub p_value: Option<f64>,
    /// Lower confidence bound
    pub conf_low: Option<f64>,
    /// Upper confidence bound
    pub conf_high: Option<f64>,
    /// Variance inflation factor (predictor terms only)
    pub vif: Option<f64>,
}

impl CoefficientRow {
    fn rounded(&self, digits: usize) -> Self {
        Self {
            term: self.term.clone(),
            estimate: round_to(self.estimate, digits),
            std_error: self.std_error.map(|v| round_to(v, digits)),
            statistic: self.statistic.map(|v| round_to(v, digits)),
            p_value: self.p_value.map(|v| round_to(v, digits)),
            conf_low: self.conf_low.map(|v| round_to(v, digits)),
            conf_high: self.conf_high.map(|v| round_to(v, digits)),
            vif: self.vif.map(|v| round_to(v, digits)),
        }
    }
}

/// Reference distribution used for statistics, p-values and intervals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReferenceDist {
    /// Student's t with the given degrees of freedom
    T { df: f64 },
    /// Standard normal
    Normal,
    /// No valid reference distribution; inference omitted
    Omitted,
}

/// Complete summary of a fitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResult {
    /// Family of the summarized model
    pub family: ModelFamily,
    /// Number of observations
    pub n_obs: usize,
    /// Fit statistics for the header
    pub fit: FitStatistics,
    /// Coefficient rows, rounded to `digits` for display
    pub rows: Vec<CoefficientRow>,
    /// The same rows with full precision, for programmatic reuse
    pub exact: Vec<CoefficientRow>,
    /// Warning-level notes attached during the build
    pub notes: Vec<String>,
    /// Resolved display digits
    pub digits: usize,
    /// Whether estimates and bounds are exponentiated
    pub exponentiated: bool,
    /// Reference distribution used for inference
    pub reference: ReferenceDist,
    /// Confidence level of the bounds, when any were computed
    pub ci_width: Option<f64>,
    /// Render the model info header
    pub model_info: bool,
    /// Render the model fit header
    pub model_fit: bool,
}

// ==================== Builder ====================

/// Build a summary of `model` under `config`
///
/// Fails with a typed [`SummError`] when options are incompatible with
/// the model family or a delegated computation fails; never returns a
/// partially-built result. The input model is not mutated; scaling and
/// centering refit a fresh model on a transformed design.
pub fn summ(model: &dyn FittedModel, config: &SummaryConfig) -> Result<SummaryResult> {
    validate_config(config)?;
    let digits = options::resolve_digits(config.digits);

    let family = model.family().clone();
    if let ModelFamily::Other(name) = &family {
        return Err(SummError::UnsupportedModel {
            family: name.clone(),
        });
    }

    let mut notes = Vec::new();

    // Transform-then-refit; the original model stays untouched
    let refitted: Box<dyn FittedModel>;
    let model: &dyn FittedModel = if config.scale {
        let transformed =
            transform::standardize(model.design(), config.n_sd, config.scale_response)?;
        refitted = model.refit(&transformed)?;
        notes.push(format!(
            "Continuous predictors are mean-centered and scaled by {} s.d.",
            config.n_sd
        ));
        refitted.as_ref()
    } else if config.center {
        let transformed = transform::center(model.design());
        refitted = model.refit(&transformed)?;
        notes.push("Continuous predictors are mean-centered.".to_string());
        refitted.as_ref()
    } else {
        model
    };

    let covariance = select_covariance(model, &family, config, &mut notes)?;
    let robust_in_effect =
        config.robust.is_some() && !matches!(family, ModelFamily::SurveyWeighted);

    let reference = match &family {
        ModelFamily::Linear => {
            if robust_in_effect {
                ReferenceDist::Normal
            } else {
                match model.df_residual() {
                    Some(df) => ReferenceDist::T { df },
                    None => ReferenceDist::Normal,
                }
            }
        }
        ModelFamily::GeneralizedLinear { .. } => ReferenceDist::Normal,
        ModelFamily::SurveyWeighted => match model.df_residual() {
            Some(df) => ReferenceDist::T { df },
            None => ReferenceDist::Normal,
        },
        ModelFamily::MixedEffects => match model.approx_df() {
            Some(df) => ReferenceDist::T { df },
            None => {
                notes.push(
                    "p-values and confidence intervals are omitted: no degrees-of-freedom \
                     approximation is available for this mixed model."
                        .to_string(),
                );
                ReferenceDist::Omitted
            }
        },
        ModelFamily::Other(_) => unreachable!("rejected at dispatch"),
    };

    if config.odds_ratio {
        let log_scale = matches!(
            &family,
            ModelFamily::GeneralizedLinear { link, .. } if link.is_log_scale()
        );
        if !log_scale {
            return Err(SummError::config(format!(
                "odds ratios require a log or logit link, but the model family is {}",
                family
            )));
        }
    }

    let vifs = if config.vifs {
        let design = model.design();
        if design.n_predictors() < 2 {
            return Err(SummError::config(format!(
                "VIFs require at least two predictor terms; this model has {}",
                design.n_predictors()
            )));
        }
        Some(vif::variance_inflation_factors(design)?)
    } else {
        None
    };

    let want_ci = config.confint || config.odds_ratio;
    let ci_width = if want_ci && !matches!(reference, ReferenceDist::Omitted) {
        Some(config.ci_width)
    } else {
        None
    };
    let crit = match ci_width {
        Some(width) => Some(critical_value(reference, width)?),
        None => None,
    };

    let coefficients = model.coefficients();
    let terms = model.term_names();
    let std_errors: Vec<f64> = (0..covariance.nrows())
        .map(|i| covariance[(i, i)].max(0.0).sqrt())
        .collect();
    if coefficients.len() != terms.len() || coefficients.len() != std_errors.len() {
        return Err(SummError::estimation(
            "summary assembly",
            "coefficients, terms and covariance disagree in length",
        ));
    }

    let has_intercept = model.design().has_intercept();
    let mut exact = Vec::with_capacity(terms.len());
    for (i, term) in terms.iter().enumerate() {
        let estimate = coefficients[i];
        let se = std_errors[i];

        let statistic = match reference {
            ReferenceDist::Omitted => None,
            _ => Some(estimate / se),
        };
        let p_value = match (config.pvals, statistic) {
            (true, Some(s)) => two_tailed(s, reference)?,
            _ => None,
        };
        let (mut conf_low, mut conf_high) = match crit {
            Some(c) => (Some(estimate - c * se), Some(estimate + c * se)),
            None => (None, None),
        };

        let mut estimate_out = estimate;
        let mut std_error = Some(se);
        if config.odds_ratio {
            estimate_out = estimate.exp();
            conf_low = conf_low.map(f64::exp);
            conf_high = conf_high.map(f64::exp);
            // The exponentiated interval is asymmetric; a symmetric SE
            // would misrepresent it.
            std_error = None;
        }

        let vif = match &vifs {
            Some(v) if !(has_intercept && i == 0) => {
                let offset = usize::from(has_intercept);
                v.get(i - offset).copied()
            }
            _ => None,
        };

        exact.push(CoefficientRow {
            term: term.clone(),
            estimate: estimate_out,
            std_error,
            statistic,
            p_value,
            conf_low,
            conf_high,
            vif,
        });
    }

    let rows = exact.iter().map(|r| r.rounded(digits)).collect();

    Ok(SummaryResult {
        family,
        n_obs: model.n_obs(),
        fit: model.fit_statistics(),
        rows,
        exact,
        notes,
        digits,
        exponentiated: config.odds_ratio,
        reference,
        ci_width,
        model_info: config.model_info,
        model_fit: config.model_fit,
    })
}

fn validate_config(config: &SummaryConfig) -> Result<()> {
    if !config.ci_width.is_finite() || config.ci_width <= 0.0 || config.ci_width >= 1.0 {
        return Err(SummError::config(format!(
            "ci_width must lie in (0, 1), got {}",
            config.ci_width
        )));
    }
    if config.cluster.is_some() && config.robust.is_none() {
        return Err(SummError::config(
            "cluster-robust standard errors require a robust variant (set robust to HC0..HC5)",
        ));
    }
    if config.scale && (!config.n_sd.is_finite() || config.n_sd <= 0.0) {
        return Err(SummError::config(format!(
            "n_sd must be positive, got {}",
            config.n_sd
        )));
    }
    Ok(())
}

fn select_covariance(
    model: &dyn FittedModel,
    family: &ModelFamily,
    config: &SummaryConfig,
    notes: &mut Vec<String>,
) -> Result<Array2<f64>> {
    let Some(hc) = config.robust else {
        return Ok(model.covariance().clone());
    };

    match family {
        ModelFamily::SurveyWeighted => {
            let dropped = if config.cluster.is_some() {
                "the robust and cluster requests were ignored"
            } else {
                "the request was ignored"
            };
            notes.push(format!(
                "{} robust standard errors were requested, but survey-weighted standard \
                 errors are already design-based; {}.",
                hc, dropped
            ));
            Ok(model.covariance().clone())
        }
        ModelFamily::MixedEffects => Err(SummError::config(format!(
            "robust standard errors ({}) are not supported for mixed-effects models",
            hc
        ))),
        _ => {
            let parts = model.score_parts().ok_or_else(|| {
                SummError::estimation(
                    "robust covariance",
                    format!("the {} model exposes no score residuals", family),
                )
            })?;

            match &config.cluster {
                None => {
                    notes.push(format!("Standard errors: {} robust.", hc));
                    covariance::hc_covariance(&parts.rows, &parts.scores, &parts.bread, hc)
                }
                Some(cluster) => {
                    let (groups, label) = match cluster {
                        Cluster::Variable(name) => (
                            model.design().group(name)?.to_vec(),
                            format!("grouped by '{}'", name),
                        ),
                        Cluster::Groups(groups) => {
                            if groups.len() != model.n_obs() {
                                return Err(SummError::config(format!(
                                    "cluster vector has {} entries for {} observations",
                                    groups.len(),
                                    model.n_obs()
                                )));
                            }
                            (groups.clone(), "grouped by a supplied vector".to_string())
                        }
                    };
                    notes.push(format!(
                        "Standard errors: cluster-robust ({}, {}).",
                        hc, label
                    ));
                    covariance::cluster_covariance(&parts.rows, &parts.scores, &parts.bread, &groups)
                }
            }
        }
    }
}

fn two_tailed(statistic: f64, reference: ReferenceDist) -> Result<Option<f64>> {
    let p = match reference {
        ReferenceDist::Omitted => return Ok(None),
        ReferenceDist::Normal => {
            let dist = Normal::new(0.0, 1.0).map_err(|e| {
                SummError::estimation("inference", format!("failed to create normal: {}", e))
            })?;
            2.0 * (1.0 - dist.cdf(statistic.abs()))
        }
        ReferenceDist::T { df } => {
            let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| {
                SummError::estimation(
                    "inference",
                    format!("failed to create t-distribution (df = {}): {}", df, e),
                )
            })?;
            2.0 * (1.0 - dist.cdf(statistic.abs()))
        }
    };
    Ok(Some(p.clamp(0.0, 1.0)))
}

fn critical_value(reference: ReferenceDist, ci_width: f64) -> Result<f64> {
    let q = 1.0 - (1.0 - ci_width) / 2.0;
    match reference {
        ReferenceDist::Omitted => Err(SummError::estimation(
            "inference",
            "no reference distribution available for interval bounds",
        )),
        ReferenceDist::Normal => {
            let dist = Normal::new(0.0, 1.0).map_err(|e| {
                SummError::estimation("inference", format!("failed to create normal: {}", e))
            })?;
            Ok(dist.inverse_cdf(q))
        }
        ReferenceDist::T { df } => {
            let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| {
                SummError::estimation(
                    "inference",
                    format!("failed to create t-distribution (df = {}): {}", df, e),
                )
            })?;
            Ok(dist.inverse_cdf(q))
        }
    }
}

fn round_to(value: f64, digits: usize) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

// ==================== Rendering ====================

impl fmt::Display for SummaryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.digits;

        if self.model_info {
            writeln!(f, "MODEL INFO:")?;
            writeln!(f, "Observations: {}", self.n_obs)?;
            writeln!(f, "Family: {}", self.family)?;
            writeln!(f)?;
        }

        if self.model_fit {
            writeln!(f, "MODEL FIT:")?;
            if let Some(r2) = self.fit.r_squared {
                writeln!(f, "  R-squared: {:.*}", d, r2)?;
            }
            if let Some(adj) = self.fit.adj_r_squared {
                writeln!(f, "  Adjusted R-squared: {:.*}", d, adj)?;
            }
            if let Some(p) = self.fit.pseudo_r_squared {
                writeln!(f, "  Pseudo R-squared: {:.*}", d, p)?;
            }
            if let Some(m) = self.fit.marginal_r_squared {
                writeln!(f, "  Marginal R-squared: {:.*}", d, m)?;
            }
            if let Some(c) = self.fit.conditional_r_squared {
                writeln!(f, "  Conditional R-squared: {:.*}", d, c)?;
            }
            if let Some(dev) = self.fit.residual_deviance {
                writeln!(f, "  Residual deviance: {:.*}", d, dev)?;
            }
            if let Some(dev) = self.fit.null_deviance {
                writeln!(f, "  Null deviance: {:.*}", d, dev)?;
            }
            if let Some(fs) = self.fit.f_statistic {
                writeln!(f, "  F-statistic: {:.*}", d, fs)?;
            }
            if let Some(aic) = self.fit.aic {
                writeln!(f, "  AIC: {:.*}", d, aic)?;
            }
            if let Some(bic) = self.fit.bic {
                writeln!(f, "  BIC: {:.*}", d, bic)?;
            }
            if let Some(se) = self.fit.residual_std_error {
                writeln!(f, "  Residual Std. Error: {:.*}", d, se)?;
            }
            writeln!(f)?;
        }

        let has_se = self.rows.iter().any(|r| r.std_error.is_some());
        let has_stat = self.rows.iter().any(|r| r.statistic.is_some());
        let has_p = self.rows.iter().any(|r| r.p_value.is_some());
        let has_ci = self.rows.iter().any(|r| r.conf_low.is_some());
        let has_vif = self.rows.iter().any(|r| r.vif.is_some());

        let est_label = if self.exponentiated { "exp(Est.)" } else { "Est." };
        let stat_label = match self.reference {
            ReferenceDist::T { .. } => "t val.",
            _ => "z val.",
        };

        write!(f, "{:<20} {:>12}", "Term", est_label)?;
        if has_se {
            write!(f, " {:>12}", "S.E.")?;
        }
        if has_ci {
            let width = self.ci_width.unwrap_or(0.95);
            let lo = 100.0 * (1.0 - width) / 2.0;
            let hi = 100.0 - lo;
            write!(f, " {:>12} {:>12}", format!("{:.1}%", lo), format!("{:.1}%", hi))?;
        }
        if has_stat {
            write!(f, " {:>12}", stat_label)?;
        }
        if has_p {
            write!(f, " {:>12}", "p")?;
        }
        if has_vif {
            write!(f, " {:>12}", "VIF")?;
        }
        writeln!(f)?;

        for row in &self.rows {
            write!(f, "{:<20} {:>12}", row.term, cell(Some(row.estimate), d))?;
            if has_se {
                write!(f, " {:>12}", cell(row.std_error, d))?;
            }
            if has_ci {
                write!(
                    f,
                    " {:>12} {:>12}",
                    cell(row.conf_low, d),
                    cell(row.conf_high, d)
                )?;
            }
            if has_stat {
                write!(f, " {:>12}", cell(row.statistic, d))?;
            }
            if has_p {
                write!(f, " {:>12}", cell(row.p_value, d))?;
            }
            if has_vif {
                write!(f, " {:>12}", cell(row.vif, d))?;
            }
            writeln!(f)?;
        }

        if !self.notes.is_empty() {
            writeln!(f)?;
            for note in &self.notes {
                writeln!(f, "Note: {}", note)?;
            }
        }

        Ok(())
    }
}

fn cell(value: Option<f64>, digits: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", digits, v),
        None => String::new(),
    }
}
