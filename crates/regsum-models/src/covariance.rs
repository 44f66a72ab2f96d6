//! Robust covariance assembly
//!
//! Heteroskedasticity-consistent (HC0–HC5) and cluster-robust (CR1)
//! sandwich estimators, built from the score parts a model exposes:
//! `cov = bread · meat · bread` where the meat aggregates per-observation
//! (or per-cluster) score contributions.

use std::fmt;

use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::SummError;
use crate::Result;

/// Guard against division by (1 - h) for leverage-one rows
const MIN_LEVERAGE_GAP: f64 = 1e-10;

/// Heteroskedasticity-consistent covariance variants
///
/// The variants differ only in the small-sample adjustment applied to
/// each squared score before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HcVariant {
    /// White's original estimator, no correction
    HC0,
    /// Degrees-of-freedom correction n/(n-k)
    HC1,
    /// Leverage correction 1/(1-h)
    HC2,
    /// Leverage correction 1/(1-h)^2
    HC3,
    /// Cribari-Neto adaptive exponent, capped at 4
    HC4,
    /// Cribari-Neto/Souza/Vasconcellos variant with square-root damping
    HC5,
}

impl fmt::Display for HcVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HcVariant::HC0 => write!(f, "HC0"),
            HcVariant::HC1 => write!(f, "HC1"),
            HcVariant::HC2 => write!(f, "HC2"),
            HcVariant::HC3 => write!(f, "HC3"),
            HcVariant::HC4 => write!(f, "HC4"),
            HcVariant::HC5 => write!(f, "HC5"),
        }
    }
}

/// Leverage of each design row under the given bread matrix
///
/// `h_i = x_i' · bread · x_i`; with `bread = (X'X)^{-1}` this is the hat
/// matrix diagonal.
pub fn hat_diagonal(rows: &Array2<f64>, bread: &Array2<f64>) -> Array1<f64> {
    let mut hat = Array1::zeros(rows.nrows());
    for (i, row) in rows.rows().into_iter().enumerate() {
        hat[i] = row.dot(&bread.dot(&row));
    }
    hat
}

/// Heteroskedasticity-consistent covariance for the requested variant
pub fn hc_covariance(
    rows: &Array2<f64>,
    scores: &Array1<f64>,
    bread: &Array2<f64>,
    variant: HcVariant,
) -> Result<Array2<f64>> {
    let n = rows.nrows();
    let k = rows.ncols();
    check_parts(rows, scores, bread)?;
    if n <= k {
        return Err(SummError::estimation(
            "robust covariance",
            format!("{} observations for {} terms leave no residual df", n, k),
        ));
    }

    let omega = match variant {
        HcVariant::HC0 => scores.mapv(|s| s * s),
        HcVariant::HC1 => {
            let c = n as f64 / (n - k) as f64;
            scores.mapv(|s| c * s * s)
        }
        HcVariant::HC2 | HcVariant::HC3 | HcVariant::HC4 | HcVariant::HC5 => {
            let hat = hat_diagonal(rows, bread);
            let h_bar = k as f64 / n as f64;
            let h_max = hat.iter().cloned().fold(0.0_f64, f64::max);

            let mut omega = Array1::zeros(n);
            for i in 0..n {
                let gap = (1.0 - hat[i]).max(MIN_LEVERAGE_GAP);
                let s2 = scores[i] * scores[i];
                omega[i] = match variant {
                    HcVariant::HC2 => s2 / gap,
                    HcVariant::HC3 => s2 / (gap * gap),
                    HcVariant::HC4 => {
                        let delta = (hat[i] / h_bar).min(4.0);
                        s2 / gap.powf(delta)
                    }
                    HcVariant::HC5 => {
                        let alpha = (hat[i] / h_bar).min((0.7 * h_max / h_bar).max(4.0));
                        s2 / gap.powf(alpha).sqrt()
                    }
                    _ => unreachable!(),
                };
            }
            omega
        }
    };

    let mut scaled = rows.clone();
    for (i, mut row) in scaled.rows_mut().into_iter().enumerate() {
        row.mapv_inplace(|v| v * omega[i]);
    }
    let meat = rows.t().dot(&scaled);

    Ok(bread.dot(&meat).dot(bread))
}

/// Cluster-robust covariance with the CR1 small-sample correction
///
/// Scores are summed within each group before forming the meat, then
/// scaled by `m/(m-1) · (n-1)/(n-k)` for `m` clusters.
pub fn cluster_covariance(
    rows: &Array2<f64>,
    scores: &Array1<f64>,
    bread: &Array2<f64>,
    groups: &[usize],
) -> Result<Array2<f64>> {
    let n = rows.nrows();
    let k = rows.ncols();
    check_parts(rows, scores, bread)?;
    if groups.len() != n {
        return Err(SummError::config(format!(
            "cluster vector has {} entries for {} observations",
            groups.len(),
            n
        )));
    }
    if n <= k {
        return Err(SummError::estimation(
            "cluster-robust covariance",
            format!("{} observations for {} terms leave no residual df", n, k),
        ));
    }

    // Group ids are arbitrary codes, not indices; aggregate by id so
    // sparse codes cost nothing beyond the number of distinct clusters.
    let mut sums: IndexMap<usize, Array1<f64>> = IndexMap::new();
    for (i, &g) in groups.iter().enumerate() {
        let sum = sums.entry(g).or_insert_with(|| Array1::zeros(k));
        *sum += &rows.row(i).mapv(|v| v * scores[i]);
    }

    let m = sums.len();
    if m < 2 {
        return Err(SummError::config(format!(
            "cluster-robust standard errors require at least two clusters, got {}",
            m
        )));
    }

    let mut meat = Array2::zeros((k, k));
    for sum in sums.values() {
        for a in 0..k {
            for b in 0..k {
                meat[(a, b)] += sum[a] * sum[b];
            }
        }
    }

    let c = (m as f64 / (m - 1) as f64) * ((n - 1) as f64 / (n - k) as f64);
    Ok(bread.dot(&meat).dot(bread) * c)
}

fn check_parts(rows: &Array2<f64>, scores: &Array1<f64>, bread: &Array2<f64>) -> Result<()> {
    let k = rows.ncols();
    if scores.len() != rows.nrows() || bread.nrows() != k || bread.ncols() != k {
        return Err(SummError::estimation(
            "robust covariance",
            "score parts have inconsistent dimensions".to_string(),
        ));
    }
    Ok(())
}
