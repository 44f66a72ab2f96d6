//! Variance inflation factors
//!
//! One VIF per predictor term, computed from the design matrix's
//! pairwise collinearity structure: each predictor column is regressed
//! on every other design column and `VIF = 1 / (1 - R²)`.

use ndarray::{Array1, Array2};
use ndarray_linalg::LeastSquaresSvd;

use regsum_core::Design;

use crate::error::SummError;
use crate::Result;

/// Aux-regression R² this close to 1 means the design is rank-deficient
const MAX_AUX_R_SQUARED: f64 = 1.0 - 1e-10;

/// VIF for every predictor term, in design-column order
///
/// The intercept gets no VIF. Requires at least two predictor terms;
/// the builder reports that precondition as a configuration error, this
/// function double-checks it.
pub fn variance_inflation_factors(design: &Design) -> Result<Vec<f64>> {
    let cols: Vec<usize> = design.predictor_columns().collect();
    if cols.len() < 2 {
        return Err(SummError::config(format!(
            "VIFs require at least two predictor terms, got {}",
            cols.len()
        )));
    }

    let x = design.x();
    let n = x.nrows();
    let p = x.ncols();

    let mut vifs = Vec::with_capacity(cols.len());
    for &j in &cols {
        // Regress column j on all remaining design columns
        let mut others = Array2::zeros((n, p - 1));
        let mut col_idx = 0;
        for k in 0..p {
            if k != j {
                others.column_mut(col_idx).assign(&x.column(k));
                col_idx += 1;
            }
        }

        let target: Array1<f64> = x.column(j).to_owned();
        let solution = others
            .least_squares(&target)
            .map_err(|e| SummError::estimation("vif", format!("auxiliary regression failed: {}", e)))?
            .solution;

        let fitted = others.dot(&solution);
        let rss: f64 = target
            .iter()
            .zip(fitted.iter())
            .map(|(&t, &f)| (t - f) * (t - f))
            .sum();
        let mean = target.mean().unwrap_or(0.0);
        let tss: f64 = target.iter().map(|&t| (t - mean) * (t - mean)).sum();

        if tss < 1e-12 {
            return Err(SummError::estimation(
                "vif",
                format!(
                    "predictor '{}' is constant; its VIF is undefined",
                    design.terms()[j]
                ),
            ));
        }

        let r_squared = 1.0 - rss / tss;
        if r_squared > MAX_AUX_R_SQUARED {
            return Err(SummError::estimation(
                "vif",
                format!(
                    "predictor '{}' is collinear with the remaining terms (rank-deficient design)",
                    design.terms()[j]
                ),
            ));
        }

        vifs.push(1.0 / (1.0 - r_squared.max(0.0)));
    }

    Ok(vifs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn orthogonal_predictors_have_unit_vif() {
        // Centered, orthogonal columns
        let x = array![[-1.0, 1.0], [1.0, 1.0], [-1.0, -1.0], [1.0, -1.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let d = Design::with_intercept(x, y, vec!["a".into(), "b".into()]).unwrap();

        let vifs = variance_inflation_factors(&d).unwrap();
        assert_eq!(vifs.len(), 2);
        assert_abs_diff_eq!(vifs[0], 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(vifs[1], 1.0, epsilon = 1e-8);
    }

    #[test]
    fn correlated_predictors_inflate() {
        let x = array![
            [1.0, 1.1],
            [2.0, 2.2],
            [3.0, 2.9],
            [4.0, 4.3],
            [5.0, 4.8],
            [6.0, 6.1]
        ];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let d = Design::with_intercept(x, y, vec!["a".into(), "b".into()]).unwrap();

        let vifs = variance_inflation_factors(&d).unwrap();
        assert!(vifs[0] > 10.0);
        assert!(vifs[1] > 10.0);
    }

    #[test]
    fn duplicated_column_is_rank_deficient() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let d = Design::with_intercept(x, y, vec!["a".into(), "a2".into()]).unwrap();

        let err = variance_inflation_factors(&d).unwrap_err();
        assert!(matches!(err, SummError::Estimation { .. }));
    }

    #[test]
    fn single_predictor_is_rejected() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        let d = Design::with_intercept(x, y, vec!["a".into()]).unwrap();

        let err = variance_inflation_factors(&d).unwrap_err();
        assert!(matches!(err, SummError::Configuration { .. }));
    }
}
