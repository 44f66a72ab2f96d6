//! Pure design transforms
//!
//! Centering and standardization never touch the input design: each
//! transform returns a fresh [`Design`] that a caller refits against.
//! Columns with (near-)zero variance are centered but never divided.

use crate::design::Design;
use crate::error::DesignError;
use crate::Result;

/// Guard against dividing by the spread of a constant column
const MIN_SD: f64 = 1e-10;

/// Mean-center every predictor column, leaving scales untouched
pub fn center(design: &Design) -> Design {
    let mut out = design.clone();
    for j in design.predictor_columns() {
        let mean = design.x.column(j).mean().unwrap_or(0.0);
        out.x.column_mut(j).mapv_inplace(|v| v - mean);
    }
    out
}

/// Center predictors and divide each by `n_sd` sample standard deviations
///
/// With `scale_response` the same transform is applied to the response.
/// `n_sd` of 1 gives the usual z-scale; 2 gives the Gelman scaling that
/// makes continuous slopes comparable to binary ones.
pub fn standardize(design: &Design, n_sd: f64, scale_response: bool) -> Result<Design> {
    if !n_sd.is_finite() || n_sd <= 0.0 {
        return Err(DesignError::InvalidParameter(format!(
            "n_sd must be positive, got {}",
            n_sd
        )));
    }

    let mut out = design.clone();
    for j in design.predictor_columns() {
        let col = design.x.column(j);
        let mean = col.mean().unwrap_or(0.0);
        let sd = col.std(1.0);

        if sd > MIN_SD {
            let div = n_sd * sd;
            out.x.column_mut(j).mapv_inplace(|v| (v - mean) / div);
        } else {
            out.x.column_mut(j).mapv_inplace(|v| v - mean);
        }
    }

    if scale_response {
        let mean = design.y.mean().unwrap_or(0.0);
        let sd = design.y.std(1.0);
        if sd > MIN_SD {
            let div = n_sd * sd;
            out.y.mapv_inplace(|v| (v - mean) / div);
        } else {
            out.y.mapv_inplace(|v| v - mean);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn sample() -> Design {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0];
        Design::with_intercept(x, y, vec!["x".into()]).unwrap()
    }

    #[test]
    fn center_zeroes_column_means() {
        let d = sample();
        let c = center(&d);

        assert_abs_diff_eq!(c.x().column(1).mean().unwrap(), 0.0, epsilon = 1e-12);
        // Intercept column untouched
        assert!(c.x().column(0).iter().all(|&v| v == 1.0));
        // Original untouched
        assert_abs_diff_eq!(d.x().column(1).mean().unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn standardize_divides_by_n_sd_deviations() {
        let d = sample();
        let sd = d.x().column(1).std(1.0);
        let s = standardize(&d, 2.0, false).unwrap();

        assert_abs_diff_eq!(s.x().column(1).mean().unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.x().column(1).std(1.0), 1.0 / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.x()[(0, 1)], (1.0 - 3.0) / (2.0 * sd), epsilon = 1e-12);
        // Response untouched unless requested
        assert_abs_diff_eq!(s.y()[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn standardize_scales_response_when_asked() {
        let d = sample();
        let s = standardize(&d, 1.0, true).unwrap();
        assert_abs_diff_eq!(s.y().mean().unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.y().std(1.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn standardize_rejects_bad_n_sd() {
        let d = sample();
        assert!(standardize(&d, 0.0, false).is_err());
        assert!(standardize(&d, -1.0, false).is_err());
    }

    #[test]
    fn constant_column_is_centered_not_divided() {
        let x = array![[7.0, 1.0], [7.0, 2.0], [7.0, 3.0]];
        let y = array![1.0, 2.0, 3.0];
        let d = Design::new(x, y, vec!["c".into(), "x".into()], false).unwrap();
        let s = standardize(&d, 1.0, false).unwrap();
        assert!(s.x().column(0).iter().all(|&v| v == 0.0));
    }
}
