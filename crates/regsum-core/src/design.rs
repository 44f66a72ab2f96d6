//! Numeric design for a regression model
//!
//! A [`Design`] bundles the design matrix, the response vector, ordered
//! term names and optional observation weights and grouping columns. It
//! is validated on construction and immutable afterwards; transforms in
//! [`crate::transform`] return fresh values.

use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::error::DesignError;
use crate::Result;

/// Matrix type alias for 2D arrays
pub type Matrix = Array2<f64>;

/// Vector type alias for 1D arrays
pub type Vector = Array1<f64>;

/// Conventional name of the intercept term
pub const INTERCEPT: &str = "(Intercept)";

/// A validated design matrix with response and term metadata
///
/// When the design carries an intercept it occupies column 0.
/// Serializes for archiving alongside a summary; deserialization is
/// deliberately absent so every `Design` passes construction checks.
#[derive(Debug, Clone, Serialize)]
pub struct Design {
    pub(crate) x: Matrix,
    pub(crate) y: Vector,
    pub(crate) terms: Vec<String>,
    pub(crate) has_intercept: bool,
    pub(crate) weights: Option<Vector>,
    pub(crate) groups: IndexMap<String, Vec<usize>>,
}

impl Design {
    /// Create a design from a matrix whose columns already match `terms`
    pub fn new(x: Matrix, y: Vector, terms: Vec<String>, has_intercept: bool) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(DesignError::Empty("design matrix has no rows"));
        }
        if x.ncols() == 0 {
            return Err(DesignError::Empty("design matrix has no columns"));
        }
        if x.nrows() != y.len() {
            return Err(DesignError::DimensionMismatch {
                expected: format!("{} responses", x.nrows()),
                actual: format!("{}", y.len()),
            });
        }
        if x.ncols() != terms.len() {
            return Err(DesignError::DimensionMismatch {
                expected: format!("{} term names", x.ncols()),
                actual: format!("{}", terms.len()),
            });
        }

        Ok(Self {
            x,
            y,
            terms,
            has_intercept,
            weights: None,
            groups: IndexMap::new(),
        })
    }

    /// Create a design from predictor columns, prepending an intercept column
    pub fn with_intercept(x: Matrix, y: Vector, predictors: Vec<String>) -> Result<Self> {
        let n = x.nrows();
        let p = x.ncols();

        let mut full = Matrix::ones((n, p + 1));
        for j in 0..p {
            full.column_mut(j + 1).assign(&x.column(j));
        }

        let mut terms = Vec::with_capacity(p + 1);
        terms.push(INTERCEPT.to_string());
        terms.extend(predictors);

        Self::new(full, y, terms, true)
    }

    /// Attach observation weights
    pub fn with_weights(mut self, weights: Vector) -> Result<Self> {
        if weights.len() != self.n_obs() {
            return Err(DesignError::DimensionMismatch {
                expected: format!("{} weights", self.n_obs()),
                actual: format!("{}", weights.len()),
            });
        }
        if weights.iter().any(|&w| !w.is_finite() || w < 0.0) {
            return Err(DesignError::InvalidParameter(
                "weights must be finite and non-negative".to_string(),
            ));
        }
        self.weights = Some(weights);
        Ok(self)
    }

    /// Attach a named grouping column (one group id per observation)
    pub fn with_group(mut self, name: impl Into<String>, ids: Vec<usize>) -> Result<Self> {
        let name = name.into();
        if ids.len() != self.n_obs() {
            return Err(DesignError::DimensionMismatch {
                expected: format!("{} group ids", self.n_obs()),
                actual: format!("{}", ids.len()),
            });
        }
        if self.groups.contains_key(&name) {
            return Err(DesignError::DuplicateGroup(name));
        }
        self.groups.insert(name, ids);
        Ok(self)
    }

    /// Design matrix (n × p, intercept in column 0 when present)
    pub fn x(&self) -> &Matrix {
        &self.x
    }

    /// Response vector
    pub fn y(&self) -> &Vector {
        &self.y
    }

    /// Term names, in design-column order
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Whether column 0 is an intercept
    pub fn has_intercept(&self) -> bool {
        self.has_intercept
    }

    /// Observation weights, if any
    pub fn weights(&self) -> Option<&Vector> {
        self.weights.as_ref()
    }

    /// Look up a grouping column by name
    pub fn group(&self, name: &str) -> Result<&[usize]> {
        self.groups
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| DesignError::GroupNotFound(name.to_string()))
    }

    /// Number of observations
    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    /// Number of design columns (including the intercept)
    pub fn n_terms(&self) -> usize {
        self.x.ncols()
    }

    /// Number of predictor terms (excluding the intercept)
    pub fn n_predictors(&self) -> usize {
        if self.has_intercept {
            self.n_terms() - 1
        } else {
            self.n_terms()
        }
    }

    /// Column indices of the predictor terms
    pub fn predictor_columns(&self) -> std::ops::Range<usize> {
        if self.has_intercept {
            1..self.n_terms()
        } else {
            0..self.n_terms()
        }
    }
}
