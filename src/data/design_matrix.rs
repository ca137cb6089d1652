//! Fixed-effects design matrix construction.

use crate::error::{H2Error, Result};
use nalgebra::DMatrix;

/// A design matrix for the fixed part of a mixed model.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// The design matrix (records × coefficients).
    matrix: DMatrix<f64>,
    /// Names of the coefficients (columns).
    coefficient_names: Vec<String>,
}

impl DesignMatrix {
    /// Create a design matrix directly from components.
    pub fn from_matrix(matrix: DMatrix<f64>, coefficient_names: Vec<String>) -> Result<Self> {
        if matrix.ncols() != coefficient_names.len() {
            return Err(H2Error::InvalidParameter(format!(
                "Design matrix has {} columns but {} names",
                matrix.ncols(),
                coefficient_names.len()
            )));
        }
        Ok(Self {
            matrix,
            coefficient_names,
        })
    }

    /// Build `~ 1 + covariates` for `n_records` rows.
    ///
    /// Each covariate enters as a single numeric column.
    pub fn with_intercept(n_records: usize, covariates: &[(String, Vec<f64>)]) -> Result<Self> {
        let mut coefficient_names = vec!["(Intercept)".to_string()];
        let mut columns: Vec<Vec<f64>> = vec![vec![1.0; n_records]];

        for (name, values) in covariates {
            if values.len() != n_records {
                return Err(H2Error::InvalidParameter(format!(
                    "Covariate '{}' has {} values, expected {}",
                    name,
                    values.len(),
                    n_records
                )));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(H2Error::Numerical(format!(
                    "Covariate '{}' contains non-finite values",
                    name
                )));
            }
            coefficient_names.push(name.clone());
            columns.push(values.clone());
        }

        let n_coef = columns.len();
        let matrix = DMatrix::from_fn(n_records, n_coef, |i, j| columns[j][i]);
        Ok(Self {
            matrix,
            coefficient_names,
        })
    }

    /// Get the underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Coefficient names.
    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    /// Number of records (rows).
    pub fn n_records(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of coefficients (columns).
    pub fn n_coefficients(&self) -> usize {
        self.matrix.ncols()
    }

    /// Get coefficient index by name.
    pub fn coefficient_index(&self, name: &str) -> Option<usize> {
        self.coefficient_names.iter().position(|n| n == name)
    }

    /// Check if the design matrix has full column rank.
    pub fn is_full_rank(&self) -> bool {
        let xtx = self.matrix.transpose() * &self.matrix;
        xtx.cholesky().is_some()
    }
}
