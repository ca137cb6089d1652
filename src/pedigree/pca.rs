//! Principal component analysis on a centered covariance matrix.

use nalgebra::{DMatrix, SymmetricEigen};

/// Result of a PCA fit.
#[derive(Debug, Clone)]
pub struct PcaFit {
    /// Projected observations (rows × components).
    pub scores: DMatrix<f64>,
    /// Loadings (variables × components), one unit vector per column.
    pub loadings: DMatrix<f64>,
    /// Fraction of total variance explained by each retained component.
    pub explained_variance_ratio: Vec<f64>,
}

impl PcaFit {
    pub fn n_components(&self) -> usize {
        self.scores.ncols()
    }
}

/// Fit PCA with `n_components` components on `data` (rows × variables).
///
/// Returns `None` for fewer than 2 rows, a component count outside
/// `1..=variables`, or data with no variance.
pub fn fit_pca(data: &DMatrix<f64>, n_components: usize) -> Option<PcaFit> {
    let (n, p) = data.shape();
    if n < 2 || n_components == 0 || n_components > p {
        return None;
    }
    if data.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mut centered = data.clone();
    for j in 0..p {
        let mean = data.column(j).mean();
        centered.column_mut(j).add_scalar_mut(-mean);
    }

    let cov = centered.transpose() * &centered / (n - 1) as f64;
    let eigen = SymmetricEigen::new(cov);

    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
    if total.is_nan() || total <= 0.0 {
        return None;
    }

    let mut loadings = DMatrix::zeros(p, n_components);
    let mut explained_variance_ratio = Vec::with_capacity(n_components);
    for (k, &idx) in order.iter().take(n_components).enumerate() {
        let mut v = eigen.eigenvectors.column(idx).clone_owned();
        // Sign convention: largest absolute loading is positive.
        let pivot = v.iter().copied().fold(0.0_f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
        if pivot < 0.0 {
            v.neg_mut();
        }
        loadings.set_column(k, &v);
        explained_variance_ratio.push(eigen.eigenvalues[idx].max(0.0) / total);
    }

    let scores = centered * &loadings;
    Some(PcaFit {
        scores,
        loadings,
        explained_variance_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perfectly_correlated() {
        let data = DMatrix::from_row_slice(4, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0, 4.0, 8.0]);
        let fit = fit_pca(&data, 2).unwrap();
        assert_relative_eq!(fit.explained_variance_ratio[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(fit.explained_variance_ratio[1], 0.0, epsilon = 1e-10);
        assert_eq!(fit.scores.shape(), (4, 2));
    }

    #[test]
    fn test_ratios_sorted_and_bounded() {
        let data = DMatrix::from_row_slice(
            5,
            3,
            &[
                1.0, 0.5, 3.0, //
                2.0, 0.1, 2.0, //
                3.0, 0.9, 4.0, //
                4.0, 0.4, 1.0, //
                5.0, 0.2, 5.0,
            ],
        );
        let fit = fit_pca(&data, 2).unwrap();
        assert_eq!(fit.n_components(), 2);
        assert!(fit.explained_variance_ratio[0] >= fit.explained_variance_ratio[1]);
        let sum: f64 = fit.explained_variance_ratio.iter().sum();
        assert!(sum <= 1.0 + 1e-12);
    }

    #[test]
    fn test_scores_are_centered() {
        let data = DMatrix::from_row_slice(3, 2, &[1.0, 5.0, 2.0, 3.0, 6.0, 1.0]);
        let fit = fit_pca(&data, 1).unwrap();
        assert_relative_eq!(fit.scores.column(0).sum(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_degenerate_inputs() {
        let constant = DMatrix::from_element(3, 2, 7.0);
        assert!(fit_pca(&constant, 1).is_none());

        let one_row = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        assert!(fit_pca(&one_row, 1).is_none());

        let data = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        assert!(fit_pca(&data, 3).is_none());
    }
}
