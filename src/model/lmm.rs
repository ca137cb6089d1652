//! Random-intercept linear mixed model fitted by REML.
//!
//! Model: `y = Xβ + Zu + ε` where `u ~ N(0, τ²I)` and `ε ~ N(0, σ²I)`, with
//! one random intercept per group.
//!
//! With a single random intercept `V` is block diagonal,
//! `V_g = σ²(I + γJ)` with `γ = τ²/σ²`, so every quantity REML needs has a
//! closed form in per-group sums. `σ²` is profiled out and the restricted
//! likelihood is optimized over `h = γ/(1+γ) = τ²/(τ²+σ²)` on `[0, 1)`:
//! a coarse grid locates the basin, golden-section search refines it.
//!
//! # Example
//! ```ignore
//! use composable_h2::model::lmm::{fit_random_intercept, LmmConfig};
//!
//! let fit = fit_random_intercept(&y, &design, &groups, &LmmConfig::default())?;
//! println!("ICC = {:.3}", fit.icc);
//! ```

use crate::data::{DesignMatrix, RandomIntercept};
use crate::error::{H2Error, Result};
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Largest `h` searched. Keeps `γ = h/(1-h)` finite.
const H_MAX: f64 = 1.0 - 1e-6;

/// Relative criterion range below which the profile counts as flat.
const FLAT_PROFILE_TOL: f64 = 1e-8;

/// Configuration for REML fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmmConfig {
    /// Maximum golden-section iterations.
    pub max_iter: usize,
    /// Convergence tolerance on the variance ratio `h`.
    pub tol: f64,
    /// Points of the initial grid over `[0, 1)`.
    pub grid_points: usize,
    /// Step of the finite-difference curvature used for the standard error.
    pub curvature_step: f64,
    /// Coverage of the confidence interval on h².
    pub confidence_level: f64,
    /// Residual variance below this is treated as a degenerate fit.
    pub var_lower_bound: f64,
}

impl Default for LmmConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: 1e-6,
            grid_points: 40,
            curvature_step: 1e-4,
            confidence_level: 0.95,
            var_lower_bound: 1e-10,
        }
    }
}

impl LmmConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.grid_points < 3 {
            return Err(H2Error::InvalidParameter(
                "grid_points must be at least 3".to_string(),
            ));
        }
        if !(self.tol > 0.0) {
            return Err(H2Error::InvalidParameter("tol must be positive".to_string()));
        }
        if !(self.curvature_step > 0.0 && self.curvature_step < 0.1) {
            return Err(H2Error::InvalidParameter(
                "curvature_step must be in (0, 0.1)".to_string(),
            ));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(H2Error::InvalidParameter(
                "confidence_level must be in (0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

/// A fitted random-intercept model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomInterceptFit {
    /// Fixed effect names.
    pub coefficient_names: Vec<String>,
    /// Estimated fixed effects (GLS at the REML variance components).
    pub coefficients: Vec<f64>,
    /// Standard errors of fixed effects.
    pub std_errors: Vec<f64>,
    /// Random intercept variance τ².
    pub tau2: f64,
    /// Residual variance σ².
    pub sigma2: f64,
    /// Intraclass correlation τ² / (τ² + σ²).
    pub icc: f64,
    /// Standard error of the ICC from the curvature of the profile
    /// likelihood. `None` at the boundary or for a flat profile.
    pub icc_std_error: Option<f64>,
    /// BLUPs of the group intercepts, in group order.
    #[serde(skip)]
    pub random_effects: Vec<f64>,
    /// REML log-likelihood at the optimum.
    pub log_reml: f64,
    /// Residual degrees of freedom `n - p`.
    pub df_residual: f64,
    pub n_records: usize,
    pub n_groups: usize,
    /// Golden-section iterations used.
    pub iterations: usize,
    pub converged: bool,
}

impl RandomInterceptFit {
    /// Get coefficient by name.
    pub fn coefficient(&self, name: &str) -> Option<f64> {
        let idx = self.coefficient_names.iter().position(|n| n == name)?;
        self.coefficients.get(idx).copied()
    }

    /// Calculate t-statistic for a coefficient.
    pub fn t_statistic(&self, index: usize) -> Option<f64> {
        let coef = self.coefficients.get(index)?;
        let se = self.std_errors.get(index)?;
        if *se > 0.0 {
            Some(coef / se)
        } else {
            None
        }
    }

    /// Total variance τ² + σ².
    pub fn total_variance(&self) -> f64 {
        self.tau2 + self.sigma2
    }

    /// Normal-approximation interval for the ICC, clipped to [0, 1].
    pub fn icc_confidence_interval(&self, level: f64) -> Option<(f64, f64)> {
        let se = self.icc_std_error?;
        if !(level > 0.0 && level < 1.0) {
            return None;
        }
        let normal = Normal::new(0.0, 1.0).ok()?;
        let z = normal.inverse_cdf(1.0 - (1.0 - level) / 2.0);
        Some((
            (self.icc - z * se).clamp(0.0, 1.0),
            (self.icc + z * se).clamp(0.0, 1.0),
        ))
    }
}

/// Sufficient statistics of `(y, X)` per group.
struct GroupSums {
    xtx: DMatrix<f64>,
    xty: DVector<f64>,
    yty: f64,
    sizes: Vec<f64>,
    /// Column sums of X within each group.
    x_sums: Vec<DVector<f64>>,
    /// Sum of y within each group.
    y_sums: Vec<f64>,
}

/// Linear system `A β = b` and `c = y'H⁻¹y` for one value of `γ`.
struct GlsSystem {
    a: DMatrix<f64>,
    b: DVector<f64>,
    c: f64,
}

impl GroupSums {
    fn new(y: &DVector<f64>, x: &DMatrix<f64>, groups: &RandomIntercept) -> Self {
        let p = x.ncols();
        let g = groups.n_groups();
        let mut x_sums = vec![DVector::zeros(p); g];
        let mut y_sums = vec![0.0; g];
        let mut sizes = vec![0.0; g];

        for (i, &grp) in groups.membership.iter().enumerate() {
            sizes[grp] += 1.0;
            y_sums[grp] += y[i];
            for j in 0..p {
                x_sums[grp][j] += x[(i, j)];
            }
        }

        Self {
            xtx: x.transpose() * x,
            xty: x.transpose() * y,
            yty: y.dot(y),
            sizes,
            x_sums,
            y_sums,
        }
    }

    /// `H = I + γZZ'`; each block inverts as `I - w_g J`, `w_g = γ/(1 + n_g γ)`.
    fn system(&self, gamma: f64) -> GlsSystem {
        let mut a = self.xtx.clone();
        let mut b = self.xty.clone();
        let mut c = self.yty;

        if gamma > 0.0 {
            for ((s, &t), &n_g) in self.x_sums.iter().zip(&self.y_sums).zip(&self.sizes) {
                let w = gamma / (1.0 + n_g * gamma);
                a -= (s * s.transpose()) * w;
                b -= s * (w * t);
                c -= w * t * t;
            }
        }
        GlsSystem { a, b, c }
    }

    fn log_det_h(&self, gamma: f64) -> f64 {
        self.sizes.iter().map(|&n_g| (n_g * gamma).ln_1p()).sum()
    }
}

/// Profile REML criterion (−2·log-likelihood up to a constant) in `h`.
struct ProfileReml {
    sums: GroupSums,
    df: f64,
    q_floor: f64,
}

impl ProfileReml {
    fn gamma(h: f64) -> f64 {
        h / (1.0 - h)
    }

    /// Criterion value, or `+inf` where the system is not positive definite
    /// or leaves no residual variance.
    fn criterion(&self, h: f64) -> f64 {
        let gamma = Self::gamma(h);
        let GlsSystem { a, b, c } = self.sums.system(gamma);
        let Some(chol) = a.cholesky() else {
            return f64::INFINITY;
        };
        let beta = chol.solve(&b);
        let q = c - b.dot(&beta);
        if !(q > self.q_floor) {
            return f64::INFINITY;
        }
        let log_det_a: f64 = 2.0 * chol.l().diagonal().iter().map(|d| d.ln()).sum::<f64>();
        self.df * (q / self.df).ln() + self.sums.log_det_h(gamma) + log_det_a
    }
}

/// Minimize `f` on `[lo, hi]` by golden-section search.
///
/// Returns `(argmin, min, iterations, converged)`.
fn golden_section<F: Fn(f64) -> f64>(
    f: F,
    mut lo: f64,
    mut hi: f64,
    tol: f64,
    max_iter: usize,
) -> (f64, f64, usize, bool) {
    let ratio = (5.0_f64.sqrt() - 1.0) / 2.0;
    let mut x1 = hi - ratio * (hi - lo);
    let mut x2 = lo + ratio * (hi - lo);
    let mut f1 = f(x1);
    let mut f2 = f(x2);
    let mut iterations = 0;

    while hi - lo > tol && iterations < max_iter {
        iterations += 1;
        if f1 <= f2 {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - ratio * (hi - lo);
            f1 = f(x1);
        } else {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + ratio * (hi - lo);
            f2 = f(x2);
        }
    }

    let converged = hi - lo <= tol;
    if f1 <= f2 {
        (x1, f1, iterations, converged)
    } else {
        (x2, f2, iterations, converged)
    }
}

/// Fit `y ~ X + (1 | group)` by REML.
///
/// # Errors
/// - [`H2Error::InvalidParameter`] for mismatched dimensions or a bad config
/// - [`H2Error::Numerical`] when the design is saturated or singular, the
///   response has no variance, or no finite likelihood is found
pub fn fit_random_intercept(
    y: &[f64],
    design: &DesignMatrix,
    groups: &RandomIntercept,
    config: &LmmConfig,
) -> Result<RandomInterceptFit> {
    config.validate()?;

    let n = y.len();
    let p = design.n_coefficients();
    if design.n_records() != n || groups.n_records() != n {
        return Err(H2Error::InvalidParameter(format!(
            "Dimension mismatch: {} responses, {} design rows, {} group labels",
            n,
            design.n_records(),
            groups.n_records()
        )));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(H2Error::Numerical("Response contains non-finite values".to_string()));
    }
    if n <= p {
        return Err(H2Error::Numerical(format!(
            "Model is saturated ({} records for {} fixed effects)",
            n, p
        )));
    }
    if !design.is_full_rank() {
        return Err(H2Error::Numerical("Singular fixed-effects design".to_string()));
    }

    let mean = y.iter().sum::<f64>() / n as f64;
    let total_ss: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    if !(total_ss > 0.0) {
        return Err(H2Error::Numerical("Response has no variance".to_string()));
    }

    let x = design.matrix();
    let y_vec = DVector::from_column_slice(y);
    let profile = ProfileReml {
        sums: GroupSums::new(&y_vec, x, groups),
        df: (n - p) as f64,
        q_floor: total_ss * 1e-12,
    };

    // Coarse grid over [0, H_MAX].
    let steps = config.grid_points - 1;
    let grid: Vec<f64> = (0..=steps).map(|i| H_MAX * i as f64 / steps as f64).collect();
    let values: Vec<f64> = grid.iter().map(|&h| profile.criterion(h)).collect();
    let (best_idx, best_val) = values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::INFINITY), |acc, (i, v)| if v < acc.1 { (i, v) } else { acc });
    if !best_val.is_finite() {
        return Err(H2Error::Numerical(
            "REML criterion is not finite anywhere on the search grid".to_string(),
        ));
    }
    let worst_val = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if worst_val - best_val <= FLAT_PROFILE_TOL * best_val.abs().max(1.0) {
        return Err(H2Error::Numerical(
            "REML profile is flat; variance components are not identifiable".to_string(),
        ));
    }

    let lo = grid[best_idx.saturating_sub(1)];
    let hi = grid[(best_idx + 1).min(steps)];
    let (mut h, mut f_min, iterations, converged) =
        golden_section(|h| profile.criterion(h), lo, hi, config.tol, config.max_iter);
    if best_val < f_min {
        h = grid[best_idx];
        f_min = best_val;
    }
    // Boundary solution: no between-group variance.
    let f_zero = values[0];
    if f_zero <= f_min {
        h = 0.0;
        f_min = f_zero;
    }
    debug!(
        "REML profile: h = {:.6}, criterion = {:.6}, {} golden-section iteration(s)",
        h, f_min, iterations
    );

    let gamma = ProfileReml::gamma(h);
    let GlsSystem { a, b, c } = profile.sums.system(gamma);
    let a_inv = a
        .cholesky()
        .map(|chol| chol.inverse())
        .ok_or_else(|| H2Error::Numerical("Singular GLS system at the optimum".to_string()))?;
    let beta = &a_inv * &b;
    let q = c - b.dot(&beta);
    let sigma2 = q / profile.df;
    if !(sigma2 >= config.var_lower_bound) {
        return Err(H2Error::Numerical(format!(
            "Residual variance collapsed ({:.3e})",
            sigma2
        )));
    }
    let tau2 = gamma * sigma2;

    let std_errors: Vec<f64> = (0..p)
        .map(|j| (sigma2 * a_inv[(j, j)]).max(0.0).sqrt())
        .collect();

    // BLUP of group g: w_g * sum of group residuals.
    let random_effects: Vec<f64> = profile
        .sums
        .x_sums
        .iter()
        .zip(&profile.sums.y_sums)
        .zip(&profile.sums.sizes)
        .map(|((s, &t), &n_g)| {
            let w = gamma / (1.0 + n_g * gamma);
            w * (t - s.dot(&beta))
        })
        .collect();

    let icc_std_error = curvature_std_error(&profile, h, f_min, config.curvature_step);
    let log_reml = -0.5 * (f_min + profile.df * (1.0 + (2.0 * std::f64::consts::PI).ln()));

    Ok(RandomInterceptFit {
        coefficient_names: design.coefficient_names().to_vec(),
        coefficients: beta.iter().copied().collect(),
        std_errors,
        tau2,
        sigma2,
        icc: tau2 / (tau2 + sigma2),
        icc_std_error,
        random_effects,
        log_reml,
        df_residual: profile.df,
        n_records: n,
        n_groups: groups.n_groups(),
        iterations,
        converged,
    })
}

/// `SE(ĥ) = sqrt(2 / f''(ĥ))` for the −2·log-likelihood profile `f`.
fn curvature_std_error(profile: &ProfileReml, h: f64, f_h: f64, step: f64) -> Option<f64> {
    if h - step < 0.0 || h + step > H_MAX {
        return None;
    }
    let f_lo = profile.criterion(h - step);
    let f_hi = profile.criterion(h + step);
    let curvature = (f_hi - 2.0 * f_h + f_lo) / (step * step);
    if curvature.is_finite() && curvature > 0.0 {
        Some((2.0 / curvature).sqrt())
    } else {
        None
    }
}
