//! Robust column statistics: quantiles, median imputation and Tukey clipping.

use serde::{Deserialize, Serialize};

/// Multiplier of the interquartile range for Tukey fences.
pub const TUKEY_K: f64 = 1.5;

/// Quantile of a sample with linear interpolation between order statistics.
///
/// Non-finite values are ignored. Returns `None` for an empty sample or a
/// probability outside [0, 1].
pub fn quantile(values: &[f64], p: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&p) {
        return None;
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Nearest-rank quantile: the smallest sample value with at least a share
/// `p` of the sample at or below it.
///
/// Always returns an observed value, so clamping the sample to bounds that
/// contain it leaves it in place. Same `None` cases as [`quantile`].
pub fn nearest_rank(values: &[f64], p: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&p) {
        return None;
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = (p * sorted.len() as f64).ceil() as usize;
    Some(sorted[rank.max(1) - 1])
}

/// Median of the finite values.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Fill missing entries with the median of the present ones.
///
/// Returns the number of imputed entries. Nothing is filled when the median
/// is undefined.
pub fn impute_median(values: &mut [Option<f64>]) -> usize {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let Some(fill) = median(&present) else {
        return 0;
    };

    let mut imputed = 0;
    for v in values.iter_mut().filter(|v| v.is_none()) {
        *v = Some(fill);
        imputed += 1;
    }
    imputed
}

/// Tukey outlier fences computed from a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TukeyFences {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl TukeyFences {
    /// Compute fences at `Q1 - k·IQR` and `Q3 + k·IQR`.
    ///
    /// Quartiles are nearest-rank order statistics. Both lie inside the
    /// fences and clamping keeps the sample order, so clipped data yields
    /// the same fences again.
    ///
    /// Returns `None` when the quartiles are undefined.
    pub fn from_values(values: &[f64], k: f64) -> Option<Self> {
        let q1 = nearest_rank(values, 0.25)?;
        let q3 = nearest_rank(values, 0.75)?;
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            lower: q1 - k * iqr,
            upper: q3 + k * iqr,
        })
    }

    /// Interquartile range.
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    /// Check if a value lies inside the fences.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Clamp a value to the fences.
    pub fn clip(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }
}

/// Clip present values to the Tukey fences of the column.
///
/// Returns the fences used and the number of values changed, or `None`
/// when the column has no present values.
pub fn clip_outliers(values: &mut [Option<f64>], k: f64) -> Option<(TukeyFences, usize)> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let fences = TukeyFences::from_values(&present, k)?;

    let mut clipped = 0;
    for v in values.iter_mut().flatten() {
        if !fences.contains(*v) {
            *v = fences.clip(*v);
            clipped += 1;
        }
    }
    Some((fences, clipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quantile_interpolation() {
        let values = vec![4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(quantile(&values, 0.0).unwrap(), 1.0);
        assert_relative_eq!(quantile(&values, 0.25).unwrap(), 1.75);
        assert_relative_eq!(quantile(&values, 0.5).unwrap(), 2.5);
        assert_relative_eq!(quantile(&values, 1.0).unwrap(), 4.0);
        assert!(quantile(&[], 0.5).is_none());
        assert!(quantile(&values, 1.5).is_none());
    }

    #[test]
    fn test_nearest_rank() {
        let values = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(nearest_rank(&values, 0.0), Some(1.0));
        assert_eq!(nearest_rank(&values, 0.25), Some(1.0));
        assert_eq!(nearest_rank(&values, 0.3), Some(2.0));
        assert_eq!(nearest_rank(&values, 0.75), Some(3.0));
        assert_eq!(nearest_rank(&values, 1.0), Some(4.0));
        assert!(nearest_rank(&[], 0.5).is_none());
    }

    #[test]
    fn test_median_ignores_non_finite() {
        let values = vec![1.0, f64::NAN, 3.0, 2.0];
        assert_relative_eq!(median(&values).unwrap(), 2.0);
    }

    #[test]
    fn test_impute_median() {
        let mut values = vec![Some(1.0), None, Some(5.0), Some(3.0), None];
        let n = impute_median(&mut values);
        assert_eq!(n, 2);
        assert_eq!(values[1], Some(3.0));
        assert_eq!(values[4], Some(3.0));

        let mut all_missing: Vec<Option<f64>> = vec![None, None];
        assert_eq!(impute_median(&mut all_missing), 0);
        assert!(all_missing.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_tukey_fences() {
        let values: Vec<f64> = (1..=9).map(|v| v as f64).collect();
        let fences = TukeyFences::from_values(&values, TUKEY_K).unwrap();
        assert_relative_eq!(fences.q1, 3.0);
        assert_relative_eq!(fences.q3, 7.0);
        assert_relative_eq!(fences.iqr(), 4.0);
        assert_relative_eq!(fences.lower, -3.0);
        assert_relative_eq!(fences.upper, 13.0);
    }

    #[test]
    fn test_clip_outliers() {
        let mut values: Vec<Option<f64>> = (1..=10).map(|v| Some(v as f64)).collect();
        values.push(Some(100.0));
        values.push(None);

        let (fences, clipped) = clip_outliers(&mut values, TUKEY_K).unwrap();
        assert_eq!(clipped, 1);
        assert_relative_eq!(values[10].unwrap(), fences.upper);
        assert!(values[11].is_none());
        assert!(values.iter().flatten().all(|v| fences.contains(*v)));
    }

    #[test]
    fn test_clip_is_stable() {
        let mut values: Vec<Option<f64>> = vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 60.0]
            .into_iter()
            .map(Some)
            .collect();
        clip_outliers(&mut values, TUKEY_K).unwrap();
        let once = values.clone();
        let (_, clipped) = clip_outliers(&mut values, TUKEY_K).unwrap();
        assert_eq!(clipped, 0);
        assert_eq!(values, once);
    }

    #[test]
    fn test_clip_is_stable_with_tied_quartiles() {
        let mut values = vec![Some(6000.0), Some(6000.0), Some(6000.0), Some(9000.0)];
        let (fences, clipped) = clip_outliers(&mut values, TUKEY_K).unwrap();
        assert_eq!(clipped, 1);
        assert_relative_eq!(fences.q1, 6000.0);
        assert_relative_eq!(fences.q3, 6000.0);
        assert_eq!(values[3], Some(6000.0));

        let once = values.clone();
        let (again, clipped) = clip_outliers(&mut values, TUKEY_K).unwrap();
        assert_eq!(clipped, 0);
        assert_eq!(again, fences);
        assert_eq!(values, once);
    }
}
