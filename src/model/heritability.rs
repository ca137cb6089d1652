//! Per-trait heritability estimation.
//!
//! Each trait is fitted as `trait ~ 1 [+ lactation] [+ age_at_calving] + (1 | id)`
//! and h² is read off the variance components: `h² = τ² / (τ² + σ²)`. The
//! between-animal variance stands in for the additive genetic variance.

use super::lmm::{fit_random_intercept, LmmConfig, RandomInterceptFit};
use crate::data::schema::{FIXED_EFFECT_COLUMNS, ID};
use crate::data::{
    DesignMatrix, HeritabilityResult, RandomIntercept, RecordTable, TraitEstimate, TraitEstimates,
    TraitOutcome,
};
use crate::error::{H2Error, Result};
use log::{debug, info, warn};
use rayon::prelude::*;

/// Complete records for one trait, ready for fitting.
#[derive(Debug, Clone)]
pub struct TraitData {
    pub trait_name: String,
    /// Trait values.
    pub response: Vec<f64>,
    /// Animal identifier of each record.
    pub ids: Vec<String>,
    /// Fixed-effect covariates kept for the fit.
    pub covariates: Vec<(String, Vec<f64>)>,
    /// Covariates dropped because they were constant after filtering.
    pub dropped_constant: Vec<String>,
    /// Rows of the source table that were used.
    pub rows: Vec<usize>,
}

impl TraitData {
    pub fn n_records(&self) -> usize {
        self.response.len()
    }
}

/// Select complete records for a trait.
///
/// Fixed effects are taken from `lactation` and `age_at_calving` when the
/// column exists and carries at least one value. Rows with an empty id or
/// any missing value are dropped.
pub fn prepare_trait_data(table: &RecordTable, trait_name: &str) -> Result<TraitData> {
    if !table.has_column(trait_name) {
        return Err(H2Error::modeling(trait_name, "trait column not found"));
    }
    if !table.has_column(ID) {
        return Err(H2Error::modeling(trait_name, "'id' column not found"));
    }

    let ids = table.text_column(ID)?;
    let response = table.numeric_column(trait_name)?;

    let mut fixed: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    for &name in FIXED_EFFECT_COLUMNS {
        if name == trait_name || !table.has_column(name) {
            continue;
        }
        let values = table.numeric_column(name)?;
        if values.iter().any(|v| v.is_some()) {
            fixed.push((name.to_string(), values));
        }
    }

    let rows: Vec<usize> = (0..table.n_rows())
        .filter(|&r| !ids[r].trim().is_empty())
        .filter(|&r| response[r].is_some())
        .filter(|&r| fixed.iter().all(|(_, v)| v[r].is_some()))
        .collect();
    if rows.is_empty() {
        return Err(H2Error::modeling(
            trait_name,
            "no complete records after removing missing values",
        ));
    }

    let mut covariates = Vec::new();
    let mut dropped_constant = Vec::new();
    for (name, values) in fixed {
        let kept: Vec<f64> = rows.iter().filter_map(|&r| values[r]).collect();
        let first = kept[0];
        if kept.iter().all(|&v| v == first) {
            debug!("'{}': dropping constant fixed effect '{}'", trait_name, name);
            dropped_constant.push(name);
        } else {
            covariates.push((name, kept));
        }
    }

    Ok(TraitData {
        trait_name: trait_name.to_string(),
        response: rows.iter().filter_map(|&r| response[r]).collect(),
        ids: rows.iter().map(|&r| ids[r].trim().to_string()).collect(),
        covariates,
        dropped_constant,
        rows,
    })
}

/// Fit the random-intercept model for prepared trait data.
pub fn fit_trait(data: &TraitData, config: &LmmConfig) -> Result<RandomInterceptFit> {
    let trait_name = data.trait_name.as_str();
    let groups = RandomIntercept::from_labels(ID, &data.ids)
        .map_err(|e| H2Error::modeling(trait_name, e.to_string()))?;
    if groups.n_groups() < 2 {
        return Err(H2Error::modeling(
            trait_name,
            format!(
                "need at least 2 distinct animals (id) to separate variance components, found {}",
                groups.n_groups()
            ),
        ));
    }

    if groups.group_sizes().iter().all(|&size| size < 2) {
        return Err(H2Error::modeling(
            trait_name,
            "no animal has repeated records; genetic and residual variance are not separable",
        ));
    }

    let design = DesignMatrix::with_intercept(data.n_records(), &data.covariates)
        .map_err(|e| H2Error::modeling(trait_name, e.to_string()))?;

    let fit = fit_random_intercept(&data.response, &design, &groups, config)
        .map_err(|e| H2Error::modeling(trait_name, e.to_string()))?;
    if !fit.converged {
        return Err(H2Error::modeling(
            trait_name,
            format!("REML did not converge in {} iterations", fit.iterations),
        ));
    }
    Ok(fit)
}

/// Estimate the heritability of one trait with default settings.
///
/// # Errors
/// [`H2Error::Modeling`] when the trait or `id` column is absent, no
/// complete record remains, fewer than 2 animals are present, or the fit
/// fails.
pub fn estimate_heritability(table: &RecordTable, trait_name: &str) -> Result<HeritabilityResult> {
    estimate_heritability_with_config(table, trait_name, &LmmConfig::default())
}

/// Estimate the heritability of one trait.
pub fn estimate_heritability_with_config(
    table: &RecordTable,
    trait_name: &str,
    config: &LmmConfig,
) -> Result<HeritabilityResult> {
    let data = prepare_trait_data(table, trait_name)?;
    let fit = fit_trait(&data, config)?;
    let result = to_result(&data, &fit, config);

    info!(
        "'{}': h2 = {} ({} records, {} animals)",
        trait_name,
        result.h2.map_or_else(|| "NA".to_string(), |h| format!("{:.3}", h)),
        result.n_records,
        result.n_groups
    );
    Ok(result)
}

fn to_result(data: &TraitData, fit: &RandomInterceptFit, config: &LmmConfig) -> HeritabilityResult {
    let finite = |v: f64| Some(v).filter(|x| x.is_finite());
    let genetic_variance = finite(fit.tau2);
    let residual_variance = finite(fit.sigma2);

    let h2 = match (genetic_variance, residual_variance) {
        (Some(g), Some(e)) if g + e > 0.0 => Some((g / (g + e)).clamp(0.0, 1.0)),
        _ => None,
    };
    let standard_error = h2.and(fit.icc_std_error);
    let interval = standard_error.and_then(|_| fit.icc_confidence_interval(config.confidence_level));

    HeritabilityResult {
        trait_name: data.trait_name.clone(),
        h2,
        standard_error,
        ci_lower: interval.map(|(lo, _)| lo),
        ci_upper: interval.map(|(_, hi)| hi),
        genetic_variance,
        residual_variance,
        n_records: fit.n_records,
        n_groups: fit.n_groups,
        fixed_effects: data.covariates.iter().map(|(n, _)| n.clone()).collect(),
    }
}

/// Estimate every trait independently, in parallel.
///
/// A failing trait is recorded as [`TraitOutcome::Failed`] and does not
/// affect the others. Outcomes keep the order of `traits`.
pub fn estimate_all<S: AsRef<str> + Sync>(
    table: &RecordTable,
    traits: &[S],
    config: &LmmConfig,
) -> TraitEstimates {
    let estimates = traits
        .par_iter()
        .map(|t| {
            let trait_name = t.as_ref();
            let outcome = match estimate_heritability_with_config(table, trait_name, config) {
                Ok(result) => TraitOutcome::Estimated(result),
                Err(err) => {
                    warn!("Skipping trait '{}': {}", trait_name, err);
                    TraitOutcome::Failed {
                        reason: match err {
                            H2Error::Modeling { reason, .. } => reason,
                            other => other.to_string(),
                        },
                    }
                }
            };
            TraitEstimate {
                trait_name: trait_name.to_string(),
                outcome,
            }
        })
        .collect();

    TraitEstimates { estimates }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use approx::assert_relative_eq;

    fn text(values: &[&str]) -> Vec<Value> {
        values.iter().map(|s| Value::from_raw(s)).collect()
    }

    fn numbers(values: &[f64]) -> Vec<Value> {
        values.iter().map(|&v| Value::Number(v)).collect()
    }

    fn herd() -> RecordTable {
        RecordTable::from_columns(vec![
            ("id".to_string(), text(&["A", "A", "B", "B", "C", "C", "D", "D", "", "E"])),
            (
                "milk_yield".to_string(),
                vec![
                    Value::Number(9.0),
                    Value::Number(11.0),
                    Value::Number(19.0),
                    Value::Number(21.0),
                    Value::Number(29.0),
                    Value::Number(31.0),
                    Value::Number(39.0),
                    Value::Number(41.0),
                    Value::Number(50.0),
                    Value::Missing,
                ],
            ),
            ("lactation".to_string(), numbers(&[1.0; 10])),
            ("age_at_calving".to_string(), vec![Value::Missing; 10]),
            ("fat_pct".to_string(), numbers(&[3.9; 10])),
        ])
        .unwrap()
    }

    #[test]
    fn test_prepare_trait_data() {
        let data = prepare_trait_data(&herd(), "milk_yield").unwrap();
        // blank id and missing trait rows dropped
        assert_eq!(data.n_records(), 8);
        assert_eq!(data.rows, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        // lactation constant, age empty
        assert!(data.covariates.is_empty());
        assert_eq!(data.dropped_constant, vec!["lactation"]);
    }

    #[test]
    fn test_balanced_heritability() {
        let result = estimate_heritability(&herd(), "milk_yield").unwrap();
        assert_relative_eq!(result.h2.unwrap(), 165.666_666 / 167.666_666, epsilon = 1e-4);
        assert_relative_eq!(result.residual_variance.unwrap(), 2.0, max_relative = 1e-3);
        assert_eq!(result.n_groups, 4);
        assert_eq!(result.n_records, 8);
        assert!(result.fixed_effects.is_empty());
    }

    #[test]
    fn test_single_id_is_modeling_error() {
        let table = RecordTable::from_columns(vec![
            ("id".to_string(), text(&["A", "A", "A"])),
            ("milk_yield".to_string(), numbers(&[1.0, 2.0, 3.0])),
        ])
        .unwrap();
        let err = estimate_heritability(&table, "milk_yield").unwrap_err();
        assert!(matches!(err, H2Error::Modeling { .. }));
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn test_one_record_per_animal_is_modeling_error() {
        let ids: Vec<Value> = (0..30).map(|i| Value::Text(format!("V{:04}", i))).collect();
        let milk: Vec<f64> = (0..30).map(|i| 6000.0 + ((i * 37) % 17) as f64 * 55.0).collect();
        let table = RecordTable::from_columns(vec![
            ("id".to_string(), ids),
            ("milk_yield".to_string(), numbers(&milk)),
        ])
        .unwrap();

        let err = estimate_heritability(&table, "milk_yield").unwrap_err();
        assert!(matches!(err, H2Error::Modeling { .. }));
        assert!(err.to_string().contains("repeated records"), "{}", err);

        let estimates = estimate_all(&table, &["milk_yield"], &LmmConfig::default());
        assert!(estimates.get("milk_yield").is_none());
        assert_eq!(estimates.failed().len(), 1);
    }

    #[test]
    fn test_missing_columns() {
        let err = estimate_heritability(&herd(), "protein_pct").unwrap_err();
        assert!(matches!(err, H2Error::Modeling { .. }));

        let no_id = herd().select_columns(&["milk_yield"]);
        assert!(matches!(
            estimate_heritability(&no_id, "milk_yield"),
            Err(H2Error::Modeling { .. })
        ));
    }

    #[test]
    fn test_constant_trait_fails() {
        let err = estimate_heritability(&herd(), "fat_pct").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_estimate_all_keeps_order_and_failures() {
        let traits = vec!["milk_yield", "protein_pct", "fat_pct"];
        let estimates = estimate_all(&herd(), &traits, &LmmConfig::default());

        assert_eq!(estimates.len(), 3);
        let names: Vec<&str> = estimates.estimates.iter().map(|e| e.trait_name.as_str()).collect();
        assert_eq!(names, traits);
        assert!(estimates.get("milk_yield").is_some());
        assert_eq!(estimates.failed().len(), 2);
    }

    #[test]
    fn test_h2_in_unit_interval() {
        let table = RecordTable::from_columns(vec![
            ("id".to_string(), text(&["a", "a", "b", "b", "c", "c", "d", "d", "e", "e"])),
            (
                "milk_yield".to_string(),
                numbers(&[5.1, 4.9, 5.3, 4.6, 5.0, 5.2, 4.8, 5.4, 5.0, 4.7]),
            ),
            ("lactation".to_string(), numbers(&[1.0, 2.0, 1.0, 2.0, 1.0, 3.0, 2.0, 3.0, 1.0, 2.0])),
        ])
        .unwrap();
        let result = estimate_heritability(&table, "milk_yield").unwrap();
        let h2 = result.h2.unwrap();
        assert!((0.0..=1.0).contains(&h2));
        assert_eq!(result.fixed_effects, vec!["lactation"]);
        if let (Some(lo), Some(hi)) = (result.ci_lower, result.ci_upper) {
            assert!(lo <= h2 && h2 <= hi);
        }
    }
}
