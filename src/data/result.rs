//! Result types shared by the analysis stages and the report.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Heritability class used in report interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeritabilityClass {
    /// h² <= 0.2
    Low,
    /// 0.2 < h² <= 0.4
    Moderate,
    /// h² > 0.4
    High,
}

impl HeritabilityClass {
    /// Classify a heritability value.
    pub fn from_h2(h2: f64) -> Self {
        if h2 > 0.4 {
            Self::High
        } else if h2 > 0.2 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

/// Heritability estimate for one trait. `None` marks a quantity that could
/// not be estimated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeritabilityResult {
    /// Trait (column) name.
    pub trait_name: String,
    /// Narrow-sense heritability τ² / (τ² + σ²).
    pub h2: Option<f64>,
    /// Standard error of h².
    pub standard_error: Option<f64>,
    /// Lower confidence bound of h².
    pub ci_lower: Option<f64>,
    /// Upper confidence bound of h².
    pub ci_upper: Option<f64>,
    /// Between-animal (random intercept) variance τ².
    pub genetic_variance: Option<f64>,
    /// Residual variance σ².
    pub residual_variance: Option<f64>,
    /// Records used in the fit.
    pub n_records: usize,
    /// Distinct animals used in the fit.
    pub n_groups: usize,
    /// Fixed effects included besides the intercept.
    pub fixed_effects: Vec<String>,
}

impl HeritabilityResult {
    /// Total phenotypic variance τ² + σ², when both parts are known.
    pub fn phenotypic_variance(&self) -> Option<f64> {
        Some(self.genetic_variance? + self.residual_variance?)
    }

    /// Heritability class, when h² is known.
    pub fn class(&self) -> Option<HeritabilityClass> {
        self.h2.map(HeritabilityClass::from_h2)
    }
}

/// Outcome of one trait's estimation: one attempt, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TraitOutcome {
    Estimated(HeritabilityResult),
    Failed { reason: String },
}

/// Heritability outcome keyed by trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitEstimate {
    pub trait_name: String,
    pub outcome: TraitOutcome,
}

/// Outcomes for all traits of an analysis run, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitEstimates {
    pub estimates: Vec<TraitEstimate>,
}

impl TraitEstimates {
    /// Number of traits attempted.
    pub fn len(&self) -> usize {
        self.estimates.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }

    /// Result for a trait, if it was estimated.
    pub fn get(&self, trait_name: &str) -> Option<&HeritabilityResult> {
        self.estimates
            .iter()
            .find(|e| e.trait_name == trait_name)
            .and_then(|e| match &e.outcome {
                TraitOutcome::Estimated(r) => Some(r),
                TraitOutcome::Failed { .. } => None,
            })
    }

    /// Successfully estimated traits.
    pub fn successful(&self) -> Vec<&HeritabilityResult> {
        self.estimates
            .iter()
            .filter_map(|e| match &e.outcome {
                TraitOutcome::Estimated(r) => Some(r),
                TraitOutcome::Failed { .. } => None,
            })
            .collect()
    }

    /// Failed traits with their reasons.
    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.estimates
            .iter()
            .filter_map(|e| match &e.outcome {
                TraitOutcome::Failed { reason } => Some((e.trait_name.as_str(), reason.as_str())),
                TraitOutcome::Estimated(_) => None,
            })
            .collect()
    }

    /// Mean h² over traits where it was estimated.
    pub fn mean_h2(&self) -> Option<f64> {
        let values: Vec<f64> = self.successful().iter().filter_map(|r| r.h2).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    /// Write estimates to a TSV file. Unknown values are written as `NA`.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "trait\tstatus\th2\tstd_error\tci_lower\tci_upper\tgenetic_variance\tresidual_variance\tn_records\tn_groups"
        )?;

        let fmt = |v: Option<f64>| v.map_or_else(|| "NA".to_string(), |x| format!("{:.6}", x));
        for e in &self.estimates {
            match &e.outcome {
                TraitOutcome::Estimated(r) => writeln!(
                    writer,
                    "{}\testimated\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    e.trait_name,
                    fmt(r.h2),
                    fmt(r.standard_error),
                    fmt(r.ci_lower),
                    fmt(r.ci_upper),
                    fmt(r.genetic_variance),
                    fmt(r.residual_variance),
                    r.n_records,
                    r.n_groups
                )?,
                TraitOutcome::Failed { .. } => writeln!(
                    writer,
                    "{}\tfailed\tNA\tNA\tNA\tNA\tNA\tNA\t0\t0",
                    e.trait_name
                )?,
            }
        }
        writer.flush()?;
        Ok(())
    }
}

/// Tally of records by number of known parents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentStats {
    pub both_known: usize,
    pub one_known: usize,
    pub none_known: usize,
}

impl ParentStats {
    /// Total records tallied.
    pub fn total(&self) -> usize {
        self.both_known + self.one_known + self.none_known
    }
}

/// Unsupervised grouping of records in reduced trait space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Trait columns used.
    pub variables: Vec<String>,
    /// Table rows that were complete and clustered.
    pub rows: Vec<usize>,
    /// Cluster label per clustered row.
    pub labels: Vec<usize>,
    /// Cluster centers in principal-component space.
    pub centers: Vec<Vec<f64>>,
    /// Fraction of variance explained by each retained component.
    pub explained_variance: Vec<f64>,
}

impl ClusterSummary {
    /// Number of clusters.
    pub fn n_clusters(&self) -> usize {
        self.centers.len()
    }
}

/// Pedigree and genetic-structure summary of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticStructureSummary {
    /// Depth proxy: genealogy columns present minus one.
    pub pedigree_depth: usize,
    pub parent_stats: ParentStats,
    pub clusters: Option<ClusterSummary>,
}

/// A proposed sire × dam pairing for one trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatingRecommendation {
    pub sire_id: String,
    pub dam_id: String,
    pub trait_focus: String,
    pub sire_value: f64,
    pub dam_value: f64,
    pub rationale: String,
}
