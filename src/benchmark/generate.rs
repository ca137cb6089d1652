//! Synthetic herd generation for benchmarking and testing.
//!
//! Generates raw herd-book tables (source column names, free-text ages,
//! outliers, gaps) with a known split of genetic and residual variance, so
//! estimates can be compared against the truth.

use crate::data::{RecordTable, Value};
use crate::error::Result;
use crate::rng::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for synthetic herd generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HerdConfig {
    /// Name/identifier for this dataset.
    pub name: String,
    /// Number of cows.
    pub n_cows: usize,
    /// Number of sires. Each sire also gets one record.
    pub n_sires: usize,
    /// Lactations recorded per cow.
    pub lactations_per_cow: usize,
    /// Between-animal (genetic) variance of milk yield.
    pub genetic_variance: f64,
    /// Within-animal (residual) variance of milk yield.
    pub residual_variance: f64,
    /// Herd mean milk yield in first lactation (kg).
    pub mean_milk: f64,
    /// Yield gained per additional lactation (kg).
    pub lactation_effect: f64,
    /// Share of cows whose dam is recorded.
    pub dam_known_fraction: f64,
    /// Share of milk records replaced by gross outliers.
    pub outlier_fraction: f64,
    /// Share of milk records left blank.
    pub missing_fraction: f64,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for HerdConfig {
    fn default() -> Self {
        Self {
            name: "synthetic_herd".to_string(),
            n_cows: 60,
            n_sires: 6,
            lactations_per_cow: 3,
            genetic_variance: 250_000.0,
            residual_variance: 250_000.0,
            mean_milk: 6500.0,
            lactation_effect: 400.0,
            dam_known_fraction: 0.6,
            outlier_fraction: 0.01,
            missing_fraction: 0.02,
            seed: 42,
        }
    }
}

impl HerdConfig {
    /// Create a new config with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Set herd dimensions.
    pub fn with_dimensions(mut self, n_cows: usize, n_sires: usize, lactations: usize) -> Self {
        self.n_cows = n_cows;
        self.n_sires = n_sires;
        self.lactations_per_cow = lactations.max(1);
        self
    }

    /// Set variance components from a target heritability and phenotypic variance.
    pub fn with_heritability(mut self, h2: f64, phenotypic_variance: f64) -> Self {
        let h2 = h2.clamp(0.0, 1.0);
        self.genetic_variance = h2 * phenotypic_variance;
        self.residual_variance = (1.0 - h2) * phenotypic_variance;
        self
    }

    /// Set data defects.
    pub fn with_defects(mut self, outlier_fraction: f64, missing_fraction: f64) -> Self {
        self.outlier_fraction = outlier_fraction.clamp(0.0, 1.0);
        self.missing_fraction = missing_fraction.clamp(0.0, 1.0);
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// True heritability of milk yield.
    pub fn true_h2(&self) -> f64 {
        let total = self.genetic_variance + self.residual_variance;
        if total > 0.0 {
            self.genetic_variance / total
        } else {
            0.0
        }
    }

    // Preset configurations

    /// Clean, well-replicated herd.
    pub fn ideal() -> Self {
        Self::new("ideal")
            .with_dimensions(120, 8, 4)
            .with_heritability(0.35, 500_000.0)
            .with_defects(0.0, 0.0)
    }

    /// Typical herd book extract.
    pub fn typical() -> Self {
        Self::new("typical").with_heritability(0.3, 500_000.0)
    }

    /// Trait with strong genetic control.
    pub fn high_heritability() -> Self {
        Self::new("high_heritability").with_heritability(0.6, 500_000.0)
    }

    /// Trait with little genetic control.
    pub fn low_heritability() -> Self {
        Self::new("low_heritability").with_heritability(0.1, 500_000.0)
    }

    /// Small herd.
    pub fn small() -> Self {
        Self::new("small").with_dimensions(10, 3, 2)
    }
}

/// Ground truth for a synthetic herd.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HerdTruth {
    /// True heritability of milk yield.
    pub h2: f64,
    pub genetic_variance: f64,
    pub residual_variance: f64,
    /// Simulated genetic deviation of each animal for milk yield.
    pub breeding_values: BTreeMap<String, f64>,
    /// Records turned into outliers.
    pub n_outliers: usize,
}

/// Result of synthetic herd generation.
#[derive(Debug, Clone)]
pub struct SyntheticHerd {
    /// Raw table, as exported from a herd book.
    pub table: RecordTable,
    /// Ground truth.
    pub truth: HerdTruth,
    /// Configuration used.
    pub config: HerdConfig,
}

impl SyntheticHerd {
    /// Write the table, ground truth and configuration to a directory.
    pub fn write_to_dir(&self, dir: &std::path::Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        self.table.to_csv(dir.join("herd.csv"))?;
        std::fs::write(
            dir.join("ground_truth.json"),
            serde_json::to_string_pretty(&self.truth)?,
        )?;
        std::fs::write(dir.join("config.yaml"), serde_yaml::to_string(&self.config)?)?;
        Ok(())
    }
}

/// Column buffers for the raw table.
#[derive(Default)]
struct Columns {
    id: Vec<Value>,
    sex: Vec<Value>,
    sire: Vec<Value>,
    dam: Vec<Value>,
    lactation: Vec<Value>,
    age: Vec<Value>,
    milk: Vec<Value>,
    fat: Vec<Value>,
    protein: Vec<Value>,
}

/// Generate a synthetic herd.
///
/// Milk yield follows `mean + lactation effect + u + e` with `u` drawn once
/// per animal from N(0, genetic variance) and `e` per record from
/// N(0, residual variance). Fat and protein percentages follow the same
/// structure on their own scales.
pub fn generate_herd(config: &HerdConfig) -> Result<SyntheticHerd> {
    let mut rng = Rng::new(config.seed);
    let genetic_sd = config.genetic_variance.max(0.0).sqrt();
    let residual_sd = config.residual_variance.max(0.0).sqrt();

    let sire_ids: Vec<String> = (1..=config.n_sires).map(|i| format!("T{:03}", i)).collect();
    let cow_ids: Vec<String> = (1..=config.n_cows).map(|i| format!("V{:04}", i)).collect();

    let mut breeding_values = BTreeMap::new();
    let mut cols = Columns::default();
    let mut n_outliers = 0;

    for id in &sire_ids {
        let u = rng.next_normal(0.0, genetic_sd);
        breeding_values.insert(id.clone(), u);
        cols.id.push(Value::Text(id.clone()));
        cols.sex.push(Value::Text("M".to_string()));
        cols.sire.push(Value::Missing);
        cols.dam.push(Value::Missing);
        cols.lactation.push(Value::Missing);
        cols.age.push(Value::Missing);
        cols.milk
            .push(Value::Number(round(config.mean_milk + u + rng.next_normal(0.0, residual_sd))));
        cols.fat.push(Value::Number(round2(rng.next_normal(4.0, 0.3))));
        cols.protein.push(Value::Number(round2(rng.next_normal(3.2, 0.2))));
    }

    for (c, id) in cow_ids.iter().enumerate() {
        let u = rng.next_normal(0.0, genetic_sd);
        let u_fat = rng.next_normal(0.0, 0.2);
        let u_protein = rng.next_normal(0.0, 0.12);
        breeding_values.insert(id.clone(), u);

        let sire = if sire_ids.is_empty() {
            Value::Missing
        } else {
            Value::Text(sire_ids[rng.next_index(sire_ids.len())].clone())
        };
        let dam = if c > 0 && rng.next_bool(config.dam_known_fraction) {
            Value::Text(cow_ids[rng.next_index(c)].clone())
        } else {
            Value::Text("0".to_string())
        };
        let first_calving_months = 22 + rng.next_index(8);

        for lactation in 1..=config.lactations_per_cow {
            let months = first_calving_months + 13 * (lactation - 1);
            cols.id.push(Value::Text(id.clone()));
            cols.sex.push(Value::Text("F".to_string()));
            cols.sire.push(sire.clone());
            cols.dam.push(dam.clone());
            cols.lactation.push(Value::Number(lactation as f64));
            cols.age.push(Value::Text(age_label(months, &mut rng)));

            let milk = config.mean_milk
                + config.lactation_effect * (lactation - 1) as f64
                + u
                + rng.next_normal(0.0, residual_sd);
            let milk = if rng.next_bool(config.missing_fraction) {
                Value::Missing
            } else if rng.next_bool(config.outlier_fraction) {
                n_outliers += 1;
                Value::Number(round(milk * 4.0))
            } else {
                Value::Number(round(milk))
            };
            cols.milk.push(milk);
            cols.fat
                .push(Value::Number(round2(4.0 + u_fat + rng.next_normal(0.0, 0.2))));
            cols.protein
                .push(Value::Number(round2(3.2 + u_protein + rng.next_normal(0.0, 0.12))));
        }
    }

    let columns = vec![
        ("N° SNIT".to_string(), cols.id),
        ("Sexe".to_string(), cols.sex),
        ("Père".to_string(), cols.sire),
        ("Mère".to_string(), cols.dam),
        ("N° LACT".to_string(), cols.lactation),
        ("Age Vêlage".to_string(), cols.age),
        ("Kg Lait".to_string(), cols.milk),
        ("% MG".to_string(), cols.fat),
        ("% Prot".to_string(), cols.protein),
    ];
    let table = RecordTable::from_columns(columns)?;

    Ok(SyntheticHerd {
        table,
        truth: HerdTruth {
            h2: config.true_h2(),
            genetic_variance: config.genetic_variance,
            residual_variance: config.residual_variance,
            breeding_values,
            n_outliers,
        },
        config: config.clone(),
    })
}

/// Age at calving as a herd book would spell it.
fn age_label(months: usize, rng: &mut Rng) -> String {
    let (years, rest) = (months / 12, months % 12);
    match rng.next_index(3) {
        0 => format!("{} ans {} mois", years, rest),
        1 => format!("{}a {}m", years, rest),
        _ => format!("{}", months),
    }
}

fn round(v: f64) -> f64 {
    v.round()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
