//! Data quality profiling for record tables.

use crate::data::schema::ID;
use crate::data::{ColumnKind, RecordTable, Value};
use crate::normalize::median;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Most frequent values reported per categorical column.
const TOP_VALUES: usize = 5;

/// Summary of a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

/// A frequent categorical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
    /// Share of all rows, in percent.
    pub pct: f64,
}

/// Summary of a categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    pub n_unique: usize,
    pub top_values: Vec<ValueCount>,
}

/// Profile of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    pub n_missing: usize,
    /// Share of missing cells, in percent.
    pub missing_pct: f64,
    pub numeric: Option<NumericSummary>,
    pub categorical: Option<CategoricalSummary>,
}

/// Data quality profile of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub n_rows: usize,
    pub n_columns: usize,
    pub columns: Vec<ColumnProfile>,
    /// Rows identical to an earlier row.
    pub n_duplicate_rows: usize,
}

impl QualityProfile {
    /// Get the profile of a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns with at least one missing cell.
    pub fn columns_with_missing(&self) -> Vec<&ColumnProfile> {
        self.columns.iter().filter(|c| c.n_missing > 0).collect()
    }

    /// Share of duplicated rows, in percent.
    pub fn duplicate_pct(&self) -> f64 {
        if self.n_rows == 0 {
            0.0
        } else {
            self.n_duplicate_rows as f64 / self.n_rows as f64 * 100.0
        }
    }
}

impl std::fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Data Quality Profile")?;
        writeln!(f, "  Rows:    {}", self.n_rows)?;
        writeln!(f, "  Columns: {}", self.n_columns)?;

        writeln!(f, "\nColumn types:")?;
        for c in &self.columns {
            writeln!(f, "  - {}: {:?}", c.name, c.kind)?;
        }

        let missing = self.columns_with_missing();
        if !missing.is_empty() {
            writeln!(f, "\nMissing values:")?;
            for c in missing {
                writeln!(f, "  - {}: {} missing ({:.1}%)", c.name, c.n_missing, c.missing_pct)?;
            }
        }

        let numeric: Vec<_> = self.columns.iter().filter(|c| c.kind == ColumnKind::Numeric).collect();
        if !numeric.is_empty() {
            writeln!(f, "\nNumeric variables:")?;
            for c in numeric {
                match &c.numeric {
                    Some(s) => writeln!(
                        f,
                        "  - {}: min {:.2}, max {:.2}, mean {:.2}, median {:.2}",
                        c.name, s.min, s.max, s.mean, s.median
                    )?,
                    None => writeln!(f, "  - {}: all values missing", c.name)?,
                }
            }
        }

        let categorical: Vec<_> = self.columns.iter().filter(|c| c.categorical.is_some()).collect();
        if !categorical.is_empty() {
            writeln!(f, "\nCategorical variables:")?;
            for c in categorical {
                if let Some(s) = &c.categorical {
                    writeln!(f, "  - {}: {} unique values", c.name, s.n_unique)?;
                    for v in &s.top_values {
                        writeln!(f, "    * {}: {} ({:.1}%)", v.value, v.count, v.pct)?;
                    }
                }
            }
        }

        if self.n_duplicate_rows > 0 {
            writeln!(
                f,
                "\nDuplicates: {} duplicated rows ({:.1}%)",
                self.n_duplicate_rows,
                self.duplicate_pct()
            )?;
        }
        Ok(())
    }
}

/// Profile column types, missingness, distributions and duplicates.
pub fn profile_quality(table: &RecordTable) -> QualityProfile {
    let n_rows = table.n_rows();
    let pct = |count: usize| {
        if n_rows == 0 {
            0.0
        } else {
            count as f64 / n_rows as f64 * 100.0
        }
    };

    let columns = table
        .column_names()
        .iter()
        .filter_map(|name| {
            let values = table.column(name).ok()?;
            let kind = table.column_kind(name)?;
            let n_missing = values.iter().filter(|v| v.is_missing()).count();

            let numeric = match kind {
                ColumnKind::Numeric => numeric_summary(values),
                _ => None,
            };
            let categorical = match kind {
                ColumnKind::Text if name != ID => Some(categorical_summary(values, &pct)),
                _ => None,
            };

            Some(ColumnProfile {
                name: name.clone(),
                kind,
                n_missing,
                missing_pct: pct(n_missing),
                numeric,
                categorical,
            })
        })
        .collect();

    QualityProfile {
        n_rows,
        n_columns: table.n_columns(),
        columns,
        n_duplicate_rows: count_duplicate_rows(table),
    }
}

fn numeric_summary(values: &[Value]) -> Option<NumericSummary> {
    let present: Vec<f64> = values.iter().filter_map(Value::as_number).collect();
    if present.is_empty() {
        return None;
    }
    Some(NumericSummary {
        min: present.iter().copied().fold(f64::INFINITY, f64::min),
        max: present.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean: present.iter().sum::<f64>() / present.len() as f64,
        median: median(&present)?,
    })
}

fn categorical_summary(values: &[Value], pct: &dyn Fn(usize) -> f64) -> CategoricalSummary {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for v in values.iter().filter(|v| !v.is_missing()) {
        let key = v.to_text();
        let entry = counts.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            0
        });
        *entry += 1;
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|k| {
            let c = counts[&k];
            (k, c)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    CategoricalSummary {
        n_unique: ranked.len(),
        top_values: ranked
            .into_iter()
            .take(TOP_VALUES)
            .map(|(value, count)| ValueCount {
                value,
                count,
                pct: pct(count),
            })
            .collect(),
    }
}

fn count_duplicate_rows(table: &RecordTable) -> usize {
    let mut seen = HashSet::new();
    (0..table.n_rows())
        .filter(|&r| {
            let key: Vec<String> = table.row(r).iter().map(|v| v.to_text()).collect();
            !seen.insert(key)
        })
        .count()
}
