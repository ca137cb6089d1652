//! Schema normalization of raw herd tables.

use super::age::parse_age_value;
use super::outliers::{clip_outliers, impute_median, TukeyFences, TUKEY_K};
use crate::data::schema::{self, ColumnRole, CANONICAL_COLUMNS};
use crate::data::{RecordTable, Value};
use crate::error::{H2Error, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// What normalization did to a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationSummary {
    /// Source column → canonical column.
    pub renamed: Vec<(String, String)>,
    /// Canonical columns created empty because no source existed.
    pub created: Vec<String>,
    /// Source columns dropped because an earlier column already mapped to
    /// the same canonical name.
    pub dropped_duplicates: Vec<String>,
    /// Cells that could not be read as numbers, per column.
    pub unparsable: BTreeMap<String, usize>,
    /// Cells filled with the column median, per column.
    pub imputed: BTreeMap<String, usize>,
    /// Cells clipped to the Tukey fences, per trait column.
    pub clipped: BTreeMap<String, usize>,
    /// Fences used for each clipped trait column.
    pub fences: BTreeMap<String, TukeyFences>,
}

impl NormalizationSummary {
    /// Total number of imputed cells.
    pub fn total_imputed(&self) -> usize {
        self.imputed.values().sum()
    }

    /// Total number of clipped cells.
    pub fn total_clipped(&self) -> usize {
        self.clipped.values().sum()
    }
}

impl std::fmt::Display for NormalizationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Normalization Summary")?;
        for (from, to) in &self.renamed {
            writeln!(f, "  Renamed:  {} -> {}", from, to)?;
        }
        if !self.created.is_empty() {
            writeln!(f, "  Created:  {}", self.created.join(", "))?;
        }
        if !self.dropped_duplicates.is_empty() {
            writeln!(f, "  Dropped duplicates: {}", self.dropped_duplicates.join(", "))?;
        }
        for (col, n) in &self.unparsable {
            writeln!(f, "  Unparsable {}: {}", col, n)?;
        }
        for (col, n) in &self.imputed {
            writeln!(f, "  Imputed {}: {}", col, n)?;
        }
        for (col, fences) in &self.fences {
            writeln!(
                f,
                "  Clipped {}: {} (fences [{:.3}, {:.3}])",
                col,
                self.clipped.get(col).copied().unwrap_or(0),
                fences.lower,
                fences.upper
            )?;
        }
        Ok(())
    }
}

/// Map a raw table onto the canonical herd schema.
///
/// Renames known columns, creates the always-present ones, coerces types,
/// imputes numeric gaps with the median and clips production traits to
/// the Tukey fences. Unknown columns are kept untouched.
///
/// # Errors
/// Returns [`H2Error::DataQuality`] when the table has no rows.
pub fn normalize(table: &RecordTable) -> Result<RecordTable> {
    normalize_with_summary(table).map(|(t, _)| t)
}

/// Like [`normalize`], also reporting what was changed.
pub fn normalize_with_summary(table: &RecordTable) -> Result<(RecordTable, NormalizationSummary)> {
    if table.is_empty() {
        return Err(H2Error::DataQuality(
            "No valid data after cleaning: the table has no rows".to_string(),
        ));
    }

    let mut summary = NormalizationSummary::default();
    let mut out = rename_columns(table, &mut summary)?;
    let n_rows = out.n_rows();

    for col in CANONICAL_COLUMNS {
        if !out.has_column(col.name) {
            if !col.always_present {
                continue;
            }
            let fill = match col.role {
                ColumnRole::Text | ColumnRole::Sex => Value::Text(String::new()),
                ColumnRole::Numeric | ColumnRole::Trait => Value::Missing,
            };
            out.set_column(col.name, vec![fill; n_rows])?;
            summary.created.push(col.name.to_string());
            continue;
        }

        match col.role {
            ColumnRole::Text => {
                let values = coerce_text(out.column(col.name)?, col.name == schema::ID);
                out.set_column(col.name, values)?;
            }
            ColumnRole::Sex => {
                let values = out
                    .column(col.name)?
                    .iter()
                    .map(|v| Value::Text(canonical_sex(&v.to_text()).to_string()))
                    .collect();
                out.set_column(col.name, values)?;
            }
            ColumnRole::Numeric | ColumnRole::Trait => {
                let raw = out.column(col.name)?;
                let mut values: Vec<Option<f64>> = if col.name == schema::AGE_AT_CALVING {
                    raw.iter().map(parse_age_value).collect()
                } else {
                    raw.iter().map(Value::to_number).collect()
                };

                let unparsable = raw
                    .iter()
                    .zip(&values)
                    .filter(|(r, v)| !r.is_missing() && v.is_none())
                    .count();
                if unparsable > 0 {
                    summary.unparsable.insert(col.name.to_string(), unparsable);
                }

                let imputed = impute_median(&mut values);
                if imputed > 0 {
                    summary.imputed.insert(col.name.to_string(), imputed);
                }

                if col.role == ColumnRole::Trait {
                    if let Some((fences, clipped)) = clip_outliers(&mut values, TUKEY_K) {
                        debug!(
                            "Clipped {} value(s) of '{}' to [{:.3}, {:.3}]",
                            clipped, col.name, fences.lower, fences.upper
                        );
                        summary.fences.insert(col.name.to_string(), fences);
                        if clipped > 0 {
                            summary.clipped.insert(col.name.to_string(), clipped);
                        }
                    }
                }

                let values = values
                    .into_iter()
                    .map(|v| v.map_or(Value::Missing, Value::Number))
                    .collect();
                out.set_column(col.name, values)?;
            }
        }
    }

    if out.is_empty() {
        return Err(H2Error::DataQuality(
            "No valid data after cleaning".to_string(),
        ));
    }

    info!(
        "Normalized {} rows: {} column(s) renamed, {} created, {} cell(s) imputed, {} clipped",
        n_rows,
        summary.renamed.len(),
        summary.created.len(),
        summary.total_imputed(),
        summary.total_clipped()
    );
    Ok((out, summary))
}

/// Rebuild the table under canonical names, keeping unknown columns.
fn rename_columns(table: &RecordTable, summary: &mut NormalizationSummary) -> Result<RecordTable> {
    let mut claimed: HashSet<&'static str> = HashSet::new();
    let mut columns: Vec<(String, Vec<Value>)> = Vec::with_capacity(table.n_columns());

    for name in table.column_names() {
        let values = table.column(name)?.to_vec();
        match schema::resolve_alias(name) {
            Some(canonical) if claimed.insert(canonical) => {
                if name != canonical {
                    debug!("Renaming column '{}' to '{}'", name, canonical);
                    summary.renamed.push((name.clone(), canonical.to_string()));
                }
                columns.push((canonical.to_string(), values));
            }
            Some(canonical) => {
                debug!("Dropping column '{}': '{}' already mapped", name, canonical);
                summary.dropped_duplicates.push(name.clone());
            }
            None => columns.push((name.trim().to_string(), values)),
        }
    }

    RecordTable::from_columns(columns)
}

/// Text coercion for identifier columns. `id` never becomes missing.
fn coerce_text(values: &[Value], never_missing: bool) -> Vec<Value> {
    values
        .iter()
        .map(|v| {
            let text = v.to_text();
            if text.is_empty() && !never_missing {
                Value::Missing
            } else {
                Value::Text(text)
            }
        })
        .collect()
}

/// Canonical sex label: `"Male"`, `"Female"` or `""` when unknown.
pub fn canonical_sex(raw: &str) -> &'static str {
    let key: String = raw
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    match key.as_str() {
        "m" | "male" | "masculin" | "taureau" => "Male",
        "f" | "female" | "femelle" | "feminin" | "vache" | "genisse" => "Female",
        _ => "",
    }
}
