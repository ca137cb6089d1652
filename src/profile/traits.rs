//! Identification of the variables available for heritability analysis.

use crate::data::schema::{self, DAM_ID, ID, SIRE_ID, TRAIT_COLUMNS};
use crate::data::RecordTable;
use crate::error::{H2Error, Result};
use serde::{Deserialize, Serialize};

/// Columns to use for an analysis, as named in the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisVariables {
    pub id: String,
    pub sire: Option<String>,
    pub dam: Option<String>,
    /// Production traits with at least one numeric value, in canonical order.
    pub traits: Vec<String>,
}

/// Find the identifier, parent and trait columns of a table.
///
/// Works on raw or canonical tables: columns are matched through the alias
/// table.
///
/// # Errors
/// [`H2Error::Structural`] when no identifier column or no production trait
/// is present.
pub fn identify_traits(table: &RecordTable) -> Result<AnalysisVariables> {
    let find = |canonical: &str| -> Option<String> {
        table
            .column_names()
            .iter()
            .find(|name| schema::resolve_alias(name) == Some(canonical))
            .cloned()
    };

    let id = find(ID).ok_or_else(|| {
        H2Error::Structural("No identifier column (N° SNIT or ID) found".to_string())
    })?;

    let traits: Vec<String> = TRAIT_COLUMNS
        .iter()
        .filter_map(|t| find(*t))
        .filter(|name| {
            table
                .numeric_column(name)
                .map(|v| v.iter().any(|x| x.is_some()))
                .unwrap_or(false)
        })
        .collect();
    if traits.is_empty() {
        return Err(H2Error::Structural(
            "No production traits found (milk yield, fat or protein)".to_string(),
        ));
    }

    Ok(AnalysisVariables {
        id,
        sire: find(SIRE_ID),
        dam: find(DAM_ID),
        traits,
    })
}
