//! Canonical herd schema: column names, source aliases and the lookup sanitizer.
//!
//! Source files spell the same field many ways (`N° SNIT`, `NÂ° SNIT`, `ID`).
//! Renaming is driven by a fixed alias table; the sanitizer only makes the
//! lookup tolerant to accents, spacing, symbols and case.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const ID: &str = "id";
pub const LACTATION: &str = "lactation";
pub const AGE_AT_CALVING: &str = "age_at_calving";
pub const MILK_YIELD: &str = "milk_yield";
pub const FAT_PCT: &str = "fat_pct";
pub const PROTEIN_PCT: &str = "protein_pct";
pub const FAT_KG: &str = "fat_kg";
pub const PROTEIN_KG: &str = "protein_kg";
pub const SIRE_ID: &str = "sire_id";
pub const DAM_ID: &str = "dam_id";
pub const SEX: &str = "sex";

/// Semantic type of a canonical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    /// Identifier or reference stored as text.
    Text,
    /// Numeric covariate (fixed effect candidate).
    Numeric,
    /// Numeric production trait, subject to outlier clipping.
    Trait,
    /// Categorical sex code.
    Sex,
}

/// A canonical column and the source spellings that map onto it.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalColumn {
    pub name: &'static str,
    pub role: ColumnRole,
    /// Created (empty) by normalization when no source column exists.
    pub always_present: bool,
    pub aliases: &'static [&'static str],
}

/// The fixed alias table.
pub const CANONICAL_COLUMNS: &[CanonicalColumn] = &[
    CanonicalColumn {
        name: ID,
        role: ColumnRole::Text,
        always_present: true,
        aliases: &["N° SNIT", "NÂ° SNIT", "N SNIT", "ID", "Identifiant"],
    },
    CanonicalColumn {
        name: LACTATION,
        role: ColumnRole::Numeric,
        always_present: true,
        aliases: &["N° LACT", "NÂ° LACT", "N LACT", "Lactation"],
    },
    CanonicalColumn {
        name: AGE_AT_CALVING,
        role: ColumnRole::Numeric,
        always_present: true,
        aliases: &["Age Vêlage", "Age VÃªlage", "Age_velage", "Age au vêlage"],
    },
    CanonicalColumn {
        name: MILK_YIELD,
        role: ColumnRole::Trait,
        always_present: true,
        aliases: &["Kg Lait", "Rendement_lait", "Rendement lait"],
    },
    CanonicalColumn {
        name: FAT_PCT,
        role: ColumnRole::Trait,
        always_present: true,
        aliases: &["% MG", "Taux_mg", "TB"],
    },
    CanonicalColumn {
        name: PROTEIN_PCT,
        role: ColumnRole::Trait,
        always_present: true,
        aliases: &["% Prot", "Taux_prot", "TP"],
    },
    CanonicalColumn {
        name: FAT_KG,
        role: ColumnRole::Trait,
        always_present: false,
        aliases: &["Kg MG", "Kg_MG"],
    },
    CanonicalColumn {
        name: PROTEIN_KG,
        role: ColumnRole::Trait,
        always_present: false,
        aliases: &["Kg Prot", "Kg_Prot"],
    },
    CanonicalColumn {
        name: SIRE_ID,
        role: ColumnRole::Text,
        always_present: false,
        aliases: &["Père", "PÃ¨re", "Pere", "Sire"],
    },
    CanonicalColumn {
        name: DAM_ID,
        role: ColumnRole::Text,
        always_present: false,
        aliases: &["Mère", "MÃ¨re", "Mere", "Dam"],
    },
    CanonicalColumn {
        name: SEX,
        role: ColumnRole::Sex,
        always_present: false,
        aliases: &["Sex", "Sexe"],
    },
];

/// Production trait columns in canonical order.
pub const TRAIT_COLUMNS: &[&str] = &[MILK_YIELD, FAT_PCT, PROTEIN_PCT, FAT_KG, PROTEIN_KG];

/// Optional fixed effects for the mixed model, in formula order.
pub const FIXED_EFFECT_COLUMNS: &[&str] = &[LACTATION, AGE_AT_CALVING];

/// Look up a canonical column definition by canonical name.
pub fn canonical(name: &str) -> Option<&'static CanonicalColumn> {
    CANONICAL_COLUMNS.iter().find(|c| c.name == name)
}

/// Sanitize a column name for lookup: strip accents, map spaces and
/// separators to `_`, `%` to `pct`, drop other symbols, prefix names that
/// start with a digit.
pub fn sanitize_column_name(name: &str) -> String {
    let stripped: String = name.trim().nfd().filter(|c| !is_combining_mark(*c)).collect();
    let mut out = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        match c {
            ' ' | '-' | '/' => out.push('_'),
            '%' => out.push_str("pct"),
            c if c.is_alphanumeric() || c == '_' => out.push(c),
            _ => {}
        }
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn lookup_key(name: &str) -> String {
    sanitize_column_name(name).to_lowercase()
}

/// Resolve a source column name to its canonical name, if any.
pub fn resolve_alias(source: &str) -> Option<&'static str> {
    let key = lookup_key(source);
    if key.is_empty() {
        return None;
    }
    CANONICAL_COLUMNS
        .iter()
        .find(|c| lookup_key(c.name) == key || c.aliases.iter().any(|a| lookup_key(a) == key))
        .map(|c| c.name)
}

/// Whether a column name looks like a production trait (yield, fat or protein).
pub fn is_trait_like(name: &str) -> bool {
    const TOKENS: &[&str] = &["yield", "milk", "lait", "fat", "mg", "prot"];
    let key = lookup_key(name);
    TOKENS.iter().any(|t| key.contains(t))
}
