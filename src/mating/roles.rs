//! Sire and dam candidate pools.

use crate::data::schema::{DAM_ID, ID, SEX, SIRE_ID};
use crate::data::RecordTable;
use crate::normalize::canonical_sex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Biological sex of an animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Parse a sex label (`"Male"`, `"F"`, `"femelle"`, ...). Unknown labels give `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match canonical_sex(label) {
            "Male" => Some(Sex::Male),
            "Female" => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }
}

/// What to do with an animal that lands in both pools without an explicit sex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguousSexPolicy {
    /// Keep the animal as both sire and dam candidate.
    #[default]
    KeepInBoth,
    /// Drop the animal from both pools.
    ExcludeFromBoth,
}

/// One candidate row per animal for each role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RolePools {
    /// Table rows of sire candidates.
    pub sires: Vec<usize>,
    /// Table rows of dam candidates.
    pub dams: Vec<usize>,
}

/// Assign sire and dam roles.
///
/// Animals with an explicit sex come first, followed by animals referenced
/// as a parent; each animal keeps its first row. When an animal lands in
/// both pools, any explicit sex on its rows decides; otherwise `policy`
/// applies. The table must hold `id`, `sex`, `sire_id` and `dam_id`.
pub fn assign_roles(table: &RecordTable, policy: AmbiguousSexPolicy) -> Option<RolePools> {
    let ids = table.text_column(ID).ok()?;
    let sexes: Vec<Option<Sex>> = table
        .text_column(SEX)
        .ok()?
        .iter()
        .map(|s| Sex::from_label(s))
        .collect();
    let sire_refs = referenced_ids(table, SIRE_ID)?;
    let dam_refs = referenced_ids(table, DAM_ID)?;

    let pool = |sex: Sex, refs: &HashSet<String>| -> Vec<usize> {
        let by_sex = (0..ids.len()).filter(|&r| sexes[r] == Some(sex));
        let by_ref = (0..ids.len()).filter(|&r| refs.contains(&ids[r]));
        let mut seen = HashSet::new();
        by_sex
            .chain(by_ref)
            .filter(|&r| !ids[r].is_empty() && seen.insert(ids[r].as_str()))
            .collect()
    };
    let mut sires = pool(Sex::Male, &sire_refs);
    let mut dams = pool(Sex::Female, &dam_refs);

    let sire_ids: HashSet<&str> = sires.iter().map(|&r| ids[r].as_str()).collect();
    let dam_ids: HashSet<&str> = dams.iter().map(|&r| ids[r].as_str()).collect();
    let common: HashSet<&str> = sire_ids.intersection(&dam_ids).copied().collect();

    let mut not_sire: HashSet<&str> = HashSet::new();
    let mut not_dam: HashSet<&str> = HashSet::new();
    for id in &common {
        let declared: Vec<Sex> = (0..ids.len())
            .filter(|&r| ids[r] == *id)
            .filter_map(|r| sexes[r])
            .collect();
        let male = declared.contains(&Sex::Male);
        let female = declared.contains(&Sex::Female);
        if male {
            not_dam.insert(*id);
        }
        if female {
            not_sire.insert(*id);
        }
        if !male && !female && policy == AmbiguousSexPolicy::ExcludeFromBoth {
            not_dam.insert(*id);
            not_sire.insert(*id);
        }
    }

    sires.retain(|&r| !not_sire.contains(ids[r].as_str()));
    dams.retain(|&r| !not_dam.contains(ids[r].as_str()));
    Some(RolePools { sires, dams })
}

fn referenced_ids(table: &RecordTable, column: &str) -> Option<HashSet<String>> {
    Some(
        table
            .text_column(column)
            .ok()?
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect(),
    )
}
