//! Per-trait sire × dam pairing of top performers.

use super::roles::{assign_roles, AmbiguousSexPolicy};
use crate::data::schema::{DAM_ID, ID, SEX, SIRE_ID};
use crate::data::{MatingRecommendation, RecordTable};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Configuration for mating recommendations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatingConfig {
    /// Sires kept per trait.
    pub top_males: usize,
    /// Dams kept per trait.
    pub top_females: usize,
    #[serde(default)]
    pub ambiguous_sex: AmbiguousSexPolicy,
}

impl Default for MatingConfig {
    fn default() -> Self {
        Self {
            top_males: 5,
            top_females: 10,
            ambiguous_sex: AmbiguousSexPolicy::KeepInBoth,
        }
    }
}

/// Recommend matings with the default ambiguity policy.
///
/// See [`recommend_matings_with_config`].
pub fn recommend_matings<S: AsRef<str>>(
    table: &RecordTable,
    traits: &[S],
    top_males: usize,
    top_females: usize,
) -> Vec<MatingRecommendation> {
    let config = MatingConfig {
        top_males,
        top_females,
        ..Default::default()
    };
    recommend_matings_with_config(table, traits, &config)
}

/// Pair the best sires with the best dams for each trait.
///
/// For each trait, in order, candidates with a value are ranked in
/// descending order (ties keep pool order), the top sires and dams are
/// kept and every sire is paired with every dam except itself. A pair
/// recommended for several traits appears once per trait.
///
/// Returns an empty list when `traits` is empty or the table lacks `id`,
/// `sex`, `sire_id`, `dam_id` or one of the traits.
pub fn recommend_matings_with_config<S: AsRef<str>>(
    table: &RecordTable,
    traits: &[S],
    config: &MatingConfig,
) -> Vec<MatingRecommendation> {
    if traits.is_empty() {
        return Vec::new();
    }

    let missing: Vec<&str> = [ID, SEX, SIRE_ID, DAM_ID]
        .into_iter()
        .chain(traits.iter().map(|t| t.as_ref()))
        .filter(|c| !table.has_column(c))
        .collect();
    if !missing.is_empty() {
        warn!(
            "No mating recommendations: missing column(s) {}",
            missing.join(", ")
        );
        return Vec::new();
    }

    let Some(pools) = assign_roles(table, config.ambiguous_sex) else {
        return Vec::new();
    };
    let Ok(ids) = table.text_column(ID) else {
        return Vec::new();
    };
    debug!(
        "Candidate pools: {} sire(s), {} dam(s)",
        pools.sires.len(),
        pools.dams.len()
    );

    let mut recommendations = Vec::new();
    for trait_name in traits.iter().map(|t| t.as_ref()) {
        let Ok(values) = table.numeric_column(trait_name) else {
            continue;
        };
        let top = |rows: &[usize], k: usize| -> Vec<(usize, f64)> {
            let mut ranked: Vec<(usize, f64)> = rows
                .iter()
                .filter_map(|&r| values[r].map(|v| (r, v)))
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            ranked.truncate(k);
            ranked
        };

        let sires = top(&pools.sires, config.top_males);
        let dams = top(&pools.dams, config.top_females);
        if sires.is_empty() || dams.is_empty() {
            debug!("'{}': no candidates with values", trait_name);
            continue;
        }

        for &(s, sire_value) in &sires {
            for &(d, dam_value) in &dams {
                if ids[s] == ids[d] {
                    continue;
                }
                recommendations.push(MatingRecommendation {
                    sire_id: ids[s].clone(),
                    dam_id: ids[d].clone(),
                    trait_focus: trait_name.to_string(),
                    sire_value,
                    dam_value,
                    rationale: format!(
                        "Recommended for {}: sire is a top performer ({:.2}), dam is a top performer ({:.2}).",
                        trait_name, sire_value, dam_value
                    ),
                });
            }
        }
    }

    info!("{} mating recommendation(s) for {} trait(s)", recommendations.len(), traits.len());
    recommendations
}
