//! Genealogical depth, parent knowledge and phenotypic grouping.

use super::kmeans::{kmeans, KMeansConfig};
use super::pca::fit_pca;
use crate::data::schema::{self, DAM_ID, ID, SIRE_ID};
use crate::data::{ClusterSummary, ColumnKind, GeneticStructureSummary, ParentStats, RecordTable, Value};
use log::{debug, info};
use nalgebra::DMatrix;

/// Placeholder used by herd books for an unknown parent.
const UNKNOWN_PARENT: &str = "0";

/// Summarize the pedigree and genetic structure of a canonical table.
///
/// Never fails: when grouping is impossible (too few trait columns or
/// complete rows, degenerate data) `clusters` is `None`.
pub fn analyze_pedigree(table: &RecordTable) -> GeneticStructureSummary {
    let pedigree_depth = pedigree_depth(table);
    let parent_stats = parent_stats(table);
    let clusters = cluster_phenotypes(table);

    info!(
        "Pedigree: depth {}, {} with both parents, {} with one, {} with none, {}",
        pedigree_depth,
        parent_stats.both_known,
        parent_stats.one_known,
        parent_stats.none_known,
        clusters
            .as_ref()
            .map_or_else(|| "no clusters".to_string(), |c| format!("{} clusters", c.n_clusters()))
    );

    GeneticStructureSummary {
        pedigree_depth,
        parent_stats,
        clusters,
    }
}

/// Genealogy columns present among {id, sire_id, dam_id}, minus one.
pub fn pedigree_depth(table: &RecordTable) -> usize {
    [ID, SIRE_ID, DAM_ID]
        .iter()
        .filter(|c| table.has_column(c))
        .count()
        .saturating_sub(1)
}

fn parent_known(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Missing) => false,
        Some(v) => {
            let text = v.to_text();
            !text.is_empty() && text != UNKNOWN_PARENT
        }
    }
}

/// Tally records by number of known parents. Always sums to the row count.
pub fn parent_stats(table: &RecordTable) -> ParentStats {
    let mut stats = ParentStats::default();
    for row in 0..table.n_rows() {
        let known = [SIRE_ID, DAM_ID]
            .iter()
            .filter(|c| parent_known(table.get(row, c)))
            .count();
        match known {
            2 => stats.both_known += 1,
            1 => stats.one_known += 1,
            _ => stats.none_known += 1,
        }
    }
    stats
}

/// Numeric trait-like columns with at least one value.
pub fn phenotype_variables(table: &RecordTable) -> Vec<String> {
    table
        .column_names()
        .iter()
        .filter(|name| schema::is_trait_like(name))
        .filter(|name| table.column_kind(name) == Some(ColumnKind::Numeric))
        .cloned()
        .collect()
}

fn cluster_phenotypes(table: &RecordTable) -> Option<ClusterSummary> {
    let variables = phenotype_variables(table);
    if variables.len() < 2 {
        debug!("Clustering skipped: {} phenotype column(s)", variables.len());
        return None;
    }

    let columns: Vec<Vec<Option<f64>>> = variables
        .iter()
        .map(|v| table.numeric_column(v))
        .collect::<crate::error::Result<_>>()
        .ok()?;

    let rows: Vec<usize> = (0..table.n_rows())
        .filter(|&r| columns.iter().all(|c| c[r].is_some()))
        .collect();
    if rows.len() < 2 {
        debug!("Clustering skipped: {} complete row(s)", rows.len());
        return None;
    }

    let data = DMatrix::from_fn(rows.len(), variables.len(), |i, j| {
        columns[j][rows[i]].unwrap_or(f64::NAN)
    });

    let n_components = rows.len().min(variables.len()).min(2);
    let pca = fit_pca(&data, n_components)?;

    let config = KMeansConfig {
        n_clusters: rows.len().min(3),
        ..Default::default()
    };
    if config.n_clusters < 2 {
        return None;
    }
    let fit = kmeans(&pca.scores, &config)?;
    if fit.n_used_clusters() < 2 {
        debug!("Clustering skipped: fewer than 2 non-empty groups");
        return None;
    }

    let centers = (0..fit.centers.nrows())
        .map(|c| fit.centers.row(c).iter().copied().collect())
        .collect();

    Some(ClusterSummary {
        variables,
        rows,
        labels: fit.labels,
        centers,
        explained_variance: pca.explained_variance_ratio,
    })
}
