//! Pedigree and genetic-structure analysis.
//!
//! Reports how much of the genealogy is recorded and groups animals by
//! their production profile (PCA followed by k-means).

mod kmeans;
mod pca;
mod structure;

pub use kmeans::{kmeans, KMeansConfig, KMeansFit};
pub use pca::{fit_pca, PcaFit};
pub use structure::{analyze_pedigree, parent_stats, pedigree_depth, phenotype_variables};
