//! Data structures for herd analysis.

mod design_matrix;
mod random_effects;
mod result;
pub mod schema;
mod table;

pub use design_matrix::DesignMatrix;
pub use random_effects::RandomIntercept;
pub use result::{
    ClusterSummary, GeneticStructureSummary, HeritabilityClass, HeritabilityResult,
    MatingRecommendation, ParentStats, TraitEstimate, TraitEstimates, TraitOutcome,
};
pub use table::{parse_number, ColumnKind, RecordTable, Value};
