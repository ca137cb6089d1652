//! Data profiling primitives for understanding herd tables.

mod quality;
mod traits;

pub use quality::{
    profile_quality, CategoricalSummary, ColumnProfile, NumericSummary, QualityProfile, ValueCount,
};
pub use traits::{identify_traits, AnalysisVariables};
