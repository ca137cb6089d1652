//! Composable Heritability Analysis Library
//!
//! This library provides modular primitives for estimating the heritability
//! of production traits in dairy herds and turning the results into mating
//! recommendations.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (RecordTable, canonical schema, results)
//! - **normalize**: Schema normalization (aliases, ages, imputation, outliers)
//! - **profile**: Data profiling (quality profile, trait identification)
//! - **pedigree**: Genetic structure (pedigree depth, parent completeness, PCA + k-means)
//! - **model**: Random-intercept mixed model (REML) and heritability estimation
//! - **mating**: Sire × dam recommendations from phenotypic rankings
//! - **pipeline**: Pipeline composition and execution
//! - **report**: Aggregated analysis report
//! - **benchmark**: Synthetic herds with known variance components
//!
//! # Example
//!
//! ```no_run
//! use composable_h2::prelude::*;
//!
//! // Load a raw herd-book export
//! let table = RecordTable::from_path("herd.csv").unwrap();
//!
//! // Run analysis pipeline
//! let context = Pipeline::new()
//!     .normalize()
//!     .analyze_pedigree()
//!     .estimate_heritability()
//!     .recommend_matings(5, 10)
//!     .run(&table)
//!     .unwrap();
//!
//! let report = AnalysisReport::from_context(&context, "herd manager");
//! println!("{}", report);
//! ```

pub mod benchmark;
pub mod data;
pub mod error;
pub mod mating;
pub mod model;
pub mod normalize;
pub mod pedigree;
pub mod pipeline;
pub mod profile;
pub mod report;
mod rng;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::benchmark::{generate_herd, HerdConfig, HerdTruth, SyntheticHerd};
    pub use crate::data::schema;
    pub use crate::data::{
        ClusterSummary, GeneticStructureSummary, HeritabilityClass, HeritabilityResult,
        MatingRecommendation, ParentStats, RecordTable, TraitEstimate, TraitEstimates,
        TraitOutcome, Value,
    };
    pub use crate::error::{H2Error, Result};
    pub use crate::mating::{
        recommend_matings, recommend_matings_with_config, AmbiguousSexPolicy, MatingConfig,
    };
    pub use crate::model::{
        estimate_all, estimate_heritability, estimate_heritability_with_config,
        fit_random_intercept, LmmConfig, RandomInterceptFit,
    };
    pub use crate::normalize::{normalize, normalize_with_summary, parse_age, NormalizationSummary};
    pub use crate::pedigree::analyze_pedigree;
    pub use crate::pipeline::{
        run_herd_analysis, AnalysisContext, Pipeline, PipelineConfig, PipelineStep,
    };
    pub use crate::profile::{identify_traits, profile_quality, AnalysisVariables, QualityProfile};
    pub use crate::report::{AnalysisReport, GeneticInfluence, Interpretation};
}
