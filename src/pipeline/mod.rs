//! Pipeline composition and execution for herd analyses.

mod runner;

pub use runner::{run_herd_analysis, AnalysisContext, Pipeline, PipelineConfig, PipelineStep};
