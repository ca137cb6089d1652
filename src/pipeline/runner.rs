//! Pipeline runner for composing and executing herd analysis steps.

use crate::data::{GeneticStructureSummary, MatingRecommendation, RecordTable, TraitEstimates};
use crate::error::{H2Error, Result};
use crate::mating::{recommend_matings_with_config, MatingConfig};
use crate::model::{estimate_all, LmmConfig};
use crate::normalize::{normalize_with_summary, NormalizationSummary};
use crate::pedigree::analyze_pedigree;
use crate::profile::{identify_traits, profile_quality, QualityProfile};
use log::info;
use serde::{Deserialize, Serialize};

/// A step in the analysis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineStep {
    // === Cleaning ===
    /// Map raw columns onto the canonical schema and clean values.
    Normalize,

    // === Profiling ===
    /// Profile data quality of the current table.
    ProfileQuality,

    // === Genetic structure ===
    /// Summarize pedigree depth, parent completeness and phenotype clusters.
    AnalyzePedigree,

    // === Modeling ===
    /// Estimate heritability per trait. `None` uses every trait with data.
    EstimateHeritability {
        #[serde(default)]
        traits: Option<Vec<String>>,
        #[serde(default)]
        config: LmmConfig,
    },

    // === Selection ===
    /// Pair top sires and dams per trait. `None` uses the estimated traits.
    RecommendMatings {
        #[serde(default)]
        traits: Option<Vec<String>>,
        #[serde(default)]
        config: MatingConfig,
    },
}

impl PipelineStep {
    /// Short label used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStep::Normalize => "normalize",
            PipelineStep::ProfileQuality => "profile_quality",
            PipelineStep::AnalyzePedigree => "analyze_pedigree",
            PipelineStep::EstimateHeritability { .. } => "estimate_heritability",
            PipelineStep::RecommendMatings { .. } => "recommend_matings",
        }
    }
}

/// Pipeline configuration for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name of the pipeline.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Steps to execute.
    pub steps: Vec<PipelineStep>,
}

impl PipelineConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(H2Error::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(H2Error::from)
    }
}

/// Everything produced by a pipeline run.
///
/// Each step fills its own slot; later steps read what earlier steps left.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    /// Pipeline name.
    pub name: String,
    /// Current table: raw until a `Normalize` step ran, canonical after.
    pub table: RecordTable,
    pub normalization: Option<NormalizationSummary>,
    pub quality: Option<QualityProfile>,
    pub structure: Option<GeneticStructureSummary>,
    pub estimates: Option<TraitEstimates>,
    pub recommendations: Option<Vec<MatingRecommendation>>,
}

impl AnalysisContext {
    fn new(name: &str, table: RecordTable) -> Self {
        Self {
            name: name.to_string(),
            table,
            normalization: None,
            quality: None,
            structure: None,
            estimates: None,
            recommendations: None,
        }
    }

    /// Whether the table has been mapped onto the canonical schema.
    pub fn is_normalized(&self) -> bool {
        self.normalization.is_some()
    }

    fn require_normalized(&self, what: &str) -> Result<()> {
        if self.is_normalized() {
            Ok(())
        } else {
            Err(H2Error::Pipeline(format!("Must normalize before {}", what)))
        }
    }

    fn apply(mut self, step: &PipelineStep) -> Result<Self> {
        match step {
            PipelineStep::Normalize => {
                if self.is_normalized() {
                    return Err(H2Error::Pipeline("Table is already normalized".to_string()));
                }
                let (table, summary) = normalize_with_summary(&self.table)?;
                self.table = table;
                self.normalization = Some(summary);
            }

            PipelineStep::ProfileQuality => {
                self.quality = Some(profile_quality(&self.table));
            }

            PipelineStep::AnalyzePedigree => {
                self.require_normalized("pedigree analysis")?;
                self.structure = Some(analyze_pedigree(&self.table));
            }

            PipelineStep::EstimateHeritability { traits, config } => {
                self.require_normalized("heritability estimation")?;
                config.validate()?;
                let traits = match traits {
                    Some(t) => t.clone(),
                    None => identify_traits(&self.table)?.traits,
                };
                self.estimates = Some(estimate_all(&self.table, &traits, config));
            }

            PipelineStep::RecommendMatings { traits, config } => {
                self.require_normalized("mating recommendations")?;
                let traits = match (traits, &self.estimates) {
                    (Some(t), _) => t.clone(),
                    (None, Some(estimates)) => estimates
                        .successful()
                        .iter()
                        .map(|r| r.trait_name.clone())
                        .collect(),
                    (None, None) => identify_traits(&self.table)?.traits,
                };
                self.recommendations =
                    Some(recommend_matings_with_config(&self.table, &traits, config));
            }
        }
        Ok(self)
    }
}

/// Builder for constructing and running analysis pipelines.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
    name: String,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            name: "unnamed".to_string(),
        }
    }

    /// Create from a config.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            steps: config.steps.clone(),
            name: config.name.clone(),
        }
    }

    /// Set the pipeline name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Add schema normalization.
    pub fn normalize(mut self) -> Self {
        self.steps.push(PipelineStep::Normalize);
        self
    }

    /// Add a data quality profile.
    pub fn profile_quality(mut self) -> Self {
        self.steps.push(PipelineStep::ProfileQuality);
        self
    }

    /// Add pedigree analysis.
    pub fn analyze_pedigree(mut self) -> Self {
        self.steps.push(PipelineStep::AnalyzePedigree);
        self
    }

    /// Estimate heritability for every trait with data, with default settings.
    pub fn estimate_heritability(mut self) -> Self {
        self.steps.push(PipelineStep::EstimateHeritability {
            traits: None,
            config: LmmConfig::default(),
        });
        self
    }

    /// Estimate heritability for the given traits.
    pub fn estimate_traits(mut self, traits: &[&str], config: LmmConfig) -> Self {
        self.steps.push(PipelineStep::EstimateHeritability {
            traits: Some(traits.iter().map(|t| t.to_string()).collect()),
            config,
        });
        self
    }

    /// Recommend matings for the estimated traits.
    pub fn recommend_matings(mut self, top_males: usize, top_females: usize) -> Self {
        self.steps.push(PipelineStep::RecommendMatings {
            traits: None,
            config: MatingConfig {
                top_males,
                top_females,
                ..Default::default()
            },
        });
        self
    }

    /// Recommend matings for the given traits.
    pub fn recommend_traits(mut self, traits: &[&str], config: MatingConfig) -> Self {
        self.steps.push(PipelineStep::RecommendMatings {
            traits: Some(traits.iter().map(|t| t.to_string()).collect()),
            config,
        });
        self
    }

    /// Get the steps.
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Convert to config for serialization.
    pub fn to_config(&self, description: Option<&str>) -> PipelineConfig {
        PipelineConfig {
            name: self.name.clone(),
            description: description.map(String::from),
            steps: self.steps.clone(),
        }
    }

    /// Run the pipeline on a table.
    pub fn run(&self, table: &RecordTable) -> Result<AnalysisContext> {
        if self.steps.is_empty() {
            return Err(H2Error::Pipeline("Pipeline has no steps".to_string()));
        }

        let mut context = AnalysisContext::new(&self.name, table.clone());
        for (i, step) in self.steps.iter().enumerate() {
            info!("[{}] step {}: {}", self.name, i + 1, step.label());
            context = context.apply(step).map_err(|e| match e {
                // Fatal for the whole run, callers match on it directly.
                e @ H2Error::DataQuality(_) => e,
                e => H2Error::Step {
                    step: i + 1,
                    label: step.label(),
                    source: Box::new(e),
                },
            })?;
        }
        Ok(context)
    }
}

/// Convenience function running the full herd analysis.
pub fn run_herd_analysis(
    table: &RecordTable,
    top_males: usize,
    top_females: usize,
) -> Result<AnalysisContext> {
    Pipeline::new()
        .name("herd-analysis")
        .normalize()
        .profile_quality()
        .analyze_pedigree()
        .estimate_heritability()
        .recommend_matings(top_males, top_females)
        .run(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{TraitOutcome, Value};

    fn text(values: &[&str]) -> Vec<Value> {
        values.iter().map(|s| Value::from_raw(s)).collect()
    }

    fn herd() -> RecordTable {
        let ids = ["c1", "c1", "c2", "c2", "c3", "c3", "c4", "c4", "b1", "b2"];
        let sex = ["F", "F", "F", "F", "F", "F", "F", "F", "M", "M"];
        let sire = ["b1", "b1", "b2", "b2", "b1", "b1", "b2", "b2", "", ""];
        let milk = [
            6100.0, 6150.0, 7020.0, 6980.0, 5550.0, 5600.0, 6500.0, 6480.0, 6900.0, 7300.0,
        ];
        let lactation = [1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 1.0];
        RecordTable::from_columns(vec![
            ("N° SNIT".to_string(), text(&ids)),
            ("Sexe".to_string(), text(&sex)),
            ("Père".to_string(), text(&sire)),
            ("Mère".to_string(), vec![Value::Missing; 10]),
            ("Lactation".to_string(), lactation.iter().map(|&v| Value::Number(v)).collect()),
            ("Kg Lait".to_string(), milk.iter().map(|&v| Value::Number(v)).collect()),
        ])
        .unwrap()
    }

    #[test]
    fn test_pipeline_builder() {
        let pipeline = Pipeline::new()
            .name("test")
            .normalize()
            .analyze_pedigree()
            .estimate_heritability()
            .recommend_matings(2, 3);

        let config = pipeline.to_config(Some("Test pipeline"));
        assert_eq!(config.steps.len(), 4);
        assert_eq!(config.name, "test");
        assert_eq!(pipeline.steps()[0].label(), "normalize");
    }

    #[test]
    fn test_pipeline_run() {
        let context = run_herd_analysis(&herd(), 2, 3).unwrap();
        assert!(context.is_normalized());
        assert!(context.table.has_column("milk_yield"));
        assert_eq!(context.quality.as_ref().unwrap().n_rows, 10);

        let structure = context.structure.as_ref().unwrap();
        assert_eq!(structure.parent_stats.total(), 10);

        let estimates = context.estimates.as_ref().unwrap();
        assert_eq!(estimates.len(), 1);
        match &estimates.estimates[0].outcome {
            TraitOutcome::Estimated(r) => {
                let h2 = r.h2.unwrap();
                assert!((0.0..=1.0).contains(&h2));
            }
            TraitOutcome::Failed { reason } => panic!("unexpected failure: {}", reason),
        }

        let recs = context.recommendations.as_ref().unwrap();
        assert!(!recs.is_empty());
        assert!(recs.iter().all(|r| r.sire_id != r.dam_id));
        assert!(recs.iter().all(|r| r.trait_focus == "milk_yield"));
    }

    #[test]
    fn test_pipeline_config_yaml() {
        let pipeline = Pipeline::new()
            .name("example")
            .normalize()
            .profile_quality()
            .estimate_traits(&["milk_yield"], LmmConfig::default())
            .recommend_matings(5, 10);

        let config = pipeline.to_config(Some("Example herd pipeline"));
        let yaml = config.to_yaml().unwrap();

        let parsed = PipelineConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.name, "example");
        assert_eq!(parsed.description.as_deref(), Some("Example herd pipeline"));
        assert_eq!(parsed.steps.len(), 4);
    }

    #[test]
    fn test_yaml_defaults() {
        let yaml = "\
name: minimal
description: null
steps:
  - Normalize
  - EstimateHeritability: {}
  - RecommendMatings:
      config:
        top_males: 1
        top_females: 2
";
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.steps.len(), 3);
        match &config.steps[2] {
            PipelineStep::RecommendMatings { traits, config } => {
                assert!(traits.is_none());
                assert_eq!(config.top_females, 2);
            }
            other => panic!("unexpected step {:?}", other),
        }

        let context = Pipeline::from_config(&config).run(&herd()).unwrap();
        let recs = context.recommendations.unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].sire_id, "b2");
    }

    #[test]
    fn test_pipeline_error_handling() {
        // Modeling before normalization
        let result = Pipeline::new().estimate_heritability().run(&herd());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Must normalize before"));
        assert!(matches!(
            err,
            H2Error::Step { step: 1, label: "estimate_heritability", .. }
        ));
        assert!(matches!(err.root(), H2Error::Pipeline(_)));

        assert!(Pipeline::new().run(&herd()).is_err());
        assert!(Pipeline::new().normalize().normalize().run(&herd()).is_err());
    }

    #[test]
    fn test_data_quality_error_passes_through() {
        let empty = RecordTable::from_columns(vec![("ID".to_string(), vec![])]).unwrap();
        let result = Pipeline::new().normalize().estimate_heritability().run(&empty);
        assert!(matches!(result, Err(H2Error::DataQuality(_))));
    }

    #[test]
    fn test_failed_trait_is_recorded() {
        let context = Pipeline::new()
            .normalize()
            .estimate_traits(&["milk_yield", "fat_pct"], LmmConfig::default())
            .run(&herd())
            .unwrap();
        let estimates = context.estimates.unwrap();
        assert_eq!(estimates.successful().len(), 1);
        assert_eq!(estimates.failed().len(), 1);
        assert_eq!(estimates.failed()[0].0, "fat_pct");
    }
}
