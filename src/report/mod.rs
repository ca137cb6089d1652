//! Analysis report aggregating every stage of a herd analysis.
//!
//! The report is a plain data model. It serializes to YAML or JSON and
//! renders as markdown; page layout is left to external renderers.

use crate::data::{
    GeneticStructureSummary, HeritabilityClass, MatingRecommendation, TraitEstimates, TraitOutcome,
};
use crate::error::Result;
use crate::pipeline::AnalysisContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Generation metadata.
    pub meta: ReportMeta,
    /// Plain-text data quality profile, if one was computed.
    pub quality: Option<String>,
    pub structure: Option<GeneticStructureSummary>,
    pub heritability: TraitEstimates,
    /// Externally supplied feature importances, keyed by feature name.
    pub feature_importance: BTreeMap<String, f64>,
    pub recommendations: Vec<MatingRecommendation>,
    /// Automatic summary of the results.
    pub interpretation: Interpretation,
}

/// Report generation metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Generation timestamp (RFC 3339).
    pub generated: String,
    /// Tool version.
    pub version: String,
    /// Tool name.
    pub tool: String,
    /// User or run label.
    pub label: String,
}

/// Overall strength of genetic influence across traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneticInfluence {
    Weak,
    Moderate,
    Strong,
}

impl GeneticInfluence {
    /// Classify a mean heritability.
    pub fn from_mean_h2(mean_h2: f64) -> Self {
        match HeritabilityClass::from_h2(mean_h2) {
            HeritabilityClass::High => Self::Strong,
            HeritabilityClass::Moderate => Self::Moderate,
            HeritabilityClass::Low => Self::Weak,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
        }
    }
}

/// Automatic interpretation of the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    /// Mean h² over traits where it was estimated.
    pub mean_h2: Option<f64>,
    pub influence: Option<GeneticInfluence>,
    /// Up to three most important features.
    pub top_features: Vec<String>,
    pub summary: String,
}

impl Interpretation {
    fn build(
        structure: Option<&GeneticStructureSummary>,
        heritability: &TraitEstimates,
        feature_importance: &BTreeMap<String, f64>,
    ) -> Self {
        let mean_h2 = heritability.mean_h2();
        let influence = mean_h2.map(GeneticInfluence::from_mean_h2);

        let mut ranked: Vec<(&String, &f64)> = feature_importance.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(a.1));
        let top_features: Vec<String> = ranked.into_iter().take(3).map(|(k, _)| k.clone()).collect();

        let mut parts = Vec::new();
        if let Some(s) = structure {
            parts.push(format!(
                "The pedigree spans {} generation(s) of depth.",
                s.pedigree_depth
            ));
        }
        match (mean_h2, influence) {
            (Some(h2), Some(level)) => parts.push(format!(
                "Mean heritability of the studied traits is {:.3}, indicating a {} genetic influence.",
                h2,
                level.as_str()
            )),
            _ => parts.push("No heritability could be estimated.".to_string()),
        }
        if !top_features.is_empty() {
            parts.push(format!(
                "Most important features: {}.",
                top_features.join(", ")
            ));
        }

        Self {
            mean_h2,
            influence,
            top_features,
            summary: parts.join(" "),
        }
    }
}

impl AnalysisReport {
    /// Assemble a report from individual results.
    pub fn new(
        label: &str,
        quality: Option<String>,
        structure: Option<GeneticStructureSummary>,
        heritability: TraitEstimates,
        feature_importance: BTreeMap<String, f64>,
        recommendations: Vec<MatingRecommendation>,
    ) -> Self {
        let interpretation =
            Interpretation::build(structure.as_ref(), &heritability, &feature_importance);
        Self {
            meta: ReportMeta {
                generated: chrono::Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                tool: "composable-h2".to_string(),
                label: label.to_string(),
            },
            quality,
            structure,
            heritability,
            feature_importance,
            recommendations,
            interpretation,
        }
    }

    /// Assemble a report from a pipeline run.
    pub fn from_context(context: &AnalysisContext, label: &str) -> Self {
        Self::new(
            label,
            context.quality.as_ref().map(|q| q.to_string()),
            context.structure.clone(),
            context.estimates.clone().unwrap_or_default(),
            BTreeMap::new(),
            context.recommendations.clone().unwrap_or_default(),
        )
    }

    /// Attach feature importances and refresh the interpretation.
    pub fn with_feature_importance(mut self, importance: BTreeMap<String, f64>) -> Self {
        self.feature_importance = importance;
        self.interpretation = Interpretation::build(
            self.structure.as_ref(),
            &self.heritability,
            &self.feature_importance,
        );
        self
    }

    /// Render as YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Render as pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Herd Analysis Report\n\n");
        md.push_str(&format!("- **Date**: {}\n", self.meta.generated));
        md.push_str(&format!("- **User**: {}\n\n", self.meta.label));

        md.push_str("## 1. Genetic Structure\n\n");
        match &self.structure {
            Some(s) => {
                md.push_str(&format!(
                    "- **Pedigree depth**: {} generation(s)\n",
                    s.pedigree_depth
                ));
                md.push_str(&format!(
                    "- **Both parents known**: {}\n",
                    s.parent_stats.both_known
                ));
                md.push_str(&format!("- **One parent known**: {}\n", s.parent_stats.one_known));
                md.push_str(&format!("- **No parent known**: {}\n", s.parent_stats.none_known));
                if let Some(c) = &s.clusters {
                    let explained: Vec<String> = c
                        .explained_variance
                        .iter()
                        .map(|v| format!("{:.2}%", v * 100.0))
                        .collect();
                    md.push_str(&format!(
                        "- **Phenotype clusters**: {} on {} ({} records), explained variance {}\n",
                        c.n_clusters(),
                        c.variables.join(", "),
                        c.rows.len(),
                        explained.join(", ")
                    ));
                }
            }
            None => md.push_str("Not analyzed.\n"),
        }
        md.push('\n');

        md.push_str("## 2. Heritability (h²)\n\n");
        if self.heritability.is_empty() {
            md.push_str("No traits analyzed.\n");
        }
        let fmt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |x| format!("{:.3}", x));
        for e in &self.heritability.estimates {
            match &e.outcome {
                TraitOutcome::Estimated(r) => {
                    md.push_str(&format!("### {}\n\n", e.trait_name));
                    md.push_str(&format!(
                        "- **h²**: {} ± {}\n",
                        fmt(r.h2),
                        fmt(r.standard_error)
                    ));
                    md.push_str(&format!(
                        "- **95% CI**: [{}, {}]\n",
                        fmt(r.ci_lower),
                        fmt(r.ci_upper)
                    ));
                    md.push_str(&format!(
                        "- **Genetic variance**: {}\n",
                        fmt(r.genetic_variance)
                    ));
                    md.push_str(&format!(
                        "- **Residual variance**: {}\n",
                        fmt(r.residual_variance)
                    ));
                    md.push_str(&format!(
                        "- **Records / animals**: {} / {}\n\n",
                        r.n_records, r.n_groups
                    ));
                }
                TraitOutcome::Failed { reason } => {
                    md.push_str(&format!("- h²({}): {}\n\n", e.trait_name, reason));
                }
            }
        }

        md.push_str("## 3. Feature Importance\n\n");
        if self.feature_importance.is_empty() {
            md.push_str("Not provided.\n");
        }
        for (feature, importance) in &self.feature_importance {
            md.push_str(&format!("- {}: {:.4}\n", feature, importance));
        }
        md.push('\n');

        md.push_str("## 4. Mating Recommendations\n\n");
        if self.recommendations.is_empty() {
            md.push_str("No mating recommendations generated.\n");
        } else {
            md.push_str("| Sire | Dam | Trait | Sire value | Dam value |\n");
            md.push_str("|---|---|---|---|---|\n");
            for r in &self.recommendations {
                md.push_str(&format!(
                    "| {} | {} | {} | {:.2} | {:.2} |\n",
                    r.sire_id, r.dam_id, r.trait_focus, r.sire_value, r.dam_value
                ));
            }
        }
        md.push('\n');

        md.push_str("## 5. Summary\n\n");
        md.push_str(&self.interpretation.summary);
        md.push('\n');
        if let Some(q) = &self.quality {
            md.push_str("\n```text\n");
            md.push_str(q);
            md.push_str("```\n");
        }

        md
    }
}

impl std::fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_markdown())
    }
}
