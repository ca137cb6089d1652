//! Error types for the composable-h2 library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum H2Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// The cleaned table is unusable (e.g. empty). Fatal for the current run.
    #[error("Data quality error: {0}")]
    DataQuality(String),

    /// A mixed-model fit failed for one trait. Recoverable per trait.
    #[error("Modeling error for trait '{trait_name}': {reason}")]
    Modeling { trait_name: String, reason: String },

    /// Required identification columns are absent.
    #[error("Structural error: {0}")]
    Structural(String),

    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// A pipeline step failed; `source` keeps the step's own error.
    #[error("Step {step} ({label}) failed: {source}")]
    Step {
        step: usize,
        label: &'static str,
        #[source]
        source: Box<H2Error>,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl H2Error {
    /// Build a modeling error for `trait_name`.
    pub fn modeling(trait_name: &str, reason: impl Into<String>) -> Self {
        H2Error::Modeling {
            trait_name: trait_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error only concerns a single trait and the run can go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.root(), H2Error::Modeling { .. })
    }

    /// The underlying error, looking through pipeline step wrappers.
    pub fn root(&self) -> &H2Error {
        match self {
            H2Error::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, H2Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modeling_error_message() {
        let err = H2Error::modeling("milk_yield", "need at least 2 groups");
        let msg = err.to_string();
        assert!(msg.contains("milk_yield"));
        assert!(msg.contains("at least 2"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_data_quality_not_recoverable() {
        let err = H2Error::DataQuality("empty".into());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_step_keeps_source() {
        let err = H2Error::Step {
            step: 4,
            label: "estimate_heritability",
            source: Box::new(H2Error::modeling("milk_yield", "singular")),
        };
        assert!(err.to_string().starts_with("Step 4 (estimate_heritability) failed"));
        assert!(matches!(err.root(), H2Error::Modeling { .. }));
        assert!(err.is_recoverable());
        assert!(std::error::Error::source(&err).is_some());
    }
}
