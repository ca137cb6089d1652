//! Schema normalization for heterogeneous herd records.
//!
//! - **Renaming**: source spellings mapped onto the canonical schema
//! - **Coercion**: identifiers to text, measurements to numbers, free-text ages to months
//! - **Imputation**: column medians for numeric gaps
//! - **Clipping**: production traits clamped to Tukey fences

mod age;
mod clean;
mod outliers;

pub use age::{parse_age, parse_age_value};
pub use clean::{canonical_sex, normalize, normalize_with_summary, NormalizationSummary};
pub use outliers::{clip_outliers, impute_median, median, nearest_rank, quantile, TukeyFences, TUKEY_K};
