//! Mixed models for variance decomposition.

pub mod heritability;
pub mod lmm;

pub use heritability::{
    estimate_all, estimate_heritability, estimate_heritability_with_config, fit_trait,
    prepare_trait_data, TraitData,
};
pub use lmm::{fit_random_intercept, LmmConfig, RandomInterceptFit};
