//! Mating recommendations from phenotypic rankings.

mod recommend;
mod roles;

pub use recommend::{recommend_matings, recommend_matings_with_config, MatingConfig};
pub use roles::{assign_roles, AmbiguousSexPolicy, RolePools, Sex};
