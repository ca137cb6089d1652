//! Random-intercept grouping for mixed models.
//!
//! Records sharing an identifier form one group and receive a common random
//! offset: `y = Xβ + Zu + ε`, `u ~ N(0, τ²I)`, `ε ~ N(0, σ²I)`. Because each
//! record belongs to exactly one group, `Z` is never materialized by the
//! solver; the group membership vector is enough.

use crate::error::{H2Error, Result};
use nalgebra::DMatrix;
use std::collections::HashMap;

/// Group membership for a single random intercept.
#[derive(Debug, Clone)]
pub struct RandomIntercept {
    /// Grouping variable name (e.g., "id").
    pub grouping: String,
    /// Distinct group labels, in order of first appearance.
    pub group_ids: Vec<String>,
    /// Group index of each record.
    pub membership: Vec<usize>,
}

impl RandomIntercept {
    /// Build from one label per record. Empty labels are rejected.
    pub fn from_labels(grouping: &str, labels: &[String]) -> Result<Self> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut group_ids = Vec::new();
        let mut membership = Vec::with_capacity(labels.len());

        for (row, label) in labels.iter().enumerate() {
            if label.is_empty() {
                return Err(H2Error::InvalidParameter(format!(
                    "Empty group label for '{}' at record {}",
                    grouping, row
                )));
            }
            let next = group_ids.len();
            let g = *index.entry(label.as_str()).or_insert(next);
            if g == next {
                group_ids.push(label.clone());
            }
            membership.push(g);
        }

        Ok(Self {
            grouping: grouping.to_string(),
            group_ids,
            membership,
        })
    }

    /// Number of groups.
    pub fn n_groups(&self) -> usize {
        self.group_ids.len()
    }

    /// Number of records.
    pub fn n_records(&self) -> usize {
        self.membership.len()
    }

    /// Records per group.
    pub fn group_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.n_groups()];
        for &g in &self.membership {
            sizes[g] += 1;
        }
        sizes
    }

    /// Dense indicator matrix `Z` (records × groups).
    pub fn indicator_matrix(&self) -> DMatrix<f64> {
        let mut z = DMatrix::zeros(self.n_records(), self.n_groups());
        for (i, &g) in self.membership.iter().enumerate() {
            z[(i, g)] = 1.0;
        }
        z
    }
}

impl std::fmt::Display for RandomIntercept {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(1 | {})", self.grouping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_labels() {
        let re = RandomIntercept::from_labels("id", &labels(&["B", "A", "B", "C", "A"])).unwrap();
        assert_eq!(re.n_groups(), 3);
        assert_eq!(re.group_ids, vec!["B", "A", "C"]);
        assert_eq!(re.membership, vec![0, 1, 0, 2, 1]);
        assert_eq!(re.group_sizes(), vec![2, 2, 1]);
        assert_eq!(re.to_string(), "(1 | id)");
    }

    #[test]
    fn test_indicator_matrix() {
        let re = RandomIntercept::from_labels("id", &labels(&["x", "y", "x"])).unwrap();
        let z = re.indicator_matrix();
        assert_eq!(z.shape(), (3, 2));
        assert_eq!(z[(2, 0)], 1.0);
        assert_eq!(z[(2, 1)], 0.0);
    }

    #[test]
    fn test_empty_label_rejected() {
        assert!(RandomIntercept::from_labels("id", &labels(&["a", ""])).is_err());
    }
}
