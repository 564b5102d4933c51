//! JSON gradient-boosted tree ensembles
//!
//! File layout:
//!
//! ```json
//! {
//!   "feature_names": ["supplier", "end_temp_f"],
//!   "base_score": 430.0,
//!   "trees": [
//!     {"nodes": [
//!       {"type": "numeric", "feature": 1, "threshold": 440.0, "missing_left": true, "left": 1, "right": 2},
//!       {"type": "leaf", "value": -4.5},
//!       {"type": "leaf", "value": 6.0}
//!     ]}
//!   ]
//! }
//! ```
//!
//! Prediction is `base_score` plus the leaf value reached in every tree. Node 0 is the
//! root; child indices always point forward, so traversal terminates.

use super::{ModelError, Regressor};
use crate::features::{Cell, FeatureRow};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Leaf {
        value: f64,
    },
    /// `value < threshold` goes left; missing goes left when `missing_left`
    Numeric {
        feature: usize,
        threshold: f64,
        #[serde(default)]
        missing_left: bool,
        left: usize,
        right: usize,
    },
    /// Category in `categories` goes left, anything else right
    Categorical {
        feature: usize,
        categories: Vec<String>,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn leaf_value(&self, cells: &[Cell]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Numeric {
                    feature,
                    threshold,
                    missing_left,
                    left,
                    right,
                } => {
                    index = match cells[*feature].as_f64() {
                        Some(v) if v < *threshold => *left,
                        Some(_) => *right,
                        None if *missing_left => *left,
                        None => *right,
                    };
                }
                Node::Categorical {
                    feature,
                    categories,
                    left,
                    right,
                } => {
                    let in_set = cells[*feature]
                        .as_category()
                        .map_or(false, |c| categories.iter().any(|k| k == c));
                    index = if in_set { *left } else { *right };
                }
            }
        }
    }
}

/// Additive tree ensemble regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    /// Read and validate an ensemble file
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ModelError::NotFound(path.to_path_buf())
            } else {
                ModelError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let ensemble: TreeEnsemble =
            serde_json::from_str(&content).map_err(|source| ModelError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        ensemble.validate()?;

        debug!(path = %path.display(), trees = ensemble.trees.len(), "Loaded tree ensemble");
        Ok(ensemble)
    }

    /// Check structure so that prediction cannot index out of bounds or loop
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.base_score.is_finite() {
            return Err(ModelError::Invalid("base_score is not finite".to_string()));
        }

        let width = self.feature_names.len();
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ModelError::Invalid(format!("tree {} has no nodes", t)));
            }
            let count = tree.nodes.len();
            for (i, node) in tree.nodes.iter().enumerate() {
                let (feature, left, right) = match node {
                    Node::Leaf { value } => {
                        if !value.is_finite() {
                            return Err(ModelError::Invalid(format!(
                                "tree {} node {}: leaf value is not finite",
                                t, i
                            )));
                        }
                        continue;
                    }
                    Node::Numeric {
                        feature, left, right, ..
                    } => (*feature, *left, *right),
                    Node::Categorical {
                        feature, left, right, ..
                    } => (*feature, *left, *right),
                };

                if feature >= width {
                    return Err(ModelError::Invalid(format!(
                        "tree {} node {}: feature {} out of range ({} features)",
                        t, i, feature, width
                    )));
                }
                for child in [left, right] {
                    if child <= i || child >= count {
                        return Err(ModelError::Invalid(format!(
                            "tree {} node {}: child {} must point forward within {} nodes",
                            t, i, child, count
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Regressor for TreeEnsemble {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, row: &FeatureRow) -> Result<f64, ModelError> {
        if row.columns() != self.feature_names.as_slice() {
            return Err(ModelError::FeatureMismatch {
                expected: self.feature_names.clone(),
                found: row.columns().to_vec(),
            });
        }

        let cells = row.cells();
        Ok(self
            .trees
            .iter()
            .fold(self.base_score, |sum, tree| sum + tree.leaf_value(cells)))
    }
}
