//! Trained per-field regressors
//!
//! Each predictable target has at most one [`TargetModel`]: a trained regressor with its
//! validation error, or a fallback constant. Regressors are read from JSON tree-ensemble
//! files ([`TreeEnsemble`]) referenced by the Core and Scout artifacts
//! ([`artifacts`]).

pub mod artifacts;
pub mod ensemble;

pub use artifacts::{CoreArtifacts, ScoutArtifact};
pub use ensemble::{Node, Tree, TreeEnsemble};

use crate::features::FeatureRow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Model loading and prediction failures
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model: {0}")]
    Invalid(String),

    #[error("feature columns do not match the model: expected {expected:?}, got {found:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// A single-output regressor over one feature row
pub trait Regressor: Send + Sync + fmt::Debug {
    /// Column order the model was trained on
    fn feature_names(&self) -> &[String];

    /// Predict one value; fails if the row's columns differ from [`Self::feature_names`]
    fn predict(&self, row: &FeatureRow) -> Result<f64, ModelError>;
}

/// Where a trained regressor comes from
#[derive(Debug, Clone)]
pub enum ModelHandle {
    /// Ensemble file, read when first needed
    File(PathBuf),
    /// Already in memory (embedded in an artifact)
    Loaded(Arc<dyn Regressor>),
}

impl ModelHandle {
    /// Load (or share) the regressor
    ///
    /// A missing file is [`ModelError::NotFound`]; any other read or parse failure is a
    /// distinct error.
    pub fn load(&self) -> Result<Arc<dyn Regressor>, ModelError> {
        match self {
            ModelHandle::File(path) => Ok(Arc::new(TreeEnsemble::from_file(path)?)),
            ModelHandle::Loaded(model) => Ok(Arc::clone(model)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ModelHandle::File(path) => Some(path),
            ModelHandle::Loaded(_) => None,
        }
    }
}

/// Model entry for one predictable target
#[derive(Debug, Clone)]
pub enum TargetModel {
    Trained {
        handle: ModelHandle,
        /// Validation MAE recorded at training time
        validation_error: Option<f64>,
    },
    Fallback {
        value: f64,
    },
}
