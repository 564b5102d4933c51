//! Trained-model artifacts
//!
//! **Core** (`core_meta.json`): one ensemble file per target, referenced by path.
//!
//! ```json
//! {
//!   "feature_order": ["supplier", "country", "..."],
//!   "predictables": ["end_temp_f", "agtron", "..."],
//!   "models": {"end_temp_f": "end_temp_f.json"},
//!   "metrics": {"end_temp_f": 2.0},
//!   "fallbacks": {"agtron": 55.0}
//! }
//! ```
//!
//! **Scout** (`scout_model.json`): a single file with the one-hot column list and every
//! target's model embedded.
//!
//! ```json
//! {
//!   "feature_columns": ["room_temp_f", "proc_washed", "proc_nan", "..."],
//!   "models": {
//!     "end_temp_f": {"kind": "trained", "model": {"feature_names": ["..."], "trees": []}},
//!     "stage_9_burner_pct": {"kind": "fallback", "value": 40.0}
//!   }
//! }
//! ```
//!
//! A missing artifact loads as `None`; anything unreadable or malformed is an error.

use super::{ModelError, ModelHandle, TargetModel, TreeEnsemble};
use roastlog_common::schema::CORE_CATEGORICAL;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct CoreMetaFile {
    feature_order: Vec<String>,
    predictables: Vec<String>,
    #[serde(default)]
    categorical: Option<Vec<String>>,
    #[serde(default)]
    models: BTreeMap<String, PathBuf>,
    #[serde(default)]
    metrics: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    fallbacks: BTreeMap<String, f64>,
}

/// Loaded Core metadata
#[derive(Debug, Clone)]
pub struct CoreArtifacts {
    pub meta_path: PathBuf,
    /// Column order used at training time
    pub feature_order: Vec<String>,
    pub predictables: Vec<String>,
    pub categorical: Vec<String>,
    /// Per-target models; predictables without an entry have nothing to predict with
    pub targets: BTreeMap<String, TargetModel>,
}

impl CoreArtifacts {
    /// Load `core_meta.json`; `Ok(None)` when it does not exist
    ///
    /// Model files are only resolved here, not read.
    pub fn load(meta_path: &Path) -> Result<Option<Self>, ModelError> {
        let Some(meta) = read_json::<CoreMetaFile>(meta_path)? else {
            info!(path = %meta_path.display(), "No Core metadata found");
            return Ok(None);
        };

        check_unique("feature_order", &meta.feature_order)?;

        let base_dir = meta_path.parent().unwrap_or_else(|| Path::new("."));
        let mut targets = BTreeMap::new();

        for target in &meta.predictables {
            if let Some(file) = meta.models.get(target) {
                let path = if file.is_absolute() {
                    file.clone()
                } else {
                    base_dir.join(file)
                };
                let validation_error = meta.metrics.get(target).copied().flatten();
                targets.insert(
                    target.clone(),
                    TargetModel::Trained {
                        handle: ModelHandle::File(path),
                        validation_error,
                    },
                );
            } else if let Some(value) = meta.fallbacks.get(target) {
                targets.insert(target.clone(), TargetModel::Fallback { value: *value });
            }
        }

        debug!(
            features = meta.feature_order.len(),
            predictables = meta.predictables.len(),
            models = targets.len(),
            "Loaded Core metadata"
        );

        Ok(Some(Self {
            meta_path: meta_path.to_path_buf(),
            feature_order: meta.feature_order,
            predictables: meta.predictables,
            categorical: meta
                .categorical
                .unwrap_or_else(|| CORE_CATEGORICAL.iter().map(|s| s.to_string()).collect()),
            targets,
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ScoutEntry {
    Trained {
        model: TreeEnsemble,
        #[serde(default)]
        validation_error: Option<f64>,
    },
    Fallback {
        value: f64,
    },
}

#[derive(Debug, Deserialize)]
struct ScoutModelFile {
    feature_columns: Vec<String>,
    #[serde(default)]
    models: BTreeMap<String, ScoutEntry>,
}

/// Loaded Scout model file
#[derive(Debug, Clone)]
pub struct ScoutArtifact {
    pub path: PathBuf,
    /// Column order after one-hot encoding
    pub feature_columns: Vec<String>,
    pub targets: BTreeMap<String, TargetModel>,
}

impl ScoutArtifact {
    /// Load `scout_model.json`; `Ok(None)` when it does not exist
    pub fn load(path: &Path) -> Result<Option<Self>, ModelError> {
        let Some(file) = read_json::<ScoutModelFile>(path)? else {
            info!(path = %path.display(), "No Scout model found");
            return Ok(None);
        };

        check_unique("feature_columns", &file.feature_columns)?;

        let mut targets = BTreeMap::new();
        for (target, entry) in file.models {
            let model = match entry {
                ScoutEntry::Trained {
                    model,
                    validation_error,
                } => {
                    model
                        .validate()
                        .map_err(|e| ModelError::Invalid(format!("{}: {}", target, e)))?;
                    TargetModel::Trained {
                        handle: ModelHandle::Loaded(Arc::new(model)),
                        validation_error,
                    }
                }
                ScoutEntry::Fallback { value } => TargetModel::Fallback { value },
            };
            targets.insert(target, model);
        }

        debug!(
            features = file.feature_columns.len(),
            models = targets.len(),
            "Loaded Scout model"
        );

        Ok(Some(Self {
            path: path.to_path_buf(),
            feature_columns: file.feature_columns,
            targets,
        }))
    }
}

/// Parse a JSON file; `Ok(None)` when it does not exist
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ModelError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ModelError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn check_unique(list: &str, columns: &[String]) -> Result<(), ModelError> {
    let mut seen = HashSet::new();
    for column in columns {
        if !seen.insert(column.as_str()) {
            return Err(ModelError::Invalid(format!(
                "{} lists column '{}' more than once",
                list, column
            )));
        }
    }
    Ok(())
}
