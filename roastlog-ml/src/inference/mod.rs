//! Inference engines
//!
//! An engine takes a [`ModelSession`] and, for every predictable target the caller left
//! blank, asks that target's model for a value. Supplied values are never sent to a
//! model and never overridden.
//!
//! Confidence:
//! - trained model: `clamp(1 / (1 + validation_error), 0.1, 1.0)`, 0.5 when no error was
//!   recorded
//! - fallback constant: 0.2
//! - Core reports confidence per field, Scout an aggregate band by number of fields filled
//!
//! A missing artifact is not an error: nothing is predicted and every target is listed as
//! skipped. An unreadable or malformed artifact is [`InferenceError::CorruptArtifact`].

pub mod core_engine;
pub mod scout_engine;

pub use core_engine::CoreEngine;
pub use scout_engine::ScoutEngine;

use crate::features::{FeatureRow, ModelSession};
use crate::flatten::FlattenError;
use crate::model::{ModelError, TargetModel};
use roastlog_common::schema::{ModelKind, Schema};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lowest confidence assigned to a trained model
pub const MIN_CONFIDENCE: f64 = 0.1;
/// Highest confidence assigned to a trained model
pub const MAX_CONFIDENCE: f64 = 1.0;
/// Trained model without a recorded validation error
pub const UNKNOWN_ERROR_CONFIDENCE: f64 = 0.5;
/// Fallback constant
pub const FALLBACK_CONFIDENCE: f64 = 0.2;

/// Aggregate band thresholds (fields filled)
const HIGH_BAND_MIN: usize = 10;
const MEDIUM_BAND_MIN: usize = 5;

/// Inference failures
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("corrupt model artifact {path}: {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error(transparent)]
    Flatten(#[from] FlattenError),
}

impl InferenceError {
    pub(crate) fn corrupt(path: &Path, error: impl std::fmt::Display) -> Self {
        InferenceError::CorruptArtifact {
            path: path.to_path_buf(),
            reason: error.to_string(),
        }
    }
}

/// Confidence of a trained model from its validation error
///
/// Monotonically non-increasing in `error`. A non-finite or negative error gets the
/// floor; no recorded error gets [`UNKNOWN_ERROR_CONFIDENCE`].
pub fn confidence_from_error(error: Option<f64>) -> f64 {
    match error {
        None => UNKNOWN_ERROR_CONFIDENCE,
        Some(e) if !e.is_finite() || e < 0.0 => MIN_CONFIDENCE,
        Some(e) => (1.0 / (1.0 + e)).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE),
    }
}

/// Coarse confidence label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl ConfidenceBand {
    /// ≥10 filled High, 5–9 Medium, otherwise Low
    pub fn from_filled(filled: usize) -> Self {
        if filled >= HIGH_BAND_MIN {
            ConfidenceBand::High
        } else if filled >= MEDIUM_BAND_MIN {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceBand::Low => "Low",
            ConfidenceBand::Medium => "Medium",
            ConfidenceBand::High => "High",
        }
    }
}

/// Confidence attached to an inference outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Confidence {
    /// No artifact was available
    NoModel,
    /// Core: score per predicted field
    PerField { scores: BTreeMap<String, f64> },
    /// Scout: band by number of fields filled
    Aggregate { band: ConfidenceBand, filled: usize },
}

impl Confidence {
    /// Band for display; [`Confidence::NoModel`] is the lowest band
    pub fn band(&self) -> ConfidenceBand {
        match self {
            Confidence::NoModel => ConfidenceBand::Low,
            Confidence::PerField { scores } => ConfidenceBand::from_filled(scores.len()),
            Confidence::Aggregate { band, .. } => *band,
        }
    }

    pub fn field(&self, field: &str) -> Option<f64> {
        match self {
            Confidence::PerField { scores } => scores.get(field).copied(),
            _ => None,
        }
    }
}

/// Why a target was not predicted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The model artifact does not exist
    NoArtifact,
    /// The artifact names a model file that does not exist
    ModelFileMissing,
    /// The artifact has neither a model nor a fallback for this target
    NotTrained,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoArtifact => "no model artifact",
            SkipReason::ModelFileMissing => "model file missing",
            SkipReason::NotTrained => "no trained model or fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTarget {
    pub target: String,
    pub reason: SkipReason,
}

/// Result of one inference call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceOutcome {
    pub kind: ModelKind,
    /// Predictable targets considered, in artifact order
    pub targets: Vec<String>,
    /// Only fields actually filled
    pub predicted: BTreeMap<String, f64>,
    pub confidence: Confidence,
    /// Blank targets that could not be predicted
    pub skipped: Vec<SkippedTarget>,
    /// Scout: a process method with no indicator column
    pub unseen_category: Option<String>,
}

impl InferenceOutcome {
    /// Outcome when no artifact exists: every blank target skipped, nothing predicted
    pub(crate) fn without_model(session: &ModelSession, schema: &Schema) -> Self {
        let skipped: Vec<SkippedTarget> = schema
            .predictables
            .iter()
            .filter(|t| !session.is_observed(t))
            .map(|t| SkippedTarget {
                target: t.clone(),
                reason: SkipReason::NoArtifact,
            })
            .collect();

        warn!(
            model = %schema.kind,
            skipped = skipped.len(),
            "No model artifact; nothing predicted"
        );

        Self {
            kind: schema.kind,
            targets: schema.predictables.clone(),
            predicted: BTreeMap::new(),
            confidence: Confidence::NoModel,
            skipped,
            unseen_category: None,
        }
    }

    pub fn inferred_fields(&self) -> BTreeSet<String> {
        self.predicted.keys().cloned().collect()
    }

    pub fn filled_count(&self) -> usize {
        self.predicted.len()
    }
}

/// A Core or Scout completion engine
pub trait CompletionEngine {
    fn kind(&self) -> ModelKind;

    /// Compiled-in schema used to declare session fields
    fn schema(&self) -> &Schema;

    fn infer(&self, session: &ModelSession) -> Result<InferenceOutcome, InferenceError>;
}

/// Per-target predictions shared by both engines
#[derive(Debug, Default)]
pub(crate) struct TargetPredictions {
    pub predicted: BTreeMap<String, f64>,
    pub scores: BTreeMap<String, f64>,
    pub skipped: Vec<SkippedTarget>,
}

/// Run each blank target's model on `row`
///
/// `artifact_path` is reported for models embedded in the artifact itself.
pub(crate) fn predict_targets<'a>(
    targets: impl IntoIterator<Item = &'a String>,
    models: &BTreeMap<String, TargetModel>,
    session: &ModelSession,
    row: &FeatureRow,
    artifact_path: &Path,
) -> Result<TargetPredictions, InferenceError> {
    let mut out = TargetPredictions::default();

    for target in targets {
        if session.is_observed(target) {
            debug!(target = %target, "Supplied by caller; not predicted");
            continue;
        }

        match models.get(target) {
            None => {
                warn!(target = %target, reason = SkipReason::NotTrained.as_str(), "Target skipped");
                out.skipped.push(SkippedTarget {
                    target: target.clone(),
                    reason: SkipReason::NotTrained,
                });
            }
            Some(TargetModel::Fallback { value }) => {
                out.predicted.insert(target.clone(), *value);
                out.scores.insert(target.clone(), FALLBACK_CONFIDENCE);
            }
            Some(TargetModel::Trained {
                handle,
                validation_error,
            }) => {
                let source = handle.path().unwrap_or(artifact_path);
                let model = match handle.load() {
                    Ok(model) => model,
                    Err(ModelError::NotFound(path)) => {
                        warn!(
                            target = %target,
                            path = %path.display(),
                            reason = SkipReason::ModelFileMissing.as_str(),
                            "Target skipped"
                        );
                        out.skipped.push(SkippedTarget {
                            target: target.clone(),
                            reason: SkipReason::ModelFileMissing,
                        });
                        continue;
                    }
                    Err(e) => return Err(InferenceError::corrupt(source, e)),
                };

                let value = model
                    .predict(row)
                    .map_err(|e| InferenceError::corrupt(source, e))?;
                if !value.is_finite() {
                    return Err(InferenceError::corrupt(
                        source,
                        format!("non-finite prediction for {}", target),
                    ));
                }

                out.predicted.insert(target.clone(), value);
                out.scores
                    .insert(target.clone(), confidence_from_error(*validation_error));
            }
        }
    }

    Ok(out)
}

pub(crate) fn log_summary(outcome: &InferenceOutcome) {
    info!(
        model = %outcome.kind,
        targets = outcome.targets.len(),
        filled = outcome.predicted.len(),
        skipped = outcome.skipped.len(),
        band = outcome.confidence.band().as_str(),
        "Inference complete"
    );
}
