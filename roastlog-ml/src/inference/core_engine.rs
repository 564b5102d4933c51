//! Core engine: per-field models over the full feature set

use super::{
    log_summary, predict_targets, CompletionEngine, Confidence, InferenceError, InferenceOutcome,
};
use crate::features::{build_core_row, ModelSession};
use crate::model::CoreArtifacts;
use roastlog_common::schema::{ModelKind, Schema};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Core predictor reading `core_meta.json` on every call
#[derive(Debug, Clone)]
pub struct CoreEngine {
    meta_path: PathBuf,
    schema: Schema,
}

impl CoreEngine {
    pub fn new(meta_path: impl Into<PathBuf>) -> Self {
        Self {
            meta_path: meta_path.into(),
            schema: Schema::core(),
        }
    }

    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }
}

impl CompletionEngine for CoreEngine {
    fn kind(&self) -> ModelKind {
        ModelKind::Core
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn infer(&self, session: &ModelSession) -> Result<InferenceOutcome, InferenceError> {
        let artifacts = CoreArtifacts::load(&self.meta_path)
            .map_err(|e| InferenceError::corrupt(&self.meta_path, e))?;
        let Some(artifacts) = artifacts else {
            let outcome = InferenceOutcome::without_model(session, &self.schema);
            log_summary(&outcome);
            return Ok(outcome);
        };

        let (missing, extra) = self.schema.feature_drift(&artifacts.feature_order);
        if !missing.is_empty() || !extra.is_empty() {
            warn!(
                ?missing,
                ?extra,
                "Core artifact feature order differs from compiled schema; using artifact order"
            );
        }

        let row = build_core_row(session.fields(), &artifacts.feature_order, &artifacts.categorical);
        let predictions = predict_targets(
            &artifacts.predictables,
            &artifacts.targets,
            session,
            &row,
            &self.meta_path,
        )?;

        let outcome = InferenceOutcome {
            kind: ModelKind::Core,
            targets: artifacts.predictables,
            predicted: predictions.predicted,
            confidence: Confidence::PerField {
                scores: predictions.scores,
            },
            skipped: predictions.skipped,
            unseen_category: None,
        };
        log_summary(&outcome);
        Ok(outcome)
    }
}
