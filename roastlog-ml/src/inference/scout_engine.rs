//! Scout engine: quick predictions from environment and curve anchors

use super::{
    log_summary, predict_targets, CompletionEngine, Confidence, ConfidenceBand, InferenceError,
    InferenceOutcome,
};
use crate::features::{build_scout_row, ModelSession};
use crate::model::ScoutArtifact;
use roastlog_common::schema::{ModelKind, Schema, PROCESS_INDICATOR_PREFIX, SCOUT_CATEGORICAL};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Scout predictor reading `scout_model.json` on every call
#[derive(Debug, Clone)]
pub struct ScoutEngine {
    model_path: PathBuf,
    schema: Schema,
}

impl ScoutEngine {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            schema: Schema::scout(),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Artifact columns with the one-hot indicators folded back into their source column
    fn base_columns(feature_columns: &[String]) -> Vec<String> {
        let mut base: Vec<String> = feature_columns
            .iter()
            .filter(|c| !c.starts_with(PROCESS_INDICATOR_PREFIX))
            .cloned()
            .collect();
        if feature_columns
            .iter()
            .any(|c| c.starts_with(PROCESS_INDICATOR_PREFIX))
        {
            base.extend(SCOUT_CATEGORICAL.iter().map(|c| c.to_string()));
        }
        base
    }
}

impl CompletionEngine for ScoutEngine {
    fn kind(&self) -> ModelKind {
        ModelKind::Scout
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn infer(&self, session: &ModelSession) -> Result<InferenceOutcome, InferenceError> {
        let artifact = ScoutArtifact::load(&self.model_path)
            .map_err(|e| InferenceError::corrupt(&self.model_path, e))?;
        let Some(artifact) = artifact else {
            let outcome = InferenceOutcome::without_model(session, &self.schema);
            log_summary(&outcome);
            return Ok(outcome);
        };

        let (missing, extra) = self
            .schema
            .feature_drift(&Self::base_columns(&artifact.feature_columns));
        if !missing.is_empty() || !extra.is_empty() {
            warn!(
                ?missing,
                ?extra,
                "Scout artifact columns differ from compiled schema; using artifact order"
            );
        }

        for target in artifact.targets.keys() {
            if !self.schema.is_predictable(target) {
                debug!(target = %target, "Scout model for non-predictable field ignored");
            }
        }

        let scout_row = build_scout_row(session.fields(), &artifact.feature_columns);
        let predictions = predict_targets(
            &self.schema.predictables,
            &artifact.targets,
            session,
            &scout_row.row,
            &self.model_path,
        )?;

        let filled = predictions.predicted.len();
        let outcome = InferenceOutcome {
            kind: ModelKind::Scout,
            targets: self.schema.predictables.clone(),
            predicted: predictions.predicted,
            confidence: Confidence::Aggregate {
                band: ConfidenceBand::from_filled(filled),
                filled,
            },
            skipped: predictions.skipped,
            unseen_category: scout_row.unseen_category,
        };
        log_summary(&outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::SkipReason;
    use roastlog_common::record::FlatRecord;
    use serde_json::json;
    use tempfile::TempDir;

    fn columns() -> Vec<String> {
        ["room_temp_f", "stage_9_temp_f", "proc_natural", "proc_washed", "proc_nan"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Stage 9 burner and end temp trained (end temp splits on washed), 10 burner fallbacks
    fn write_artifact(dir: &Path) -> PathBuf {
        let mut models = serde_json::Map::new();
        models.insert(
            "end_temp_f".to_string(),
            json!({
                "kind": "trained",
                "validation_error": 1.5,
                "model": {
                    "feature_names": columns(),
                    "base_score": 440.0,
                    "trees": [{"nodes": [
                        {"type": "numeric", "feature": 3, "threshold": 0.5, "left": 1, "right": 2},
                        {"type": "leaf", "value": 0.0},
                        {"type": "leaf", "value": 10.0}
                    ]}]
                }
            }),
        );
        for i in 0..9 {
            models.insert(
                format!("stage_{}_burner_pct", i),
                json!({"kind": "fallback", "value": 60.0 - i as f64}),
            );
        }

        let path = dir.join("scout_model.json");
        std::fs::write(
            &path,
            json!({"feature_columns": columns(), "models": models}).to_string(),
        )
        .unwrap();
        path
    }

    fn session(input: serde_json::Value) -> ModelSession {
        ModelSession::new(&Schema::scout(), FlatRecord::from_json(&input))
    }

    #[test]
    fn test_aggregate_band_counts_filled_fields() {
        let temp_dir = TempDir::new().unwrap();
        let engine = ScoutEngine::new(write_artifact(temp_dir.path()));

        let outcome = engine
            .infer(&session(json!({"process_method": "washed", "stage_9_temp_f": 450})))
            .unwrap();

        assert_eq!(outcome.predicted["end_temp_f"], 450.0);
        assert_eq!(outcome.filled_count(), 10);
        assert_eq!(
            outcome.confidence,
            Confidence::Aggregate {
                band: ConfidenceBand::High,
                filled: 10
            }
        );
        assert_eq!(outcome.unseen_category, None);
    }

    #[test]
    fn test_supplied_burner_values_lower_the_band() {
        let temp_dir = TempDir::new().unwrap();
        let engine = ScoutEngine::new(write_artifact(temp_dir.path()));

        let outcome = engine
            .infer(&session(json!({
                "stage_0_burner_pct": 70, "stage_1_burner_pct": 70, "stage_2_burner_pct": 70,
                "stage_3_burner_pct": 65, "stage_4_burner_pct": 60
            })))
            .unwrap();

        assert_eq!(outcome.filled_count(), 5);
        assert_eq!(outcome.confidence.band(), ConfidenceBand::Medium);
        assert!(!outcome.predicted.contains_key("stage_0_burner_pct"));
    }

    #[test]
    fn test_unseen_process_method_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let engine = ScoutEngine::new(write_artifact(temp_dir.path()));

        let outcome = engine
            .infer(&session(json!({"process_method": "anaerobic"})))
            .unwrap();

        assert_eq!(outcome.unseen_category.as_deref(), Some("anaerobic"));
        assert_eq!(outcome.predicted["end_temp_f"], 440.0);
    }

    #[test]
    fn test_targets_without_models_are_listed() {
        let temp_dir = TempDir::new().unwrap();
        let engine = ScoutEngine::new(write_artifact(temp_dir.path()));

        let outcome = engine.infer(&session(json!({}))).unwrap();

        let skipped: Vec<&str> = outcome.skipped.iter().map(|s| s.target.as_str()).collect();
        assert!(skipped.contains(&"turning_point_temp_f"));
        assert!(skipped.contains(&"stage_9_burner_pct"));
        assert!(outcome.skipped.iter().all(|s| s.reason == SkipReason::NotTrained));
        assert_eq!(outcome.skipped.len() + outcome.filled_count(), outcome.targets.len());
    }

    #[test]
    fn test_missing_artifact_yields_lowest_band() {
        let temp_dir = TempDir::new().unwrap();
        let engine = ScoutEngine::new(temp_dir.path().join("scout_model.json"));

        let outcome = engine.infer(&session(json!({"room_temp_f": 68}))).unwrap();

        assert!(outcome.predicted.is_empty());
        assert_eq!(outcome.confidence.band(), ConfidenceBand::Low);
    }

    #[test]
    fn test_corrupt_artifact_is_distinct_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scout_model.json");
        std::fs::write(&path, "{\"feature_columns\": 3}").unwrap();

        assert!(matches!(
            ScoutEngine::new(path).infer(&session(json!({}))),
            Err(InferenceError::CorruptArtifact { .. })
        ));
    }
}
