//! End-to-end completion: JSON input → flatten → infer → merge → report

use roastlog_common::db::{init_database, SessionStore};
use roastlog_common::schema::{ModelKind, Schema};
use roastlog_common::session::RoastSession;
use roastlog_common::{Error, SessionError};
use roastlog_ml::inference::{ConfidenceBand, CoreEngine, InferenceError, ScoutEngine};
use roastlog_ml::report::{render_report, ReportStyle};
use roastlog_ml::{complete, Flattener};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Ensemble that splits on one numeric feature
fn split_model(features: &[String], feature: &str, threshold: f64, low: f64, high: f64) -> Value {
    let index = features.iter().position(|f| f == feature).unwrap();
    json!({
        "feature_names": features,
        "base_score": 0.0,
        "trees": [{"nodes": [
            {"type": "numeric", "feature": index, "threshold": threshold, "missing_left": true, "left": 1, "right": 2},
            {"type": "leaf", "value": low},
            {"type": "leaf", "value": high}
        ]}]
    })
}

struct CoreFixture {
    _dir: TempDir,
    meta_path: PathBuf,
}

/// Core artifact trained on a reordered feature list
fn core_fixture(corrupt_clarity: bool) -> CoreFixture {
    let dir = TempDir::new().unwrap();
    let mut features = Schema::core().features;
    features.reverse();

    let write = |name: &str, body: String| std::fs::write(dir.path().join(name), body).unwrap();
    write(
        "end_temp_f.json",
        split_model(&features, "stage_9_temp_f", 445.0, 440.0, 455.0).to_string(),
    );
    write(
        "agtron.json",
        split_model(&features, "stage_9_temp_f", 445.0, 62.0, 51.0).to_string(),
    );
    write(
        "clarity.json",
        if corrupt_clarity {
            "{ definitely not json".to_string()
        } else {
            split_model(&features, "agtron", 55.0, 6.0, 8.0).to_string()
        },
    );

    let meta = json!({
        "feature_order": features,
        "predictables": Schema::core().predictables,
        "models": {
            "end_temp_f": "end_temp_f.json",
            "agtron": "agtron.json",
            "clarity": "clarity.json"
        },
        "metrics": {"end_temp_f": 2.0, "agtron": 4.0, "clarity": 0.5},
        "fallbacks": {"stage_9_burner_pct": 35.0}
    });
    let meta_path = dir.path().join("core_meta.json");
    std::fs::write(&meta_path, meta.to_string()).unwrap();

    CoreFixture { _dir: dir, meta_path }
}

fn nested_input() -> Value {
    json!({
        "roast_date": "2025-07-04",
        "purchase_date": "2025-06-20",
        "supplier": "Royal",
        "country": "Ethiopia",
        "process_method": "washed",
        "batch_weight_lbs": 180,
        "stages": [
            {"stage": 0, "bean_temp": 400, "burner_pct": 70},
            {"stage": 1, "bean_temp": 300, "time_in_secs": "01:00"},
            {"stage": 9, "bean_temp": 450, "time_in_secs": 660}
        ]
    })
}

fn run_core(meta_path: &Path, input: &Value) -> Result<roastlog_ml::PredictedSession, InferenceError> {
    let record = Flattener::new(ModelKind::Core).from_json(input)?;
    complete(&CoreEngine::new(meta_path), record)
}

#[test]
fn test_no_artifacts_returns_only_observed_values() {
    let dir = TempDir::new().unwrap();
    let input = json!({"country": "Kenya", "stage_9_temp_f": 448, "agtron": 58});

    let record = Flattener::new(ModelKind::Core).from_json(&input).unwrap();
    let observed: BTreeSet<String> = record.present_fields().into_iter().map(String::from).collect();
    let predicted = complete(&CoreEngine::new(dir.path().join("core_meta.json")), record).unwrap();

    let present: BTreeSet<String> = predicted
        .values
        .present_fields()
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(present, observed);
    assert!(predicted.inferred.is_empty());
    assert_eq!(predicted.confidence.band(), ConfidenceBand::Low);
    // agtron was supplied and stage 0 time defaults to 0
    assert_eq!(
        predicted.unfilled.len() + 2,
        Schema::core().predictables.len(),
        "every blank predictable is reported"
    );
    assert_eq!(predicted.values.number("stage_0_time_sec"), Some(0.0));
}

#[test]
fn test_supplied_field_is_never_sent_to_its_model() {
    // The clarity model file is corrupt; loading it would fail the whole call
    let fixture = core_fixture(true);
    let mut input = nested_input();
    input["sensory_scores"] = json!({"clarity": 9});

    let predicted = run_core(&fixture.meta_path, &input).unwrap();

    assert_eq!(predicted.values.number("clarity"), Some(9.0));
    assert!(!predicted.is_inferred("clarity"));
    assert!(predicted.confidence.field("clarity").is_none());
}

#[test]
fn test_corrupt_model_file_is_reported_distinctly() {
    let fixture = core_fixture(true);

    let err = run_core(&fixture.meta_path, &nested_input()).unwrap_err();

    match err {
        InferenceError::CorruptArtifact { path, .. } => assert!(path.ends_with("clarity.json")),
        other => panic!("expected corrupt artifact, got {:?}", other),
    }
}

#[test]
fn test_end_temp_confidence_from_validation_error() {
    let fixture = core_fixture(false);

    let predicted = run_core(&fixture.meta_path, &nested_input()).unwrap();

    assert_eq!(predicted.values.number("end_temp_f"), Some(455.0));
    let confidence = predicted.confidence.field("end_temp_f").unwrap();
    assert!((confidence - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(predicted.confidence.field("agtron"), Some(0.2));
    assert_eq!(predicted.confidence.field("stage_9_burner_pct"), Some(0.2));
}

#[test]
fn test_models_see_artifact_column_order_and_chain_only_observed_inputs() {
    let fixture = core_fixture(false);

    let predicted = run_core(&fixture.meta_path, &nested_input()).unwrap();

    // Agtron is predicted, not observed, so the clarity model still sees it missing
    assert_eq!(predicted.values.number("agtron"), Some(51.0));
    assert_eq!(predicted.values.number("clarity"), Some(6.0));
}

#[test]
fn test_provenance_and_never_overwrite() {
    let fixture = core_fixture(false);
    let mut input = nested_input();
    input["end_temp_f"] = json!(447);

    let record = Flattener::new(ModelKind::Core).from_json(&input).unwrap();
    let observed: BTreeSet<String> = record.present_fields().into_iter().map(String::from).collect();
    let predicted = complete(&CoreEngine::new(&fixture.meta_path), record.clone()).unwrap();

    for field in &observed {
        assert_eq!(predicted.values.get(field), record.get(field), "{} changed", field);
    }
    assert!(predicted.inferred.is_disjoint(&observed));
    for field in &predicted.inferred {
        assert!(predicted.values.is_present(field));
        assert!(predicted.confidence.field(field).is_some());
    }
    let expected: BTreeSet<String> = ["agtron", "clarity", "stage_9_burner_pct"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(predicted.inferred, expected);
}

#[test]
fn test_flat_input_stage_zero_time_is_never_predicted() {
    let dir = TempDir::new().unwrap();
    let features = Schema::core().features;
    let constant = json!({"feature_names": features, "base_score": 37.0, "trees": []});
    std::fs::write(dir.path().join("stage_0_time_sec.json"), constant.to_string()).unwrap();
    let meta = json!({
        "feature_order": features,
        "predictables": ["stage_0_time_sec"],
        "models": {"stage_0_time_sec": "stage_0_time_sec.json"},
        "metrics": {}
    });
    let meta_path = dir.path().join("core_meta.json");
    std::fs::write(&meta_path, meta.to_string()).unwrap();

    let input = json!({"stage_0_temp_f": 400, "stage_9_temp_f": 455});
    let predicted = run_core(&meta_path, &input).unwrap();

    assert_eq!(predicted.values.number("stage_0_time_sec"), Some(0.0));
    assert!(!predicted.is_inferred("stage_0_time_sec"));
}

#[test]
fn test_nested_sentinel_values_are_filled_not_rejected() {
    let fixture = core_fixture(false);
    let mut input = nested_input();
    input["end_temp_f"] = json!("NaN");
    input["room_temp_f"] = json!("");
    input["stages"][0]["bean_temp"] = json!("abc");

    let predicted = run_core(&fixture.meta_path, &input).unwrap();

    assert_eq!(predicted.values.number("end_temp_f"), Some(455.0));
    assert!(predicted.is_inferred("end_temp_f"));
    assert!(predicted.values.get("room_temp_f").is_missing());
    assert!(predicted.values.get("stage_0_temp_f").is_missing());
}

#[test]
fn test_core_report_marks_predictions() {
    let fixture = core_fixture(false);
    let predicted = run_core(&fixture.meta_path, &nested_input()).unwrap();

    let report = render_report(&predicted, ReportStyle::Plain);

    assert!(report.contains("Using: Royal – Ethiopia – (washed)"));
    assert!(report.contains("Roast Day of Year: 185 (Summer)"));
    assert!(report.contains("Bean Age in Days: 14"));
    assert!(report.contains("Stage 1 - Temp: 300 - Burner: n/a - Time: 01:00"));
    assert!(report.contains("End of Roast: 455.0*"));
    assert!(report.contains("fields could not be predicted"));
}

#[test]
fn test_scout_completion_from_flat_input() {
    let dir = TempDir::new().unwrap();
    let columns: Vec<String> = ["room_temp_f", "stage_9_temp_f", "proc_washed", "proc_nan"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let artifact = json!({
        "feature_columns": columns,
        "models": {
            "end_temp_f": {
                "kind": "trained",
                "validation_error": 2.0,
                "model": split_model(&columns, "stage_9_temp_f", 445.0, 440.0, 455.0)
            },
            "turning_point_temp_f": {"kind": "fallback", "value": 185.0}
        }
    });
    let path = dir.path().join("scout_model.json");
    std::fs::write(&path, artifact.to_string()).unwrap();

    let input = json!({"process_method": "washed", "stage_9_temp_f": "450", "turning_point_temp_f": ""});
    let record = Flattener::new(ModelKind::Scout).from_json(&input).unwrap();
    let predicted = complete(&ScoutEngine::new(&path), record).unwrap();

    assert_eq!(predicted.values.number("end_temp_f"), Some(455.0));
    assert_eq!(predicted.values.number("turning_point_temp_f"), Some(185.0));
    assert_eq!(predicted.confidence.band(), ConfidenceBand::Low);
    assert_eq!(predicted.unseen_category, None);
}

#[tokio::test]
async fn test_nine_stage_session_rejected_at_persistence() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("roastlog.db")).await.unwrap();
    let store = SessionStore::new(pool);

    let stages: Vec<Value> = (0..9)
        .map(|i| json!({"stage": i, "bean_temp": 400 + i, "time_in_secs": 60 * i}))
        .collect();
    let session: RoastSession = serde_json::from_value(json!({"stages": stages})).unwrap();

    let err = store.append(&session).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Session(SessionError::StageCount { expected: 10, found: 9 })
    ));
    assert_eq!(store.count().await.unwrap(), 0);
}
