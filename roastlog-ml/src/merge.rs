//! Merge predictions into the observed session
//!
//! `predicted[k] = observed[k]` when the caller supplied `k`, otherwise the model's
//! value. Every field taken from a model is recorded in [`PredictedSession::inferred`],
//! so the report can mark it and the caller can tell supplied values from estimates.

use crate::features::ModelSession;
use crate::inference::{CompletionEngine, Confidence, InferenceError, InferenceOutcome, SkippedTarget};
use roastlog_common::record::FlatRecord;
use roastlog_common::schema::ModelKind;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// A session with its blanks filled, plus provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictedSession {
    pub kind: ModelKind,
    /// Observed values with inferred values filled in
    pub values: FlatRecord,
    /// Fields whose value came from a model
    pub inferred: BTreeSet<String>,
    pub confidence: Confidence,
    /// Predictable fields still blank after inference
    pub unfilled: Vec<String>,
    pub skipped: Vec<SkippedTarget>,
    pub unseen_category: Option<String>,
}

impl PredictedSession {
    pub fn is_inferred(&self, field: &str) -> bool {
        self.inferred.contains(field)
    }
}

/// Fill the blanks of `session` from `outcome`
pub fn merge(session: ModelSession, outcome: InferenceOutcome) -> PredictedSession {
    let kind = session.kind();
    let mut values = session.into_fields();
    let mut inferred = BTreeSet::new();

    for (field, value) in &outcome.predicted {
        if values.get(field).is_missing() {
            values.set(field.clone(), *value);
            inferred.insert(field.clone());
        } else {
            debug!(field = %field, "Observed value kept over prediction");
        }
    }

    let unfilled = outcome
        .targets
        .iter()
        .filter(|t| values.get(t).is_missing())
        .cloned()
        .collect();

    PredictedSession {
        kind,
        values,
        inferred,
        confidence: outcome.confidence,
        unfilled,
        skipped: outcome.skipped,
        unseen_category: outcome.unseen_category,
    }
}

/// Declare, infer and merge in one step
pub fn complete(engine: &dyn CompletionEngine, record: FlatRecord) -> Result<PredictedSession, InferenceError> {
    let session = ModelSession::new(engine.schema(), record);
    let outcome = engine.infer(&session)?;
    Ok(merge(session, outcome))
}
