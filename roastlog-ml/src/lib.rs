//! roastlog-ml library interface
//!
//! Feature-completion pipeline for partially entered roast sessions:
//!
//! 1. [`flatten`]: nested or flat input → flat record keyed by canonical field names
//! 2. [`features`]: flat record → one feature row in the artifact's column order
//! 3. [`model`]: per-target regressors loaded from JSON artifacts
//! 4. [`inference`]: Core and Scout engines producing predictions and confidence
//! 5. [`merge`]: predictions filled into the blanks of the observed record
//! 6. [`report`]: text and JSON rendering of the completed session

pub mod features;
pub mod flatten;
pub mod inference;
pub mod merge;
pub mod model;
pub mod report;

pub use features::{FeatureRow, ModelSession};
pub use flatten::{FlattenError, Flattener};
pub use inference::{
    Confidence, ConfidenceBand, CompletionEngine, CoreEngine, InferenceError, InferenceOutcome,
    ScoutEngine, SkipReason, SkippedTarget,
};
pub use merge::{complete, merge, PredictedSession};
pub use model::{ModelError, ModelHandle, Regressor, TargetModel, TreeEnsemble};
pub use report::{render_report, CompletionOutput, ReportStyle};
