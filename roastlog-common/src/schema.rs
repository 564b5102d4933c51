//! Canonical field lists
//!
//! Single source of the compiled-in field orders:
//! - [`MASTER_ORDER`]: columns of a persisted roast session row
//! - Core and Scout feature orders, predictable targets and categorical columns
//!
//! The compiled-in lists are defaults only. Inference aligns feature vectors to the
//! column order recorded in the trained-model artifact, and [`Schema`] values are
//! passed explicitly to the flattener and builder so that an artifact trained on an
//! older field list is still fed the columns it was trained on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fixed stage checkpoints in a roast curve
pub const STAGE_COUNT: usize = 10;

/// Token written for absent values in persisted rows and used as the missing category
pub const NAN_TOKEN: &str = "NaN";

/// Prefix of Scout's one-hot `process_method` indicator columns
pub const PROCESS_INDICATOR_PREFIX: &str = "proc_";

/// Derived field: days between purchase and roast
pub const BEAN_AGE_FIELD: &str = "bean_age_days_at_roast";

/// Canonical persisted row order (56 columns)
pub const MASTER_ORDER: [&str; 56] = [
    "line_number",
    "id",
    "roast_date",
    "country",
    "region",
    "altitude_meters",
    "variety",
    "process_method",
    "purchase_date",
    "supplier",
    "room_temp_f",
    "humidity_pct",
    "room_bean_temp_f",
    "green_bean_moisture_pct",
    "batch_weight_lbs",
    "post_roast_batch_weight_lbs",
    "turning_point_temp_f",
    "turning_point_time_sec",
    "end_temp_f",
    "agtron",
    "roasted_bean_moisture_pct",
    "clarity",
    "acidity",
    "body",
    "sweetness",
    "overall_rating",
    "stage_0_time_sec", "stage_0_temp_f", "stage_0_burner_pct",
    "stage_1_time_sec", "stage_1_temp_f", "stage_1_burner_pct",
    "stage_2_time_sec", "stage_2_temp_f", "stage_2_burner_pct",
    "stage_3_time_sec", "stage_3_temp_f", "stage_3_burner_pct",
    "stage_4_time_sec", "stage_4_temp_f", "stage_4_burner_pct",
    "stage_5_time_sec", "stage_5_temp_f", "stage_5_burner_pct",
    "stage_6_time_sec", "stage_6_temp_f", "stage_6_burner_pct",
    "stage_7_time_sec", "stage_7_temp_f", "stage_7_burner_pct",
    "stage_8_time_sec", "stage_8_temp_f", "stage_8_burner_pct",
    "stage_9_time_sec", "stage_9_temp_f", "stage_9_burner_pct",
];

/// Core feature order (48 columns)
pub const CORE_FEATURE_ORDER: [&str; 48] = [
    "supplier",
    "country",
    "region",
    "variety",
    "process_method",
    "altitude_meters",
    "roast_date",
    "bean_age_days_at_roast",
    "room_temp_f",
    "humidity_pct",
    "room_bean_temp_f",
    "green_bean_moisture_pct",
    "batch_weight_lbs",
    // Turning point
    "turning_point_temp_f",
    "turning_point_time_sec",
    // End of roast
    "end_temp_f",
    "agtron",
    "roasted_bean_moisture_pct",
    "stage_0_temp_f", "stage_0_burner_pct", "stage_0_time_sec",
    "stage_1_temp_f", "stage_1_burner_pct", "stage_1_time_sec",
    "stage_2_temp_f", "stage_2_burner_pct", "stage_2_time_sec",
    "stage_3_temp_f", "stage_3_burner_pct", "stage_3_time_sec",
    "stage_4_temp_f", "stage_4_burner_pct", "stage_4_time_sec",
    "stage_5_temp_f", "stage_5_burner_pct", "stage_5_time_sec",
    "stage_6_temp_f", "stage_6_burner_pct", "stage_6_time_sec",
    "stage_7_temp_f", "stage_7_burner_pct", "stage_7_time_sec",
    "stage_8_temp_f", "stage_8_burner_pct", "stage_8_time_sec",
    "stage_9_temp_f", "stage_9_burner_pct", "stage_9_time_sec",
];

/// Stage targets shared by Core and Scout (stage temps and anchor times are inputs)
const STAGE_PREDICTABLES: [&str; 17] = [
    "stage_0_time_sec", "stage_0_burner_pct",
    "stage_1_burner_pct",
    "stage_2_time_sec", "stage_2_burner_pct",
    "stage_3_time_sec", "stage_3_burner_pct",
    "stage_4_time_sec", "stage_4_burner_pct",
    "stage_5_time_sec", "stage_5_burner_pct",
    "stage_6_burner_pct",
    "stage_7_time_sec", "stage_7_burner_pct",
    "stage_8_time_sec", "stage_8_burner_pct",
    "stage_9_burner_pct",
];

const CORE_METADATA_PREDICTABLES: [&str; 11] = [
    "post_roast_batch_weight_lbs",
    "turning_point_temp_f",
    "turning_point_time_sec",
    "end_temp_f",
    "agtron",
    "roasted_bean_moisture_pct",
    "clarity",
    "acidity",
    "body",
    "sweetness",
    "overall_rating",
];

/// Core categorical columns (cast to string, missing → `"NaN"` category)
pub const CORE_CATEGORICAL: [&str; 5] = ["supplier", "country", "region", "variety", "process_method"];

/// Scout feature order (19 columns): environment plus curve anchors
pub const SCOUT_FEATURE_ORDER: [&str; 19] = [
    "process_method",
    "room_temp_f",
    "humidity_pct",
    "room_bean_temp_f",
    "green_bean_moisture_pct",
    "batch_weight_lbs",
    // Anchors
    "stage_0_temp_f",
    "stage_1_temp_f", "stage_1_time_sec",
    "stage_2_temp_f",
    "stage_3_temp_f",
    "stage_4_temp_f",
    "stage_5_temp_f",
    "stage_6_temp_f", "stage_6_time_sec",
    "stage_7_temp_f",
    "stage_8_temp_f",
    "stage_9_temp_f", "stage_9_time_sec",
];

const SCOUT_METADATA_PREDICTABLES: [&str; 3] = [
    "turning_point_temp_f",
    "turning_point_time_sec",
    "end_temp_f",
];

/// Scout categorical columns (one-hot encoded)
pub const SCOUT_CATEGORICAL: [&str; 1] = ["process_method"];

/// Sensory score fields (integers 1–10)
pub const SENSORY_FIELDS: [&str; 5] = ["clarity", "acidity", "body", "sweetness", "overall_rating"];

/// `stage_{i}_temp_f`
pub fn stage_temp_key(stage: usize) -> String {
    format!("stage_{}_temp_f", stage)
}

/// `stage_{i}_time_sec`
pub fn stage_time_key(stage: usize) -> String {
    format!("stage_{}_time_sec", stage)
}

/// `stage_{i}_burner_pct`
pub fn stage_burner_key(stage: usize) -> String {
    format!("stage_{}_burner_pct", stage)
}

/// True for fields whose values are elapsed seconds (rendered as MM:SS)
pub fn is_time_field(field: &str) -> bool {
    field.ends_with("_time_sec")
}

/// Which predictor a schema belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Minimal-input quick predictor
    Scout,
    /// Richer multi-field predictor
    Core,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Scout => "scout",
            ModelKind::Core => "core",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field lists for one model
///
/// Built from the compiled-in defaults with [`Schema::core`] / [`Schema::scout`], or
/// with [`Schema::with_features`] when the feature order comes from a trained artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub kind: ModelKind,
    /// Model input columns, in order
    pub features: Vec<String>,
    /// Fields the model may fill in
    pub predictables: Vec<String>,
    /// Columns handled as categories rather than numbers
    pub categorical: Vec<String>,
}

impl Schema {
    /// Compiled-in Core schema
    pub fn core() -> Self {
        Self {
            kind: ModelKind::Core,
            features: to_owned(&CORE_FEATURE_ORDER),
            predictables: CORE_METADATA_PREDICTABLES
                .iter()
                .chain(STAGE_PREDICTABLES.iter())
                .map(|s| s.to_string())
                .collect(),
            categorical: to_owned(&CORE_CATEGORICAL),
        }
    }

    /// Compiled-in Scout schema
    pub fn scout() -> Self {
        Self {
            kind: ModelKind::Scout,
            features: to_owned(&SCOUT_FEATURE_ORDER),
            predictables: SCOUT_METADATA_PREDICTABLES
                .iter()
                .chain(STAGE_PREDICTABLES.iter())
                .map(|s| s.to_string())
                .collect(),
            categorical: to_owned(&SCOUT_CATEGORICAL),
        }
    }

    /// Compiled-in schema for a model kind
    pub fn for_kind(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Scout => Self::scout(),
            ModelKind::Core => Self::core(),
        }
    }

    /// Replace the feature order (e.g. with the order recorded at training time)
    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    pub fn is_categorical(&self, column: &str) -> bool {
        self.categorical.iter().any(|c| c == column)
    }

    pub fn is_predictable(&self, field: &str) -> bool {
        self.predictables.iter().any(|p| p == field)
    }

    /// Features followed by predictables not already listed as features
    pub fn declared_fields(&self) -> Vec<String> {
        let mut fields = self.features.clone();
        for target in &self.predictables {
            if !fields.contains(target) {
                fields.push(target.clone());
            }
        }
        fields
    }

    /// Columns present in `self.features` but not in `other`, and vice versa
    pub fn feature_drift(&self, other: &[String]) -> (Vec<String>, Vec<String>) {
        let missing = self
            .features
            .iter()
            .filter(|f| !other.contains(f))
            .cloned()
            .collect();
        let extra = other
            .iter()
            .filter(|f| !self.features.contains(f))
            .cloned()
            .collect();
        (missing, extra)
    }
}

fn to_owned(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|s| s.to_string()).collect()
}
