//! Roast session data model
//!
//! A [`RoastSession`] is one roast event as entered: bean metadata and environment at the
//! top level, the roast curve as a list of [`Stage`] checkpoints, a turning point, end of
//! roast metrics and optional sensory scores.
//!
//! Sessions are persisted append-only as one canonical row in
//! [`MASTER_ORDER`](crate::schema::MASTER_ORDER). See [`RoastSession::to_canonical_row`].

use crate::record::{lenient_f64, FieldValue, FlatRecord};
use crate::schema::{
    stage_burner_key, stage_temp_key, stage_time_key, MASTER_ORDER, NAN_TOKEN, STAGE_COUNT,
};
use crate::time::flexible_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persistence invariant violations
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("expected exactly {expected} stages (0-9), found {found}")]
    StageCount { expected: usize, found: usize },

    #[error("stage index {0} is outside 0-9")]
    StageIndex(i64),

    #[error("stage {0} appears more than once")]
    DuplicateStage(i64),

    #[error("stage 9 bean temperature is required")]
    MissingFinalTemp,

    #[error("stage 0 time must be 0, got {0}")]
    StageZeroTime(f64),

    #[error("canonical row has {found} columns, expected {expected}")]
    ColumnCount { expected: usize, found: usize },
}

/// Green coffee metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeanMetadata {
    #[serde(default, alias = "supplier_name")]
    pub supplier: Option<String>,
    #[serde(default, alias = "origin_country")]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, with = "lenient_f64")]
    pub altitude_meters: Option<f64>,
    #[serde(default)]
    pub variety: Option<String>,
    #[serde(default)]
    pub process_method: Option<String>,
    #[serde(default, with = "flexible_date")]
    pub purchase_date: Option<NaiveDate>,
}

/// Room and green bean conditions before charging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, with = "lenient_f64")]
    pub room_temp_f: Option<f64>,
    #[serde(default, with = "lenient_f64", alias = "room_rh_pct")]
    pub humidity_pct: Option<f64>,
    #[serde(default, with = "lenient_f64", alias = "bean_temp_start_f")]
    pub room_bean_temp_f: Option<f64>,
    #[serde(default, with = "lenient_f64")]
    pub green_bean_moisture_pct: Option<f64>,
}

/// One of the ten roast curve checkpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Checkpoint index; valid values are 0–9
    pub stage: i64,
    #[serde(default, with = "lenient_f64", alias = "time_sec")]
    pub time_in_secs: Option<f64>,
    #[serde(default, with = "lenient_f64", alias = "bean_temp")]
    pub bean_temp_f: Option<f64>,
    #[serde(default, with = "lenient_f64")]
    pub burner_pct: Option<f64>,
}

impl Stage {
    pub fn new(stage: i64, time_in_secs: Option<f64>, bean_temp_f: Option<f64>, burner_pct: Option<f64>) -> Self {
        Self {
            stage,
            time_in_secs,
            bean_temp_f,
            burner_pct,
        }
    }
}

/// Minimum bean temperature point after charge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurningPoint {
    #[serde(default, with = "lenient_f64", rename = "turning_point_temp_f", alias = "turning_point_temp")]
    pub temp_f: Option<f64>,
    #[serde(default, with = "lenient_f64", rename = "turning_point_time_sec", alias = "turning_point_time")]
    pub time_sec: Option<f64>,
}

/// Measurements taken at and after drop
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndOfRoast {
    #[serde(default, with = "lenient_f64", alias = "end_temp")]
    pub end_temp_f: Option<f64>,
    #[serde(default, with = "lenient_f64")]
    pub agtron: Option<f64>,
    #[serde(default, with = "lenient_f64", alias = "moisture_post_pct")]
    pub roasted_bean_moisture_pct: Option<f64>,
    #[serde(default, with = "lenient_f64")]
    pub post_roast_batch_weight_lbs: Option<f64>,
}

/// Cupping scores (1–10), filled in after the fact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensoryScores {
    #[serde(default, with = "lenient_f64")]
    pub clarity: Option<f64>,
    #[serde(default, with = "lenient_f64")]
    pub acidity: Option<f64>,
    #[serde(default, with = "lenient_f64")]
    pub body: Option<f64>,
    #[serde(default, with = "lenient_f64")]
    pub sweetness: Option<f64>,
    #[serde(default, with = "lenient_f64", alias = "overall")]
    pub overall_rating: Option<f64>,
    #[serde(default, alias = "descriptors")]
    pub comments: Option<String>,
}

/// One roast event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoastSession {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, with = "flexible_date")]
    pub roast_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub bean: BeanMetadata,
    #[serde(flatten)]
    pub environment: Environment,
    #[serde(default, with = "lenient_f64")]
    pub batch_weight_lbs: Option<f64>,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(flatten)]
    pub turning_point: TurningPoint,
    #[serde(flatten)]
    pub end: EndOfRoast,
    #[serde(default, alias = "sensory_scores")]
    pub sensory: Option<SensoryScores>,
}

impl RoastSession {
    /// Stage record for `index`, if supplied
    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.iter().find(|s| s.stage == index as i64)
    }

    /// Check the invariants a persisted row depends on
    ///
    /// - exactly ten stage entries, indices 0–9 each once
    /// - stage 9 carries a bean temperature
    /// - stage 0 time, when given, is 0
    pub fn validate_for_persistence(&self) -> Result<(), SessionError> {
        if self.stages.len() != STAGE_COUNT {
            return Err(SessionError::StageCount {
                expected: STAGE_COUNT,
                found: self.stages.len(),
            });
        }

        let mut seen = [false; STAGE_COUNT];
        for stage in &self.stages {
            if !(0..STAGE_COUNT as i64).contains(&stage.stage) {
                return Err(SessionError::StageIndex(stage.stage));
            }
            let slot = &mut seen[stage.stage as usize];
            if *slot {
                return Err(SessionError::DuplicateStage(stage.stage));
            }
            *slot = true;
        }

        let final_temp = self.stage(STAGE_COUNT - 1).and_then(|s| s.bean_temp_f);
        if final_temp.map_or(true, |t| !t.is_finite()) {
            return Err(SessionError::MissingFinalTemp);
        }

        if let Some(t) = self.stage(0).and_then(|s| s.time_in_secs) {
            if t != 0.0 {
                return Err(SessionError::StageZeroTime(t));
            }
        }

        Ok(())
    }

    /// Stored value for one canonical column (stage columns included)
    ///
    /// Returns `None` for `line_number`, which the store assigns.
    pub fn field_value(&self, column: &str) -> Option<FieldValue> {
        let text = |s: &Option<String>| FieldValue::from(s.as_deref());
        let date = |d: &Option<NaiveDate>| {
            d.map(|d| FieldValue::Text(d.format("%Y-%m-%d").to_string()))
                .unwrap_or_default()
        };
        let sensory = self.sensory.clone().unwrap_or_default();

        let value = match column {
            "line_number" => return None,
            "id" => text(&self.id),
            "roast_date" => date(&self.roast_date),
            "supplier" => text(&self.bean.supplier),
            "country" => text(&self.bean.country),
            "region" => text(&self.bean.region),
            "altitude_meters" => self.bean.altitude_meters.into(),
            "variety" => text(&self.bean.variety),
            "process_method" => text(&self.bean.process_method),
            "purchase_date" => date(&self.bean.purchase_date),
            "room_temp_f" => self.environment.room_temp_f.into(),
            "humidity_pct" => self.environment.humidity_pct.into(),
            "room_bean_temp_f" => self.environment.room_bean_temp_f.into(),
            "green_bean_moisture_pct" => self.environment.green_bean_moisture_pct.into(),
            "batch_weight_lbs" => self.batch_weight_lbs.into(),
            "post_roast_batch_weight_lbs" => self.end.post_roast_batch_weight_lbs.into(),
            "turning_point_temp_f" => self.turning_point.temp_f.into(),
            "turning_point_time_sec" => self.turning_point.time_sec.into(),
            "end_temp_f" => self.end.end_temp_f.into(),
            "agtron" => self.end.agtron.into(),
            "roasted_bean_moisture_pct" => self.end.roasted_bean_moisture_pct.into(),
            "clarity" => sensory.clarity.into(),
            "acidity" => sensory.acidity.into(),
            "body" => sensory.body.into(),
            "sweetness" => sensory.sweetness.into(),
            "overall_rating" => sensory.overall_rating.into(),
            "comments" => text(&sensory.comments),
            other => return self.stage_field_value(other),
        };
        Some(value)
    }

    fn stage_field_value(&self, column: &str) -> Option<FieldValue> {
        (0..STAGE_COUNT).find_map(|i| {
            let stage = self.stage(i);
            if column == stage_temp_key(i) {
                Some(stage.and_then(|s| s.bean_temp_f).into())
            } else if column == stage_time_key(i) {
                Some(stage.and_then(|s| s.time_in_secs).into())
            } else if column == stage_burner_key(i) {
                Some(stage.and_then(|s| s.burner_pct).into())
            } else {
                None
            }
        })
    }

    /// Render the session as a row in MASTER_ORDER
    ///
    /// Validates the persistence invariants first. The `line_number` cell holds the
    /// `"NaN"` placeholder until the store assigns one.
    pub fn to_canonical_row(&self) -> Result<CanonicalRow, SessionError> {
        self.validate_for_persistence()?;

        let values: Vec<String> = MASTER_ORDER
            .iter()
            .map(|column| {
                self.field_value(column)
                    .map(|v| v.to_token())
                    .unwrap_or_else(|| NAN_TOKEN.to_string())
            })
            .collect();

        CanonicalRow::new(values)
    }

    /// Fill bean metadata fields that are unset here from `bean`
    pub fn apply_bean_defaults(&mut self, bean: &BeanMetadata) {
        let b = &mut self.bean;
        b.supplier = b.supplier.take().or_else(|| bean.supplier.clone());
        b.country = b.country.take().or_else(|| bean.country.clone());
        b.region = b.region.take().or_else(|| bean.region.clone());
        b.altitude_meters = b.altitude_meters.or(bean.altitude_meters);
        b.variety = b.variety.take().or_else(|| bean.variety.clone());
        b.process_method = b.process_method.take().or_else(|| bean.process_method.clone());
        b.purchase_date = b.purchase_date.or(bean.purchase_date);
    }
}

impl BeanMetadata {
    /// Bean metadata as flat fields (unset fields are missing)
    pub fn to_record(&self) -> FlatRecord {
        let mut record = FlatRecord::new();
        record.set("supplier", self.supplier.as_deref());
        record.set("country", self.country.as_deref());
        record.set("region", self.region.as_deref());
        record.set("altitude_meters", self.altitude_meters);
        record.set("variety", self.variety.as_deref());
        record.set("process_method", self.process_method.as_deref());
        record.set(
            "purchase_date",
            self.purchase_date.map(|d| d.format("%Y-%m-%d").to_string()),
        );
        record
    }
}

/// One persisted row: exactly `MASTER_ORDER.len()` string cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRow {
    values: Vec<String>,
}

impl CanonicalRow {
    pub fn new(values: Vec<String>) -> Result<Self, SessionError> {
        if values.len() != MASTER_ORDER.len() {
            return Err(SessionError::ColumnCount {
                expected: MASTER_ORDER.len(),
                found: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        MASTER_ORDER
            .iter()
            .position(|c| *c == column)
            .map(|i| self.values[i].as_str())
    }

    pub fn set(&mut self, column: &str, value: impl Into<String>) -> bool {
        match MASTER_ORDER.iter().position(|c| *c == column) {
            Some(i) => {
                self.values[i] = value.into();
                true
            }
            None => false,
        }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Pairs of (column, value) in MASTER_ORDER
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, &str)> {
        MASTER_ORDER.iter().copied().zip(self.values.iter().map(String::as_str))
    }
}
