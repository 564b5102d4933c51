//! Session flattening
//!
//! Turns a nested [`RoastSession`] (or an already-flat JSON object) into a [`FlatRecord`]
//! keyed by canonical field names. Every canonical field is present in the output; absent
//! values are [`FieldValue::Missing`].
//!
//! Derived fields:
//! - `bean_age_days_at_roast` from `roast_date` and `purchase_date` when both parse
//! - Core only: `roast_date` becomes its day of year (1–366)

use chrono::NaiveDate;
use roastlog_common::record::{FieldValue, FlatRecord};
use roastlog_common::schema::{is_time_field, ModelKind, BEAN_AGE_FIELD, MASTER_ORDER, STAGE_COUNT};
use roastlog_common::session::RoastSession;
use roastlog_common::time::{day_of_year, days_between, mmss_to_seconds, parse_date_flexible};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Flattening failures
#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("stage index {0} is outside 0-9")]
    StageIndex(i64),

    #[error("input is not a JSON object")]
    NotAnObject,

    #[error("malformed session: {0}")]
    Malformed(#[from] serde_json::Error),
}

const STAGE_ZERO_TIME: &str = "stage_0_time_sec";

/// Flattens input sessions for one model kind
#[derive(Debug, Clone, Copy)]
pub struct Flattener {
    kind: ModelKind,
}

impl Flattener {
    pub fn new(kind: ModelKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Flatten a nested session
    ///
    /// Fails only when a stage index is outside 0–9.
    pub fn flatten(&self, session: &RoastSession) -> Result<FlatRecord, FlattenError> {
        if let Some(bad) = session
            .stages
            .iter()
            .find(|s| !(0..STAGE_COUNT as i64).contains(&s.stage))
        {
            return Err(FlattenError::StageIndex(bad.stage));
        }

        let mut record = FlatRecord::new();
        for column in MASTER_ORDER {
            if let Some(value) = session.field_value(column) {
                record.set(column, value);
            }
        }
        if let Some(value) = session.field_value("comments") {
            record.set("comments", value);
        }

        Ok(self.prepare(record))
    }

    /// Apply derived fields to a flat record
    ///
    /// Every MASTER_ORDER column (except `line_number`) is declared; values already
    /// present are left alone, including a supplied bean age. Stage 0 time is the start
    /// of the curve, so a blank one becomes 0 and is never predicted.
    pub fn prepare(&self, mut record: FlatRecord) -> FlatRecord {
        for column in MASTER_ORDER.iter().skip(1) {
            record.declare(*column);
        }
        record.declare("comments");
        record.declare(BEAN_AGE_FIELD);

        if record.get(STAGE_ZERO_TIME).is_missing() {
            record.set(STAGE_ZERO_TIME, 0.0);
        }

        let roasted = date_of(record.get("roast_date"));
        let purchased = date_of(record.get("purchase_date"));

        if record.get(BEAN_AGE_FIELD).is_missing() {
            if let (Some(roasted), Some(purchased)) = (roasted, purchased) {
                record.set(BEAN_AGE_FIELD, days_between(purchased, roasted) as f64);
            }
        }

        if self.kind == ModelKind::Core {
            let doy = match (roasted, record.get("roast_date")) {
                (Some(date), _) => Some(day_of_year(date) as f64),
                (None, value) => value.as_f64().filter(|d| (1.0..=366.0).contains(d)),
            };
            if doy.is_none() && record.is_present("roast_date") {
                debug!(value = ?record.get("roast_date"), "Unparseable roast_date treated as missing");
            }
            record.set("roast_date", doy);
        }

        record
    }

    /// Flatten a JSON input object: nested when it has a `stages` key, flat otherwise
    pub fn from_json(&self, input: &Value) -> Result<FlatRecord, FlattenError> {
        let mut input = input.clone();
        normalize_time_entries(&mut input)?;

        if input.get("stages").is_some() {
            let session: RoastSession = serde_json::from_value(input)?;
            self.flatten(&session)
        } else {
            Ok(self.prepare(FlatRecord::from_json(&input)))
        }
    }
}

/// Fill top-level keys of a JSON input from `defaults` where the input has no value
///
/// Used to pre-fill bean metadata from an inventory lot; supplied values always win.
pub fn apply_defaults(input: &mut Value, defaults: &FlatRecord) -> Result<(), FlattenError> {
    let object = input.as_object_mut().ok_or(FlattenError::NotAnObject)?;
    for (key, value) in defaults.iter() {
        let supplied = object
            .get(key)
            .map_or(false, |v| FieldValue::from_json(v).is_present());
        if value.is_present() && !supplied {
            object.insert(key.clone(), value.to_json());
        }
    }
    Ok(())
}

/// A date field, when it holds a parseable date string
fn date_of(value: &FieldValue) -> Option<NaiveDate> {
    value.as_text().and_then(|s| parse_date_flexible(s).ok())
}

/// Convert `MM:SS` / `MMSS` strings on time fields into seconds
///
/// Applies to flat `*_time_sec` keys and to `time_in_secs` / `time_sec` inside `stages`.
/// A string that is neither a number nor a valid time becomes `null`.
pub fn normalize_time_entries(input: &mut Value) -> Result<(), FlattenError> {
    let object = input.as_object_mut().ok_or(FlattenError::NotAnObject)?;

    for (key, value) in object.iter_mut() {
        if is_time_field(key) {
            normalize_time_value(key, value);
        }
    }

    if let Some(Value::Array(stages)) = object.get_mut("stages") {
        for stage in stages.iter_mut().filter_map(Value::as_object_mut) {
            for key in ["time_in_secs", "time_sec"] {
                if let Some(value) = stage.get_mut(key) {
                    normalize_time_value(key, value);
                }
            }
        }
    }

    Ok(())
}

fn normalize_time_value(key: &str, value: &mut Value) {
    let Value::String(text) = value else {
        return;
    };
    let trimmed = text.trim().to_string();
    let trimmed = trimmed.as_str();
    if FieldValue::from_text(trimmed).is_missing() {
        *value = Value::Null;
        return;
    }
    if let Ok(number) = trimmed.parse::<f64>() {
        if !trimmed.chars().all(|c| c.is_ascii_digit()) || trimmed.len() != 4 {
            *value = Value::from(number);
            return;
        }
    }
    match mmss_to_seconds(trimmed) {
        Ok(seconds) => *value = Value::from(seconds),
        Err(e) => {
            warn!(field = key, "{}; value treated as missing", e);
            *value = Value::Null;
        }
    }
}
