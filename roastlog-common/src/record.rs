//! Flat field records
//!
//! A [`FlatRecord`] is the flat `field name → value` view of a roast session that the
//! inference pipeline works on. Absence is explicit: a declared-but-unset field holds
//! [`FieldValue::Missing`] rather than being left out of the map.

use crate::schema::NAN_TOKEN;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

static MISSING: FieldValue = FieldValue::Missing;

/// One field value as supplied at the input boundary
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// Not supplied (`null`, blank, or the `"NaN"` token)
    #[default]
    Missing,
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Interpret free text; blank and NaN tokens are missing
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NAN_TOKEN) {
            FieldValue::Missing
        } else {
            FieldValue::Text(trimmed.to_string())
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Missing,
            serde_json::Value::Bool(b) => FieldValue::Number(if *b { 1.0 } else { 0.0 }),
            serde_json::Value::Number(n) => n.as_f64().map(FieldValue::from).unwrap_or_default(),
            serde_json::Value::String(s) => FieldValue::from_text(s),
            other => FieldValue::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Missing => serde_json::Value::Null,
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Number(n) => n.is_nan(),
            FieldValue::Text(s) => s.trim().is_empty() || s.trim().eq_ignore_ascii_case(NAN_TOKEN),
        }
    }

    pub fn is_present(&self) -> bool {
        !self.is_missing()
    }

    /// Numeric coercion: non-numeric text and non-finite numbers become `None`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Missing => None,
            FieldValue::Number(n) => n.is_finite().then_some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Category string; missing values become the `"NaN"` category
    pub fn as_category(&self) -> String {
        if self.is_missing() {
            return NAN_TOKEN.to_string();
        }
        match self {
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Text(s) => s.trim().to_string(),
            FieldValue::Missing => NAN_TOKEN.to_string(),
        }
    }

    /// Token written to the persisted store
    pub fn to_token(&self) -> String {
        if self.is_missing() {
            return NAN_TOKEN.to_string();
        }
        match self {
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Missing => NAN_TOKEN.to_string(),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        if n.is_nan() {
            FieldValue::Missing
        } else {
            FieldValue::Number(n)
        }
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(n: Option<f64>) -> Self {
        n.map(FieldValue::from).unwrap_or_default()
    }
}

impl From<Option<&str>> for FieldValue {
    fn from(s: Option<&str>) -> Self {
        s.map(FieldValue::from_text).unwrap_or_default()
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(FieldValue::from_json(&value))
    }
}

/// Serde adapter for `Option<f64>` fields of entered sessions
///
/// Accepts numbers and numeric strings. Blank, `NaN` and non-numeric values become `None`
/// for that field instead of failing the whole session.
pub mod lenient_f64 {
    use super::FieldValue;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use tracing::debug;

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = FieldValue::deserialize(deserializer)?;
        let number = value.as_f64();
        if number.is_none() && value.is_present() {
            debug!(value = %value.to_token(), "Non-numeric value treated as missing");
        }
        Ok(number)
    }
}

/// Format a number without a trailing `.0` for whole values
pub fn format_number(n: f64) -> String {
    format!("{}", n)
}

/// Flat `field → value` map with explicit missing values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl FlatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record with every listed field declared as missing
    pub fn declared<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut record = Self::new();
        for field in fields {
            record.declare(field);
        }
        record
    }

    /// Build from a JSON object; non-object input yields an empty record
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut record = Self::new();
        if let Some(map) = value.as_object() {
            for (key, v) in map {
                record.set(key.clone(), FieldValue::from_json(v));
            }
        }
        record
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Insert `field` as missing unless it already has a value
    pub fn declare(&mut self, field: impl Into<String>) {
        self.fields.entry(field.into()).or_default();
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    /// Value of `field`, [`FieldValue::Missing`] when undeclared
    pub fn get(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&MISSING)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_present(&self, field: &str) -> bool {
        self.get(field).is_present()
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).as_f64()
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        let value = self.get(field);
        if value.is_missing() {
            None
        } else {
            value.as_text()
        }
    }

    /// Fill fields that are missing here from `other`; present values are kept
    pub fn fill_missing_from(&mut self, other: &FlatRecord) {
        for (key, value) in other.iter() {
            if value.is_present() && self.get(key).is_missing() {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }

    /// Names of fields holding a value
    pub fn present_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, v)| v.is_present())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Option<String>> for FieldValue {
    fn from(s: Option<String>) -> Self {
        s.as_deref().map(FieldValue::from_text).unwrap_or_default()
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::from_text(s)
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::from_text(&s)
    }
}
