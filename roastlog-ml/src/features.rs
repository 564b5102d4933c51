//! Feature vector building
//!
//! A flat record is aligned to the column list a trained artifact recorded, never the
//! compiled-in schema. Columns the record lacks become missing; keys the artifact does not
//! know are ignored. The output is always exactly one row whose columns equal the
//! requested order.

use roastlog_common::record::{FieldValue, FlatRecord};
use roastlog_common::schema::{ModelKind, Schema, NAN_TOKEN, PROCESS_INDICATOR_PREFIX};
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// Per-model view of a session: every schema field declared, absent ones missing
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSession {
    kind: ModelKind,
    fields: FlatRecord,
}

impl ModelSession {
    pub fn new(schema: &Schema, mut fields: FlatRecord) -> Self {
        for field in schema.declared_fields() {
            fields.declare(field);
        }
        Self {
            kind: schema.kind,
            fields,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn fields(&self) -> &FlatRecord {
        &self.fields
    }

    pub fn get(&self, field: &str) -> &FieldValue {
        self.fields.get(field)
    }

    /// True when the caller supplied a usable value for `field`
    pub fn is_observed(&self, field: &str) -> bool {
        self.fields.is_present(field)
    }

    pub fn into_fields(self) -> FlatRecord {
        self.fields
    }
}

/// One cell of a feature row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// Numeric feature; `None` is missing
    Number(Option<f64>),
    /// Categorical feature; missing is the `"NaN"` category
    Category(String),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => *n,
            Cell::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            Cell::Category(c) => Some(c.as_str()),
            Cell::Number(_) => None,
        }
    }
}

/// Exactly one row of model input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    columns: Vec<String>,
    cells: Vec<Cell>,
}

impl FeatureRow {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.cells[i])
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Core row: categorical columns as strings, everything else numeric
///
/// `columns` is the artifact's feature order; `categorical` names the columns that stay
/// strings.
pub fn build_core_row(record: &FlatRecord, columns: &[String], categorical: &[String]) -> FeatureRow {
    let cells = columns
        .iter()
        .map(|column| {
            let value = record.get(column);
            if categorical.iter().any(|c| c == column) {
                Cell::Category(value.as_category())
            } else {
                Cell::Number(value.as_f64())
            }
        })
        .collect();

    FeatureRow {
        columns: columns.to_vec(),
        cells,
    }
}

/// Scout row plus the process method value the artifact has never seen, if any
#[derive(Debug, Clone, PartialEq)]
pub struct ScoutRow {
    pub row: FeatureRow,
    pub unseen_category: Option<String>,
}

/// `proc_<value>`, or `proc_nan` for a missing process method
pub fn process_indicator(value: &FieldValue) -> String {
    if value.is_missing() {
        format!("{}nan", PROCESS_INDICATOR_PREFIX)
    } else {
        format!("{}{}", PROCESS_INDICATOR_PREFIX, value.as_category())
    }
}

/// Scout row: one-hot `process_method`, then align to `columns`
///
/// Indicator columns not produced by the input are 0. A process method with no matching
/// indicator column leaves every indicator at 0 and is reported back.
pub fn build_scout_row(record: &FlatRecord, columns: &[String]) -> ScoutRow {
    let process = record.get("process_method");
    let active = process_indicator(process);
    let known: HashSet<&str> = columns
        .iter()
        .filter(|c| c.starts_with(PROCESS_INDICATOR_PREFIX))
        .map(String::as_str)
        .collect();

    let unseen_category = if known.contains(active.as_str()) {
        None
    } else {
        let label = if process.is_missing() {
            NAN_TOKEN.to_string()
        } else {
            process.as_category()
        };
        warn!(
            process_method = %label,
            "Process method not seen in training; all process indicators set to 0"
        );
        Some(label)
    };

    let cells = columns
        .iter()
        .map(|column| {
            if column.starts_with(PROCESS_INDICATOR_PREFIX) {
                Cell::Number(Some(if *column == active { 1.0 } else { 0.0 }))
            } else {
                Cell::Number(record.get(column).as_f64())
            }
        })
        .collect();

    ScoutRow {
        row: FeatureRow {
            columns: columns.to_vec(),
            cells,
        },
        unseen_category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_model_session_declares_schema_fields() {
        let schema = Schema::core();
        let session = ModelSession::new(&schema, FlatRecord::from_json(&json!({"agtron": 55})));

        for field in schema.declared_fields() {
            assert!(session.fields().contains(&field), "{} not declared", field);
        }
        assert!(session.is_observed("agtron"));
        assert!(!session.is_observed("clarity"));
        assert_eq!(session.kind(), ModelKind::Core);
    }

    #[test]
    fn test_core_row_matches_requested_order() {
        let record = FlatRecord::from_json(&json!({
            "country": "Ethiopia",
            "end_temp_f": "455",
            "agtron": "dark",
            "unrelated": 1
        }));
        let columns = names(&["agtron", "country", "region", "end_temp_f", "never_seen"]);
        let categorical = names(&["country", "region"]);

        let row = build_core_row(&record, &columns, &categorical);

        assert_eq!(row.columns(), columns.as_slice());
        assert_eq!(
            row.cells(),
            &[
                Cell::Number(None),
                Cell::Category("Ethiopia".to_string()),
                Cell::Category("NaN".to_string()),
                Cell::Number(Some(455.0)),
                Cell::Number(None),
            ]
        );
    }

    #[test]
    fn test_scout_one_hot_with_known_category() {
        let record = FlatRecord::from_json(&json!({"process_method": "washed", "room_temp_f": 68}));
        let columns = names(&["room_temp_f", "proc_natural", "proc_washed", "proc_nan", "batch_weight_lbs"]);

        let scout = build_scout_row(&record, &columns);

        assert_eq!(scout.unseen_category, None);
        assert_eq!(scout.row.get("proc_washed"), Some(&Cell::Number(Some(1.0))));
        assert_eq!(scout.row.get("proc_natural"), Some(&Cell::Number(Some(0.0))));
        assert_eq!(scout.row.get("proc_nan"), Some(&Cell::Number(Some(0.0))));
        assert_eq!(scout.row.get("room_temp_f"), Some(&Cell::Number(Some(68.0))));
        assert_eq!(scout.row.get("batch_weight_lbs"), Some(&Cell::Number(None)));
    }

    #[test]
    fn test_scout_missing_process_uses_nan_indicator() {
        let columns = names(&["proc_washed", "proc_nan"]);
        let scout = build_scout_row(&FlatRecord::new(), &columns);

        assert_eq!(scout.unseen_category, None);
        assert_eq!(scout.row.get("proc_nan"), Some(&Cell::Number(Some(1.0))));
    }

    #[test]
    fn test_scout_unseen_category_zero_fills() {
        let record = FlatRecord::from_json(&json!({"process_method": "anaerobic"}));
        let columns = names(&["proc_washed", "proc_nan", "stage_9_temp_f"]);

        let scout = build_scout_row(&record, &columns);

        assert_eq!(scout.unseen_category.as_deref(), Some("anaerobic"));
        assert!(scout
            .row
            .cells()
            .iter()
            .take(2)
            .all(|c| *c == Cell::Number(Some(0.0))));
        assert_eq!(scout.row.len(), 3);
    }
}
