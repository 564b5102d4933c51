//! Completed-session reports
//!
//! Text reports mark every inferred value, either in ANSI blue or with a trailing `*`.
//! Times are shown as `MM:SS`, the roast date as day of year with its season, and a
//! turning point of 0 as `n/a`.

use crate::inference::{Confidence, SkippedTarget};
use crate::merge::PredictedSession;
use roastlog_common::record::{format_number, FieldValue, FlatRecord};
use roastlog_common::schema::{
    is_time_field, stage_burner_key, stage_temp_key, stage_time_key, ModelKind, BEAN_AGE_FIELD,
    STAGE_COUNT,
};
use roastlog_common::time::{day_of_year, parse_date_flexible, seconds_to_mmss, Season};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

const ANSI_BLUE: &str = "\x1b[94m";
const ANSI_RESET: &str = "\x1b[0m";
const NOT_AVAILABLE: &str = "n/a";

/// How inferred values are highlighted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStyle {
    Ansi,
    /// Trailing `*` marker
    Plain,
}

impl ReportStyle {
    pub fn from_color(color: bool) -> Self {
        if color {
            ReportStyle::Ansi
        } else {
            ReportStyle::Plain
        }
    }

    fn mark(&self, text: &str, inferred: bool) -> String {
        match (self, inferred) {
            (_, false) => text.to_string(),
            (ReportStyle::Ansi, true) => format!("{}{}{}", ANSI_BLUE, text, ANSI_RESET),
            (ReportStyle::Plain, true) => format!("{}*", text),
        }
    }
}

/// Mean, spread and outlier-trimmed mean of per-field confidence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceSummary {
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Mean of scores within one standard deviation of the mean
    pub filtered_mean: f64,
    pub excluded: Vec<String>,
}

/// Summarize per-field scores; `None` when there are none
pub fn confidence_summary(scores: &BTreeMap<String, f64>) -> Option<ConfidenceSummary> {
    if scores.is_empty() {
        return None;
    }

    let n = scores.len() as f64;
    let mean = scores.values().sum::<f64>() / n;
    let std_dev = (scores.values().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

    let (inside, outside): (Vec<(&String, &f64)>, Vec<(&String, &f64)>) = scores
        .iter()
        .partition(|(_, v)| (**v - mean).abs() <= std_dev + f64::EPSILON);

    let filtered_mean = if inside.is_empty() {
        mean
    } else {
        inside.iter().map(|(_, v)| **v).sum::<f64>() / inside.len() as f64
    };

    Some(ConfidenceSummary {
        mean,
        std_dev,
        filtered_mean,
        excluded: outside.into_iter().map(|(k, _)| k.clone()).collect(),
    })
}

/// `Using: Royal – Ethiopia – Guji – (heirloom, washed) – 2100m – purchased 2025-02-01`
pub fn bean_summary(values: &FlatRecord) -> Option<String> {
    let text = |field: &str| {
        let value = values.get(field);
        value.is_present().then(|| display_value(value))
    };

    let mut parts: Vec<String> = ["supplier", "country", "region"]
        .iter()
        .filter_map(|&f| text(f))
        .collect();

    match (text("variety"), text("process_method")) {
        (Some(variety), Some(process)) => parts.push(format!("({}, {})", variety, process)),
        (Some(variety), None) => parts.push(format!("({})", variety)),
        (None, Some(process)) => parts.push(format!("({})", process)),
        (None, None) => {}
    }
    if let Some(altitude) = values.number("altitude_meters") {
        parts.push(format!("{}m", format_number(altitude)));
    }
    if let Some(purchased) = text("purchase_date") {
        parts.push(format!("purchased {}", purchased));
    }

    (!parts.is_empty()).then(|| format!("Using: {}", parts.join(" – ")))
}

/// Roast day of year from a numeric day or a date string
fn roast_day(value: &FieldValue) -> Option<u32> {
    if let Some(day) = value.as_f64() {
        return (1.0..=366.0).contains(&day).then_some(day as u32);
    }
    value
        .as_text()
        .and_then(|s| parse_date_flexible(s).ok())
        .map(day_of_year)
}

fn display_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Number(n) => format_number(*n),
        FieldValue::Text(s) => s.clone(),
        FieldValue::Missing => NOT_AVAILABLE.to_string(),
    }
}

struct Renderer<'a> {
    session: &'a PredictedSession,
    style: ReportStyle,
    lines: Vec<String>,
}

impl<'a> Renderer<'a> {
    fn new(session: &'a PredictedSession, style: ReportStyle) -> Self {
        Self {
            session,
            style,
            lines: Vec::new(),
        }
    }

    fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    /// Display text for `field` with its inferred marker
    fn value(&self, field: &str) -> String {
        let value = self.session.values.get(field);
        let text = if value.is_missing() {
            NOT_AVAILABLE.to_string()
        } else if is_time_field(field) {
            value
                .as_f64()
                .map(seconds_to_mmss)
                .unwrap_or_else(|| display_value(value))
        } else {
            display_value(value)
        };
        self.style.mark(&text, self.session.is_inferred(field))
    }

    /// Numeric field rounded to `decimals`
    fn rounded(&self, field: &str, decimals: usize) -> String {
        match self.session.values.number(field) {
            Some(n) => self
                .style
                .mark(&format!("{:.*}", decimals, n), self.session.is_inferred(field)),
            None => self.value(field),
        }
    }

    /// Turning point values of 0 mean "not recorded"
    fn turning_point(&self, field: &str) -> String {
        match self.session.values.number(field) {
            Some(n) if n == 0.0 => NOT_AVAILABLE.to_string(),
            Some(n) if is_time_field(field) => {
                self.style.mark(&seconds_to_mmss(n), self.session.is_inferred(field))
            }
            Some(_) => self.rounded(field, 0),
            None => NOT_AVAILABLE.to_string(),
        }
    }

    fn labelled(&mut self, fields: &[(&str, &str)]) {
        for (field, label) in fields {
            let suffix = if *field == "batch_weight_lbs" { " lbs" } else { "" };
            let text = format!("{}: {}{}", label, self.value(field), suffix);
            self.line(text);
        }
    }

    fn confidence(&mut self) {
        let session = self.session;
        match &session.confidence {
            Confidence::NoModel => {
                self.line("Confidence: Low (no model available)");
            }
            Confidence::Aggregate { band, filled } => {
                self.line(format!("Confidence: {} ({} fields predicted)", band.as_str(), filled));
            }
            Confidence::PerField { scores } => match confidence_summary(scores) {
                Some(summary) => {
                    self.line("Confidence per predicted field:");
                    for (field, score) in scores {
                        self.line(format!("  {}: {:.3}", field, score));
                    }
                    self.line(format!("Mean: {:.3}", summary.mean));
                    self.line(format!("Std Dev: {:.3}", summary.std_dev));
                    if !summary.excluded.is_empty() {
                        self.line(format!("Outside ±1σ: {}", summary.excluded.join(", ")));
                    }
                    self.line(format!("Filtered mean (±1σ): {:.3}", summary.filtered_mean));
                }
                None => self.line("Confidence: nothing predicted"),
            },
        }
        self.line("");
    }

    fn roast_date(&mut self) {
        let session = self.session;
        if let Some(day) = roast_day(session.values.get("roast_date")) {
            let season = Season::from_day_of_year(day);
            let text = self
                .style
                .mark(&day.to_string(), session.is_inferred("roast_date"));
            self.line(format!("Roast Day of Year: {} ({})", text, season.as_str()));
        }
        if session.values.is_present(BEAN_AGE_FIELD) {
            let text = format!("Bean Age in Days: {}", self.value(BEAN_AGE_FIELD));
            self.line(text);
        }
    }

    fn stages(&mut self) {
        for i in 0..STAGE_COUNT {
            let text = format!(
                "Stage {} - Temp: {} - Burner: {} - Time: {}",
                i,
                self.rounded(&stage_temp_key(i), 0),
                self.rounded(&stage_burner_key(i), 0),
                self.value(&stage_time_key(i)),
            );
            self.line(text);

            if i == 0 {
                let text = format!(
                    "Turning Point - Temp: {} - Time: {}",
                    self.turning_point("turning_point_temp_f"),
                    self.turning_point("turning_point_time_sec"),
                );
                self.line(text);
            }
        }
    }

    fn degraded(&mut self) {
        let session = self.session;
        let unfilled = &session.unfilled;
        if !unfilled.is_empty() {
            let text = format!(
                "{} fields could not be predicted: {}",
                unfilled.len(),
                unfilled.join(", ")
            );
            self.line("");
            self.line(text);
        }
        if let Some(category) = &session.unseen_category {
            let text = format!(
                "Note: process method '{}' was not seen in training; treated as unknown",
                category
            );
            self.line(text);
        }
        if !session.inferred.is_empty() {
            let legend = match self.style {
                ReportStyle::Ansi => format!("{}Blue{} = predicted", ANSI_BLUE, ANSI_RESET),
                ReportStyle::Plain => "* = predicted".to_string(),
            };
            self.line("");
            self.line(legend);
        }
    }

    fn core(mut self) -> String {
        self.line("");
        self.line("Your Predicted Roast:");
        self.line("");
        self.confidence();

        if let Some(summary) = bean_summary(&self.session.values) {
            self.line(summary);
            self.line("");
        }

        self.labelled(&[
            ("supplier", "Supplier Name"),
            ("country", "Country"),
            ("altitude_meters", "Altitude"),
            ("variety", "Variety"),
            ("region", "Region"),
        ]);
        self.roast_date();
        self.labelled(&[
            ("room_temp_f", "Room Temp"),
            ("humidity_pct", "Room Humidity"),
            ("room_bean_temp_f", "Bean Temp"),
            ("green_bean_moisture_pct", "Bean Humidity"),
            ("batch_weight_lbs", "Batch Weight"),
        ]);
        self.stages();

        for (field, label) in [
            ("end_temp_f", "End of Roast"),
            ("agtron", "Agtron"),
            ("roasted_bean_moisture_pct", "Post Roast Moisture"),
        ] {
            let text = format!("{}: {}", label, self.rounded(field, 1));
            self.line(text);
        }
        self.labelled(&[
            ("post_roast_batch_weight_lbs", "Post Roast Weight"),
            ("clarity", "Clarity"),
            ("acidity", "Acidity"),
            ("body", "Body"),
            ("sweetness", "Sweetness"),
            ("overall_rating", "Overall"),
            ("comments", "Comments"),
        ]);

        self.degraded();
        self.lines.join("\n")
    }

    fn scout(mut self) -> String {
        self.line("");
        self.line("--- Scout Prediction Results ---");
        self.line("");
        self.confidence();

        self.labelled(&[
            ("process_method", "Process Method"),
            ("room_temp_f", "Room Temp"),
            ("humidity_pct", "Room Humidity"),
            ("room_bean_temp_f", "Room Bean Temp"),
            ("green_bean_moisture_pct", "Green Bean Moisture"),
            ("batch_weight_lbs", "Batch Weight"),
        ]);
        self.stages();
        let text = format!("End of Roast: {}", self.rounded("end_temp_f", 1));
        self.line(text);

        self.degraded();
        self.lines.join("\n")
    }
}

/// Text report for a completed session
pub fn render_report(session: &PredictedSession, style: ReportStyle) -> String {
    let renderer = Renderer::new(session, style);
    match session.kind {
        ModelKind::Core => renderer.core(),
        ModelKind::Scout => renderer.scout(),
    }
}

/// `--json` output
#[derive(Debug, Serialize)]
pub struct CompletionOutput<'a> {
    pub model: ModelKind,
    pub predicted_session: &'a FlatRecord,
    pub confidence: &'a Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_summary: Option<ConfidenceSummary>,
    pub inferred_fields: &'a BTreeSet<String>,
    pub unfilled: &'a [String],
    pub skipped: &'a [SkippedTarget],
    pub unseen_category: Option<&'a str>,
}

impl<'a> CompletionOutput<'a> {
    pub fn new(session: &'a PredictedSession) -> Self {
        let confidence_summary = match &session.confidence {
            Confidence::PerField { scores } => confidence_summary(scores),
            _ => None,
        };
        Self {
            model: session.kind,
            predicted_session: &session.values,
            confidence: &session.confidence,
            confidence_summary,
            inferred_fields: &session.inferred,
            unfilled: &session.unfilled,
            skipped: &session.skipped,
            unseen_category: session.unseen_category.as_deref(),
        }
    }
}
