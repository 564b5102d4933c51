//! Time and date helpers
//!
//! Roast times are whole seconds since charge, displayed as `MM:SS`. Dates are entered
//! in several common formats and modelled as day-of-year.

use crate::{Error, Result};
use chrono::{Datelike, NaiveDate};

const DATE_FORMATS: [&str; 4] = ["%m/%d/%Y", "%m/%d/%y", "%Y-%m-%d", "%Y/%m/%d"];

/// Format whole seconds as `MM:SS` (minutes keep growing past 99)
///
/// Fractional input is rounded to the nearest second; negative input clamps to zero.
pub fn seconds_to_mmss(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.round().max(0.0) as u64 } else { 0 };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Parse `MM:SS` or four-digit `MMSS` into seconds
///
/// Seconds must be below 60.
pub fn mmss_to_seconds(text: &str) -> Result<u32> {
    let s = text.trim();
    let (minutes, seconds) = if let Some((mm, ss)) = s.split_once(':') {
        if mm.is_empty() || ss.len() != 2 || !is_digits(mm) || !is_digits(ss) {
            return Err(Error::InvalidInput(format!(
                "Time must be MM:SS or MMSS (e.g. 09:30 or 0930), got '{}'",
                text
            )));
        }
        (parse_u32(mm)?, parse_u32(ss)?)
    } else if s.len() == 4 && is_digits(s) {
        (parse_u32(&s[..2])?, parse_u32(&s[2..])?)
    } else {
        return Err(Error::InvalidInput(format!(
            "Time must be MM:SS or 4 digits MMSS (e.g. 0930), got '{}'",
            text
        )));
    };

    if seconds >= 60 {
        return Err(Error::InvalidInput(format!(
            "Seconds must be < 60 (e.g. 0959 is max), got '{}'",
            text
        )));
    }

    minutes
        .checked_mul(60)
        .and_then(|m| m.checked_add(seconds))
        .ok_or_else(|| Error::InvalidInput(format!("Time out of range: '{}'", text)))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_u32(s: &str) -> Result<u32> {
    s.parse::<u32>()
        .map_err(|e| Error::InvalidInput(format!("Invalid number '{}': {}", s, e)))
}

/// Parse a date in `MM/DD/YYYY`, `MM/DD/YY`, `YYYY-MM-DD` or `YYYY/MM/DD`
///
/// Years below 100 are taken as 2000s.
pub fn parse_date_flexible(text: &str) -> Result<NaiveDate> {
    let s = text.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            if date.year() < 100 {
                if let Some(shifted) = date.with_year(date.year() + 2000) {
                    return Ok(shifted);
                }
            }
            return Ok(date);
        }
    }
    Err(Error::InvalidInput(format!(
        "Unrecognized date format: {}. Try MM/DD/YYYY, MM/DD/YY, or YYYY-MM-DD.",
        text
    )))
}

/// Day of year, 1–366
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

/// Whole days from `purchased` to `roasted` (negative if purchased after roasting)
pub fn days_between(purchased: NaiveDate, roasted: NaiveDate) -> i64 {
    (roasted - purchased).num_days()
}

/// Season bucket for a roast day of year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    /// Day 80–171 Spring, 172–265 Summer, 266–354 Fall, otherwise Winter
    pub fn from_day_of_year(day: u32) -> Self {
        match day {
            80..=171 => Season::Spring,
            172..=265 => Season::Summer,
            266..=354 => Season::Fall,
            _ => Season::Winter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
            Season::Winter => "Winter",
        }
    }
}

/// Serde adapter for `Option<NaiveDate>` accepting any format [`parse_date_flexible`] does
pub mod flexible_date {
    use super::parse_date_flexible;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) if s.eq_ignore_ascii_case("nan") => Ok(None),
            Some(s) => parse_date_flexible(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
