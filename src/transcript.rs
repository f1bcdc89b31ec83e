//! Message rows -> readable transcript lines.
//!
//! Store timestamps count from 2001-01-01 00:00:00 local time. Older stores
//! write seconds, newer ones nanoseconds; anything above 10^11 is taken as
//! nanoseconds since no seconds value gets near that.

use crate::db::{MessageRecord, Row};
use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};
use serde_json::Value;

/// Rendered when no row carries text.
pub const NO_MESSAGES: &str = "No messages found in the specified time period.";

/// Sender label for rows without a sender handle.
pub const UNKNOWN_SENDER: &str = "Unknown";

const NANOSECOND_FLOOR: f64 = 1e11;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn store_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2001, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn store_seconds(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    if !value.is_finite() {
        return None;
    }
    Some(if value.abs() > NANOSECOND_FLOOR {
        value / 1e9
    } else {
        value
    })
}

/// Local wall-clock time for a raw store timestamp; unparsable or out of
/// range values become the current time.
pub fn store_time_to_local(raw: &Value) -> NaiveDateTime {
    store_seconds(raw)
        .and_then(|secs| TimeDelta::try_milliseconds((secs * 1000.0).round() as i64))
        .and_then(|delta| store_epoch().checked_add_signed(delta))
        .unwrap_or_else(|| Local::now().naive_local())
}

pub fn seconds_since_store_epoch(at: NaiveDateTime) -> i64 {
    (at - store_epoch()).num_seconds()
}

/// Store-seconds cutoff for "the last `hours` hours" as of `now`. A window
/// reaching past the representable calendar starts at the store epoch.
pub fn cutoff_seconds(now: NaiveDateTime, hours: u32) -> i64 {
    TimeDelta::try_hours(i64::from(hours))
        .and_then(|window| now.checked_sub_signed(window))
        .map(seconds_since_store_epoch)
        .unwrap_or(0)
}

/// Parse message rows, skipping the ones that do not parse.
pub fn records_from_rows(rows: &[Row]) -> Vec<MessageRecord> {
    rows.iter()
        .filter_map(|row| match MessageRecord::from_row(row) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("skipping message row: {}", e);
                None
            }
        })
        .collect()
}

/// One `[timestamp] sender: text` line per text-bearing record, in input
/// order. `label` maps a sender handle to a display name.
pub fn format_transcript<F>(records: &[MessageRecord], self_label: &str, mut label: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut lines = Vec::new();
    for record in records {
        let Some(text) = record.text.as_deref().filter(|t| !t.is_empty()) else {
            continue;
        };
        let sender = if record.is_from_me {
            self_label.to_string()
        } else {
            match record.sender.as_deref() {
                Some(handle) if !handle.is_empty() => label(handle),
                _ => UNKNOWN_SENDER.to_string(),
            }
        };
        let when = store_time_to_local(&record.date).format(TIMESTAMP_FORMAT);
        lines.push(format!("[{}] {}: {}", when, sender, text));
    }
    if lines.is_empty() {
        NO_MESSAGES.to_string()
    } else {
        lines.join("\n")
    }
}
