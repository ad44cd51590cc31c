//! Timestamp helpers.

use chrono::{DateTime, Local, SecondsFormat, Utc};

/// Format used in capture file names (e.g. `20240404T133433`).
pub const CAPTURE_STAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Current UTC time as RFC 3339 with second precision (e.g. `2024-04-04T13:34:33Z`).
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn capture_stamp(at: DateTime<Local>) -> String {
    at.format(CAPTURE_STAMP_FORMAT).to_string()
}

pub fn new_request_id() -> String {
    ulid::Ulid::new().to_string()
}
