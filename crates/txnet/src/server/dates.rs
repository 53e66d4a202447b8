use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use txnet_core::TimeWindow;

use super::error::AppError;

/// Naive datetime layouts accepted after RFC 3339 fails. `%.f` also
/// matches an absent fractional part.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a query date into naive UTC. Offsets are converted to UTC; a bare
/// date means midnight.
pub(super) fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Build a window from optional `start_date`/`end_date` query values.
/// Blank values are treated as absent.
pub(super) fn time_window(start: Option<&str>, end: Option<&str>) -> Result<TimeWindow, AppError> {
    Ok(TimeWindow::new(
        parse_bound("start_date", start)?,
        parse_bound("end_date", end)?,
    ))
}

fn parse_bound(field: &str, raw: Option<&str>) -> Result<Option<NaiveDateTime>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => parse_date(value)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid {field} format"))),
    }
}
