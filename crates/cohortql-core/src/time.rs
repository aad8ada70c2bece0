//! Date and timestamp formats used for bound parameters.
//!
//! Timestamps are always rendered in UTC at microsecond precision with the
//! pattern `yyyy-MM-dd HH:mm:ss.SSSSSS+HHMM`.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::error::{CoreError, Result};

pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6][offset_hour sign:mandatory][offset_minute]"
);

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Truncate to whole microseconds, the warehouse TIMESTAMP precision.
pub fn truncate_to_micros(ts: OffsetDateTime) -> OffsetDateTime {
    let micros = ts.microsecond();
    ts.replace_microsecond(micros).unwrap_or(ts)
}

pub fn format_timestamp(ts: OffsetDateTime) -> Result<String> {
    Ok(truncate_to_micros(ts.to_offset(UtcOffset::UTC)).format(TIMESTAMP_FORMAT)?)
}

pub fn parse_timestamp(s: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(s, TIMESTAMP_FORMAT)
        .map_err(|e| CoreError::invalid_date_time(format!("'{s}': {e}")))
}

pub fn format_date(date: Date) -> Result<String> {
    Ok(date.format(DATE_FORMAT)?)
}

pub fn parse_date(s: &str) -> Result<Date> {
    Date::parse(s, DATE_FORMAT).map_err(|e| CoreError::invalid_date_time(format!("'{s}': {e}")))
}

// Serde adapter for `yyyy-MM-dd` dates: `#[serde(with = "iso_date")]`.
time::serde::format_description!(pub iso_date, Date, "[year]-[month]-[day]");
