//! Directory generalized-time encoding (`YYYYMMDDHHMMSS.0Z`).

use chrono::{DateTime, NaiveDateTime, Utc};

const GENERALIZED_TIME: &str = "%Y%m%d%H%M%S";

/// Format a timestamp the way incremental filters compare it.
#[must_use]
pub fn format_generalized_time(at: DateTime<Utc>) -> String {
    format!("{}.0Z", at.format(GENERALIZED_TIME))
}

/// Parse `20240102150405Z`, `20240102150405.0Z` and other fractional forms.
#[must_use]
pub fn parse_generalized_time(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim().strip_suffix('Z')?;
    let whole = trimmed.split(['.', ',']).next()?;
    if whole.len() != 14 {
        return None;
    }
    NaiveDateTime::parse_from_str(whole, GENERALIZED_TIME)
        .ok()
        .map(|naive| naive.and_utc())
}
