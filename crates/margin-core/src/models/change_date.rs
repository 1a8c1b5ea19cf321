//! Change-date parsing and formatting
//!
//! Every timestamp a note carries is UTC with millisecond precision. Upstream
//! writers (Tomboy's .NET serializer in particular) emit seven fractional
//! digits, e.g. `2010-01-23T12:07:38.7743020-05:00`; the digits past the
//! millisecond are discarded before the string is parsed.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use regex::Regex;

use crate::error::{Error, Result};

static SUB_MILLISECOND_CLEANER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3})\d+(Z|[-+]\d{2}:\d{2})$")
        .expect("Invalid regex")
});

/// Strip fractional-second digits beyond the third, keeping the offset.
///
/// Strings that do not carry extra digits are returned unchanged.
pub fn clean_change_date(raw: &str) -> String {
    let raw = raw.trim();
    SUB_MILLISECOND_CLEANER.captures(raw).map_or_else(
        || raw.to_string(),
        |caps| {
            tracing::trace!("Cleaned sub-millisecond digits from {raw}");
            format!("{}{}", &caps[1], &caps[2])
        },
    )
}

/// Parse a note change date into UTC, truncated to milliseconds.
pub fn parse_change_date(raw: &str) -> Result<DateTime<Utc>> {
    let cleaned = clean_change_date(raw);
    DateTime::parse_from_rfc3339(&cleaned)
        .map(|date| normalize(date.with_timezone(&Utc)))
        .map_err(|error| Error::MalformedTimestamp(format!("{raw}: {error}")))
}

/// Format a change date the way the store and the wire carry it.
///
/// The output is fixed-width, so lexical order matches chronological order.
pub fn format_change_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Truncate to millisecond precision.
pub fn normalize(date: DateTime<Utc>) -> DateTime<Utc> {
    date.trunc_subsecs(3)
}

/// Current time in UTC at millisecond precision.
pub fn now_utc() -> DateTime<Utc> {
    normalize(Utc::now())
}
