//! Publication time resolution
//!
//! Listings show either a machine-readable timestamp in the age element's
//! `title` attribute or human text such as "3 hours ago". Both are resolved
//! against a reference time; anything unreadable falls back to that time.

use chrono::{DateTime, Days, Duration, Months, NaiveDateTime, TimeZone, Utc};

const ABSOLUTE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Earliest publication year accepted as plausible
const MIN_YEAR: i32 = 2000;

/// Resolves the publication time of an item
///
/// # Arguments
///
/// * `title_attr` - The age element's `title` attribute, if any
/// * `text` - The age element's visible text
/// * `now` - Reference time of the extraction
///
/// # Returns
///
/// The resolved time, or `now` when neither form can be read or the result
/// predates 2000.
pub fn resolve_published_at(
    title_attr: Option<&str>,
    text: &str,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let resolved = title_attr
        .and_then(parse_absolute)
        .or_else(|| resolve_relative(text, now));

    match resolved {
        Some(resolved) => coerce(resolved, now),
        None => {
            tracing::warn!(
                "Unreadable publication time (title: {:?}, text: {:?}), using capture time",
                title_attr,
                text
            );
            now
        }
    }
}

/// Parses the first whitespace-separated token as `YYYY-MM-DDTHH:MM:SS` (UTC)
pub fn parse_absolute(title_attr: &str) -> Option<DateTime<Utc>> {
    let token = title_attr.split_whitespace().next()?;
    NaiveDateTime::parse_from_str(token, ABSOLUTE_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Resolves text such as "5 minutes ago", "an hour ago" or "yesterday"
///
/// Returns `None` for text that does not follow the `<count> <unit> [ago]` shape.
pub fn resolve_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = text.trim().to_lowercase();
    let text = text.strip_suffix(" ago").unwrap_or(&text).trim();

    match text {
        "just now" | "now" => return Some(now),
        "yesterday" => return now.checked_sub_days(Days::new(1)),
        _ => {}
    }

    let mut parts = text.split_whitespace();
    let count: u32 = match parts.next()? {
        "a" | "an" => 1,
        n => n.parse().ok()?,
    };
    let unit = parts.next()?;

    if unit.contains("second") {
        now.checked_sub_signed(Duration::seconds(i64::from(count)))
    } else if unit.contains("minute") {
        now.checked_sub_signed(Duration::minutes(i64::from(count)))
    } else if unit.contains("hour") {
        now.checked_sub_signed(Duration::hours(i64::from(count)))
    } else if unit.contains("day") {
        now.checked_sub_days(Days::new(u64::from(count)))
    } else if unit.contains("week") {
        now.checked_sub_days(Days::new(u64::from(count) * 7))
    } else if unit.contains("month") {
        now.checked_sub_months(Months::new(count))
    } else if unit.contains("year") {
        now.checked_sub_months(Months::new(count.checked_mul(12)?))
    } else {
        None
    }
}

/// Replaces implausibly old times with `now`
pub fn coerce(resolved: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    use chrono::Datelike;

    if resolved.year() < MIN_YEAR {
        tracing::warn!(
            "Publication time {} predates {}, using capture time",
            resolved.to_rfc3339(),
            MIN_YEAR
        );
        now
    } else {
        resolved
    }
}
