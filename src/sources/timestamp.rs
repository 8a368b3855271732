//! Permissive publication-date parsing
//!
//! Feeds in the wild carry RFC 2822 dates with named zones, two-digit years,
//! dash-separated days, ISO 8601 stamps, and the occasional zone-less local
//! time. Everything that can be read becomes a UTC instant; everything else is
//! `None` and the caller skips the entry.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Layouts tried against the text before a trailing zone token.
///
/// Two-digit-year layouts come first: `%Y` would happily read "06" as year 6.
const ZONED_LAYOUTS: &[&str] = &[
    "%d %b %y %H:%M:%S",
    "%d %b %y %H:%M",
    "%d-%b-%y %H:%M:%S",
    "%d-%b-%y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%d-%b-%Y %H:%M:%S",
    "%d-%b-%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Layouts without any zone, read as UTC
const NAIVE_LAYOUTS: &[&str] = &[
    "%a %b %d %H:%M:%S %Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Named zones seen in news feeds, as offsets east of UTC in minutes
const ZONE_ABBREVIATIONS: &[(&str, i32)] = &[
    ("EST", -5 * 60),
    ("EDT", -4 * 60),
    ("CST", -6 * 60),
    ("CDT", -5 * 60),
    ("MST", -7 * 60),
    ("MDT", -6 * 60),
    ("PST", -8 * 60),
    ("PDT", -7 * 60),
    ("IST", 5 * 60 + 30),
    ("BST", 60),
    ("CET", 60),
    ("CEST", 2 * 60),
    ("EET", 2 * 60),
    ("EEST", 3 * 60),
    ("SGT", 8 * 60),
    ("HKT", 8 * 60),
    ("JST", 9 * 60),
    ("AEST", 10 * 60),
    ("AEDT", 11 * 60),
];

/// Parses a feed timestamp into UTC
///
/// Recognized: RFC 3339, RFC 2822 (including obsolete zone names),
/// RFC 822 with two-digit years and optional dashes, ANSI C `asctime`, and
/// `YYYY-MM-DD HH:MM:SS` (taken as UTC). A named zone that is not in the
/// built-in table is taken as UTC. Day-of-week prefixes are ignored.
///
/// # Examples
///
/// ```
/// use nifty_sentry::sources::parse_timestamp;
///
/// let ts = parse_timestamp("02-Jan-06 15:04 MST").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2006-01-02T22:04:00+00:00");
///
/// assert!(parse_timestamp("yesterday-ish").is_none());
/// ```
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    // Zoned layouts run before chrono's RFC 2822 reader so named zones go
    // through the abbreviation table
    let parsed = parse_rfc3339(&text)
        .or_else(|| parse_zoned(&text))
        .or_else(|| parse_rfc2822(&text))
        .or_else(|| parse_naive(&text))?;

    // A layout that accepted garbage usually lands in antiquity
    (parsed.year() >= 1900).then_some(parsed)
}

fn parse_rfc3339(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_rfc2822(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_zoned(text: &str) -> Option<DateTime<Utc>> {
    let (head, zone) = text.rsplit_once(' ')?;
    let offset = zone_offset(zone)?;
    let head = strip_weekday(head);

    ZONED_LAYOUTS.iter().find_map(|layout| {
        let naive = NaiveDateTime::parse_from_str(head, layout).ok()?;
        offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

fn parse_naive(text: &str) -> Option<DateTime<Utc>> {
    NAIVE_LAYOUTS.iter().find_map(|layout| {
        NaiveDateTime::parse_from_str(text, layout)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    })
}

/// Drops a leading "Mon, " so a wrong weekday cannot reject the date
fn strip_weekday(text: &str) -> &str {
    match text.split_once(", ") {
        Some((day, rest)) if day.chars().all(|c| c.is_ascii_alphabetic()) => rest,
        _ => text,
    }
}

/// Interprets a trailing zone token
///
/// Numeric offsets (`+0530`, `-07:00`) and known abbreviations map to their
/// offset. Any other purely alphabetic token of up to five letters is taken as
/// UTC. Returns `None` when the token is not a zone at all.
fn zone_offset(token: &str) -> Option<FixedOffset> {
    let upper = token.to_ascii_uppercase();
    match upper.as_str() {
        "Z" | "UT" | "UTC" | "GMT" => return FixedOffset::east_opt(0),
        _ => {}
    }

    if let Some(rest) = token.strip_prefix('+') {
        return numeric_offset(rest).and_then(FixedOffset::east_opt);
    }
    if let Some(rest) = token.strip_prefix('-') {
        return numeric_offset(rest).and_then(|secs| FixedOffset::east_opt(-secs));
    }

    if let Some((_, minutes)) = ZONE_ABBREVIATIONS.iter().find(|(name, _)| *name == upper) {
        return FixedOffset::east_opt(minutes * 60);
    }

    let is_abbreviation =
        (1..=5).contains(&token.len()) && token.chars().all(|c| c.is_ascii_alphabetic());
    if is_abbreviation {
        tracing::debug!("Unknown zone '{}', reading as UTC", token);
        return FixedOffset::east_opt(0);
    }

    None
}

/// Parses `hhmm` or `hh:mm` into seconds
fn numeric_offset(text: &str) -> Option<i32> {
    let digits: String = text.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    Some(hours * 3600 + minutes * 60)
}
