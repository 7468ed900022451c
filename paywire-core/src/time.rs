//! Timestamp parsing for token expiries and `Retry-After` headers.
//!
//! ```rust
//! use paywire_core::time::parse_expiry;
//!
//! let strict = parse_expiry("2024-01-01T12:00:00Z").unwrap();
//! let no_colon = parse_expiry("2024-01-01T12:00:00+0000").unwrap();
//! assert_eq!(strict, no_colon);
//! ```

use crate::error::{ParseError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::Duration;

/// Offset formats accepted after strict RFC3339 fails.
///
/// Some upstream serializers omit the colon in the UTC offset
/// (`+0000` instead of `+00:00`).
const EXPIRY_FALLBACK_FORMATS: [&str; 2] = [
    "%Y-%m-%dT%H:%M:%S%.f%z", // "2024-01-01T12:00:00.123+0000"
    "%Y-%m-%dT%H:%M:%S%z",    // "2024-01-01T12:00:00+0000"
];

/// Obsolete HTTP-date forms, both implicitly GMT.
const HTTP_DATE_OBSOLETE_FORMATS: [&str; 2] = [
    "%A, %d-%b-%y %H:%M:%S GMT", // RFC 850: "Sunday, 06-Nov-94 08:49:37 GMT"
    "%a %b %e %H:%M:%S %Y",      // asctime: "Sun Nov  6 08:49:37 1994"
];

/// Parses a token `expires_at` value into a UTC timestamp.
///
/// Accepts strict RFC3339 first, then the colon-less offset variants.
pub fn parse_expiry(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ParseError::timestamp_owned("Empty expiry timestamp".to_string()).into());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in &EXPIRY_FALLBACK_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    Err(ParseError::timestamp_owned(format!("Unable to parse expiry timestamp: {value}")).into())
}

/// Interprets a `Retry-After` header value relative to `now`.
///
/// Integer values are seconds; anything else is tried as an HTTP-date
/// (IMF-fixdate, then RFC 850 and asctime). A date in the past collapses to a
/// zero delay. Returns `None` when the value is neither, so the caller keeps
/// its computed backoff.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = parse_http_date(value)?;
    Some((date - now).to_std().unwrap_or(Duration::ZERO))
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    HTTP_DATE_OBSOLETE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
