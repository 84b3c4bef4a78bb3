//! Date helper functions

use chrono::{DateTime, FixedOffset, Locale, NaiveDate};

use crate::error::{BlogError, Result};

/// Day, abbreviated month name and four-digit year
const DISPLAY_FORMAT: &str = "%d %b %Y";

/// Parse a timestamp as sent by the content API
///
/// Accepts RFC 3339 (`2021-03-15T00:00:00Z`), the API's compact offset
/// form (`2021-03-15T19:25:28+0000`) and a bare `YYYY-MM-DD`, read as UTC
/// midnight.
pub fn parse_date(input: &str) -> Result<DateTime<FixedOffset>> {
    let input = input.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Ok(date);
    }
    if let Ok(date) = DateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(date);
    }
    if let Ok(day) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().fixed_offset());
        }
    }

    Err(BlogError::InvalidDate(input.to_string()))
}

/// Region picked for a tag that names only a language
const DEFAULT_REGIONS: &[(&str, &str)] = &[
    ("de", "de_DE"),
    ("en", "en_US"),
    ("es", "es_ES"),
    ("fr", "fr_FR"),
    ("it", "it_IT"),
    ("pt", "pt_BR"),
];

/// Resolve a locale tag such as `pt-BR`, `pt_BR` or a bare `pt`
pub fn locale(tag: &str) -> Result<Locale> {
    let normalized = tag.trim().replace('-', "_");
    let name = DEFAULT_REGIONS
        .iter()
        .find(|(language, _)| language.eq_ignore_ascii_case(&normalized))
        .map(|(_, region)| region.to_string())
        .unwrap_or(normalized);
    Locale::try_from(name.as_str()).map_err(|_| BlogError::UnknownLocale(tag.to_string()))
}

/// Render an ISO date as "dd <month> yyyy" in the given locale
///
/// # Examples
/// ```ignore
/// format_date("2021-03-15T00:00:00Z", "pt-BR") // -> "15 mar 2021"
/// ```
pub fn format_date(input: &str, locale_tag: &str) -> Result<String> {
    let date = parse_date(input)?;
    let locale = locale(locale_tag)?;
    Ok(date.format_localized(DISPLAY_FORMAT, locale).to_string())
}

/// Whole hours in a number of minutes, rounded down
pub fn minutes_to_hours(minutes: u64) -> u64 {
    minutes / 60
}
