use chrono::NaiveDate;
use serde_json::Value;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d %B %Y", "%d %b %Y"];

/// Parse a date cell; a bare `YYYY-MM` resolves to the first of the month.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Timestamps such as "2023-12-31T00:00:00" keep only the date part.
    let date_part = trimmed.split(['T', ' ']).next().unwrap_or(trimmed);

    for candidate in [trimmed, date_part] {
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(candidate, format) {
                return Some(date);
            }
        }
    }

    let (year, month) = date_part.split_once('-')?;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

/// Date from a JSON string or a `{year, month, day}` object.
pub fn date_from_json(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date(s),
        Value::Object(obj) => {
            let part = |key: &str| obj.get(key).and_then(Value::as_u64);
            let year = i32::try_from(part("year")?).ok()?;
            let month = u32::try_from(part("month")?).ok()?;
            let day = part("day").and_then(|d| u32::try_from(d).ok()).unwrap_or(1);
            NaiveDate::from_ymd_opt(year, month, day)
        }
        _ => None,
    }
}
