use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use serde_json::Value;
use std::str::FromStr;

const BLANK_MARKERS: &[&str] = &["", "-", "--", "n/a", "na", "null", "none", "nil"];

/// Amounts are stored as NUMERIC(20, 1): at most 19 integer digits.
const MAX_ABS_AMOUNT: f64 = 1e19;

/// Half-up rounding to one decimal place, done in decimal so `1.15` becomes
/// `1.2`. `None` for values that do not fit the column.
fn rounded_decimal(value: f64) -> Option<BigDecimal> {
    if !value.is_finite() || value.abs() >= MAX_ABS_AMOUNT {
        return None;
    }
    // `Display` gives the shortest representation that round-trips.
    let decimal = BigDecimal::from_str(&value.to_string()).ok()?;
    Some(decimal.with_scale_round(1, RoundingMode::HalfUp))
}

/// Round to the single decimal place stored in the database.
pub fn round_amount(value: f64) -> Option<f64> {
    rounded_decimal(value)?.to_f64()
}

/// Parse a money cell such as `1,234.5`, `£1,234` or `(12.3)`.
pub fn parse_amount(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if BLANK_MARKERS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return None;
    }

    let (negative, body) = match trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | '£' | '$' | '€' | ' ' | '\u{a0}'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    round_amount(if negative { -value.abs() } else { value })
}

/// Amount carried in a JSON value; numbers and numeric strings are accepted.
pub fn amount_from_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(round_amount),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

pub fn amount_to_decimal(value: f64) -> Option<BigDecimal> {
    rounded_decimal(value)
}

pub fn decimal_to_amount(value: &BigDecimal) -> Option<f64> {
    value.to_f64()
}
