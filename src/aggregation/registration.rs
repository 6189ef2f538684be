use crate::core::shared::enums::CompanyStatus;

/// Width of a numeric Companies House number.
pub const REGISTRATION_NUMBER_WIDTH: usize = 8;

/// Canonical form of a company registration number.
///
/// Whitespace is removed and letters upper-cased; an all-digit value is
/// left-padded with zeros to eight characters. Returns `None` for blank input.
pub fn normalize_registration_number(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();

    if compact.is_empty() {
        return None;
    }

    if compact.chars().all(|c| c.is_ascii_digit()) && compact.len() < REGISTRATION_NUMBER_WIDTH {
        return Some(format!(
            "{:0>width$}",
            compact,
            width = REGISTRATION_NUMBER_WIDTH
        ));
    }

    Some(compact)
}

pub fn normalize_optional_registration_number(raw: Option<&str>) -> Option<String> {
    raw.and_then(normalize_registration_number)
}

pub fn derive_company_status(registration_number: Option<&str>) -> CompanyStatus {
    match normalize_optional_registration_number(registration_number) {
        Some(_) => CompanyStatus::Active,
        None => CompanyStatus::Inactive,
    }
}
