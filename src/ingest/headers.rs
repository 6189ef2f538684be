/// Lower-case a header and turn every run of non-alphanumerics into one `_`.
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().trim_start_matches('\u{feff}').chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

pub const COMPANY_NAME: &[&str] = &["company_name", "company", "name"];
pub const REGISTRATION_NUMBER: &[&str] = &[
    "registration_number",
    "company_number",
    "company_registered_number",
    "registered_number",
    "reg_no",
];
pub const ADDRESS1: &[&str] = &["address1", "address_1", "address_line_1"];
pub const ADDRESS2: &[&str] = &["address2", "address_2", "address_line_2"];
pub const ADDRESS3: &[&str] = &["address3", "address_3", "address_line_3"];
pub const CITY: &[&str] = &["city", "town"];
pub const COUNTY: &[&str] = &["county"];
pub const POSTCODE: &[&str] = &["postcode", "post_code"];
pub const TYPE_OF_SCHEME: &[&str] = &["type_of_scheme"];

/// Column positions keyed by normalized header.
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    headers: Vec<String>,
}

impl HeaderIndex {
    pub fn new<'a>(raw: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            headers: raw.into_iter().map(normalize_header).collect(),
        }
    }

    /// First column whose header matches one of `aliases`, in alias order.
    pub fn find(&self, aliases: &[&str]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.headers.iter().position(|h| h == alias))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Company Name"), "company_name");
        assert_eq!(normalize_header("\u{feff}Reg. No"), "reg_no");
        assert_eq!(normalize_header("  Address Line 1 "), "address_line_1");
        assert_eq!(normalize_header("Turnover (FY22/23)"), "turnover_fy22_23");
    }

    #[test]
    fn test_alias_priority() {
        let index = HeaderIndex::new(["Name", "Company Name", "Company Number"]);
        assert_eq!(index.find(COMPANY_NAME), Some(1));
        assert_eq!(index.find(REGISTRATION_NUMBER), Some(2));
        assert_eq!(index.find(POSTCODE), None);
    }
}
