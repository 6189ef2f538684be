use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Required(String),
    TooLong { field: String, max: usize, actual: usize },
    InvalidEmail(String),
    TermsNotAccepted,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required(field) => write!(f, "Field '{}' is required", field),
            Self::TooLong { field, max, actual } => {
                write!(f, "Field '{}' is too long: {} > {} chars", field, actual, max)
            }
            Self::InvalidEmail(email) => write!(f, "Invalid email address: {}", email),
            Self::TermsNotAccepted => write!(f, "Terms and conditions must be accepted"),
        }
    }
}

impl std::error::Error for ValidationError {}

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).expect("Invalid email regex")
});

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 254;

/// Trimmed value, or `Required` when blank.
pub fn validate_required<'a>(value: &'a str, field_name: &str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Required(field_name.to_string()))
    } else {
        Ok(trimmed)
    }
}

pub fn validate_max_length(value: &str, field_name: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong {
            field: field_name.to_string(),
            max,
            actual: len,
        });
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.len() > MAX_EMAIL_LEN {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }

    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

/// Lower-cased, trimmed e-mail; the form stored and looked up.
pub fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let email = validate_required(email, "email")?.to_lowercase();
    validate_email(&email)?;
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required() {
        assert_eq!(validate_required("  Ada ", "first_name"), Ok("Ada"));
        assert_eq!(
            validate_required("   ", "first_name"),
            Err(ValidationError::Required("first_name".into()))
        );
    }

    #[test]
    fn test_validate_max_length() {
        assert!(validate_max_length("abc", "name", 3).is_ok());
        assert!(validate_max_length("abcd", "name", 3).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.co.uk").is_ok());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("user@localhost").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Jane@Example.COM ").unwrap(), "jane@example.com");
        assert!(normalize_email("").is_err());
    }
}
