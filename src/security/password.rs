use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tracing::debug;

/// Signup and reset password policy.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub max_length: usize,
    pub require_letter: bool,
    pub require_digit: bool,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_letter: true,
            require_digit: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Argon2Config {
    pub memory_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub output_length: usize,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost_kib: 19456,
            time_cost: 2,
            parallelism: 1,
            output_length: 32,
        }
    }
}

impl Argon2Config {
    /// Cheap parameters for tests.
    pub fn low_memory() -> Self {
        Self {
            memory_cost_kib: 8192,
            time_cost: 1,
            parallelism: 1,
            output_length: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordIssue {
    TooShort { min: usize, actual: usize },
    TooLong { max: usize, actual: usize },
    MissingLetter,
    MissingDigit,
}

impl PasswordIssue {
    pub fn message(&self) -> String {
        match self {
            Self::TooShort { min, .. } => format!("Password must be at least {min} characters"),
            Self::TooLong { max, .. } => format!("Password must be at most {max} characters"),
            Self::MissingLetter => "Password must contain at least one letter".into(),
            Self::MissingDigit => "Password must contain at least one digit".into(),
        }
    }
}

pub struct PasswordHasher2 {
    argon2: Argon2<'static>,
    config: PasswordConfig,
}

impl std::fmt::Debug for PasswordHasher2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher2")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PasswordHasher2 {
    pub fn new(argon2_config: Argon2Config, password_config: PasswordConfig) -> Result<Self> {
        let params = Params::new(
            argon2_config.memory_cost_kib,
            argon2_config.time_cost,
            argon2_config.parallelism,
            Some(argon2_config.output_length),
        )
        .map_err(|e| anyhow!("Invalid Argon2 parameters: {e}"))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        Ok(Self {
            argon2,
            config: password_config,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(Argon2Config::default(), PasswordConfig::default())
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {e}"))?;

        Ok(hash.to_string())
    }

    /// `Ok(false)` on a mismatch; `Err` only for a malformed stored hash.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {e}"))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => {
                debug!("Password mismatch");
                Ok(false)
            }
            Err(e) => Err(anyhow!("Password verification failed: {e}")),
        }
    }

    pub fn validate(&self, password: &str) -> Vec<PasswordIssue> {
        let mut issues = Vec::new();
        let length = password.chars().count();

        if length < self.config.min_length {
            issues.push(PasswordIssue::TooShort {
                min: self.config.min_length,
                actual: length,
            });
        }
        if length > self.config.max_length {
            issues.push(PasswordIssue::TooLong {
                max: self.config.max_length,
                actual: length,
            });
        }
        if self.config.require_letter && !password.chars().any(char::is_alphabetic) {
            issues.push(PasswordIssue::MissingLetter);
        }
        if self.config.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            issues.push(PasswordIssue::MissingDigit);
        }
        issues
    }

    /// First policy violation as a user-facing message.
    pub fn check_policy(&self, password: &str) -> std::result::Result<(), String> {
        match self.validate(password).first() {
            Some(issue) => Err(issue.message()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher2 {
        PasswordHasher2::new(Argon2Config::low_memory(), PasswordConfig::default())
            .expect("hasher")
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("correct horse 42").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse 42", &hash).expect("verify"));
        assert!(!hasher.verify("wrong horse 42", &hash).expect("verify"));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = hasher();
        let a = hasher.hash("Password1").unwrap();
        let b = hasher.hash("Password1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(hasher().verify("Password1", "not-a-hash").is_err());
    }

    #[test]
    fn test_policy() {
        let hasher = hasher();
        assert!(hasher.validate("abcdefg1").is_empty());
        assert_eq!(
            hasher.validate("abc1"),
            vec![PasswordIssue::TooShort { min: 8, actual: 4 }]
        );
        assert_eq!(hasher.validate("12345678"), vec![PasswordIssue::MissingLetter]);
        assert_eq!(hasher.validate("abcdefgh"), vec![PasswordIssue::MissingDigit]);
        assert!(hasher.check_policy(&"a1".repeat(65)).is_err());
    }
}
