//! Layered service configuration.
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. `pensionserver.toml` in the working directory (or the file named by
//!    `PENSIONSERVER_CONFIG`)
//! 3. Environment variables with flat upper-case names (`DATABASE_URL`,
//!    `JWT_SECRET`, `PROCESS_COMPANY_API`, ...)
//!
//! A `.env` file is read with `dotenvy` before the environment layer is built.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE: &str = "pensionserver.toml";
pub const CONFIG_PATH_ENV: &str = "PENSIONSERVER_CONFIG";
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Environment variables read by the env layer, lower-cased.
const ENV_KEYS: &[&str] = &[
    "server_host",
    "server_port",
    "database_url",
    "db_user",
    "db_password",
    "db_host",
    "db_port",
    "db_name",
    "db_pool_size",
    "jwt_secret",
    "jwt_issuer",
    "jwt_audience",
    "jwt_expiry_minutes",
    "reset_token_expiry_minutes",
    "frontend_base_url",
    "cors_allowed_origins",
    "process_company_api",
    "reprocess_company_api",
    "extraction_timeout_secs",
    "smtp_host",
    "smtp_port",
    "smtp_user",
    "smtp_password",
    "smtp_from",
    "max_upload_bytes",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Configuration value '{field}' is missing")]
    Missing { field: String },

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,

    pub database_url: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_host: Option<String>,
    pub db_port: u16,
    pub db_name: Option<String>,
    pub db_pool_size: u32,

    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expiry_minutes: i64,
    pub reset_token_expiry_minutes: i64,

    pub frontend_base_url: String,
    /// Comma separated list of origins; `*` allows any origin.
    pub cors_allowed_origins: String,

    pub process_company_api: Option<String>,
    pub reprocess_company_api: Option<String>,
    pub extraction_timeout_secs: u64,

    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: String,

    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8000,
            database_url: None,
            db_user: None,
            db_password: None,
            db_host: None,
            db_port: 5432,
            db_name: None,
            db_pool_size: 10,
            jwt_secret: String::new(),
            jwt_issuer: "pensionserver".to_string(),
            jwt_audience: "pensionserver-api".to_string(),
            jwt_expiry_minutes: 60,
            reset_token_expiry_minutes: 15,
            frontend_base_url: "http://localhost:3000".to_string(),
            cors_allowed_origins: "http://localhost:3000".to_string(),
            process_company_api: None,
            reprocess_company_api: None,
            extraction_timeout_secs: 30,
            smtp_host: None,
            smtp_port: 587,
            smtp_user: None,
            smtp_password: None,
            smtp_from: "no-reply@localhost".to_string(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from all layers.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Same as [`AppConfig::load`] after reading `.env`.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE));
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::raw().only(ENV_KEYS))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Missing {
                field: "jwt_secret".to_string(),
            });
        }
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                field: "jwt_secret".to_string(),
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} characters"),
            });
        }
        if self.jwt_expiry_minutes <= 0 || self.reset_token_expiry_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "jwt_expiry_minutes".to_string(),
                reason: "token lifetimes must be positive".to_string(),
            });
        }
        if self.db_pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "db_pool_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.resolved_database_url()?;
        Ok(())
    }

    /// `database_url` when set, otherwise composed from the `db_*` parts.
    pub fn resolved_database_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.database_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.trim().to_string());
        }
        let part = |value: &Option<String>, field: &str| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ConfigError::Missing {
                    field: field.to_string(),
                })
        };
        let user = part(&self.db_user, "database_url or db_user")?;
        let host = part(&self.db_host, "database_url or db_host")?;
        let name = part(&self.db_name, "database_url or db_name")?;
        let password = self.db_password.clone().unwrap_or_default();
        Ok(format!(
            "postgres://{}:{}@{}:{}/{}",
            user, password, host, self.db_port, name
        ))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs.max(1))
    }

    pub fn extraction_configured(&self) -> bool {
        self.process_company_api.is_some() || self.reprocess_company_api.is_some()
    }

    pub fn smtp_configured(&self) -> bool {
        self.smtp_host.as_deref().is_some_and(|h| !h.is_empty())
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!(
            "{}/reset-password?token={}",
            self.frontend_base_url.trim_end_matches('/'),
            token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server_port, 8000);
        assert_eq!(config.jwt_expiry_minutes, 60);
        assert_eq!(config.extraction_timeout(), Duration::from_secs(30));
        assert!(!config.extraction_configured());
        assert!(!config.smtp_configured());
    }

    #[test]
    fn test_env_layer_uses_flat_names() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("JWT_SECRET", SECRET);
            jail.set_env("DATABASE_URL", "postgres://u:p@localhost/pensions");
            jail.set_env("SERVER_PORT", "9100");
            jail.set_env("PROCESS_COMPANY_API", "http://extract.local/process");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.server_port, 9100);
            assert_eq!(
                config.process_company_api.as_deref(),
                Some("http://extract.local/process")
            );
            assert!(config.extraction_configured());
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_below_env() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                CONFIG_FILE,
                r#"
server_port = 8100
frontend_base_url = "https://pensions.example.com/"
database_url = "postgres://u:p@toml-host/pensions"
"#,
            )?;
            jail.set_env("JWT_SECRET", SECRET);
            jail.set_env("SERVER_PORT", "8200");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.server_port, 8200);
            assert_eq!(
                config.reset_link("abc"),
                "https://pensions.example.com/reset-password?token=abc"
            );
            Ok(())
        });
    }

    #[test]
    fn test_database_url_composed_from_parts() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("JWT_SECRET", SECRET);
            jail.set_env("DB_USER", "pension");
            jail.set_env("DB_PASSWORD", "hunter2");
            jail.set_env("DB_HOST", "db");
            jail.set_env("DB_NAME", "registry");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(
                config.resolved_database_url().expect("url"),
                "postgres://pension:hunter2@db:5432/registry"
            );
            Ok(())
        });
    }

    #[test]
    fn test_short_secret_rejected() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("JWT_SECRET", "too-short");
            jail.set_env("DATABASE_URL", "postgres://u:p@localhost/pensions");

            let err = AppConfig::load().expect_err("short secret");
            assert!(matches!(err, ConfigError::InvalidValue { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_missing_database_rejected() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("JWT_SECRET", SECRET);
            let err = AppConfig::load().expect_err("no database");
            assert!(matches!(err, ConfigError::Missing { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_allowed_origins_split() {
        let config = AppConfig {
            cors_allowed_origins: "http://a.test, http://b.test,,".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.allowed_origins(), vec!["http://a.test", "http://b.test"]);
    }
}
