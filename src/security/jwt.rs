use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::core::config::{AppConfig, MIN_JWT_SECRET_LEN};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_token_expiry_minutes: i64,
    pub reset_token_expiry_minutes: i64,
    pub leeway_seconds: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "pensionserver".into(),
            audience: "pensionserver-api".into(),
            access_token_expiry_minutes: 60,
            reset_token_expiry_minutes: 15,
            leeway_seconds: 30,
        }
    }
}

impl From<&AppConfig> for JwtConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            access_token_expiry_minutes: config.jwt_expiry_minutes,
            reset_token_expiry_minutes: config.reset_token_expiry_minutes,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    Access,
    Reset,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account e-mail.
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: String,
}

impl Claims {
    pub fn new(
        email: &str,
        issuer: &str,
        audience: &str,
        token_type: TokenType,
        expiry: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: email.to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            exp: expiry.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: token_type.as_str().to_string(),
        }
    }

    pub fn email(&self) -> &str {
        &self.sub
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    pub fn is_access_token(&self) -> bool {
        self.token_type == TokenType::Access.as_str()
    }

    pub fn is_reset_token(&self) -> bool {
        self.token_type == TokenType::Reset.as_str()
    }
}

pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(config: JwtConfig, secret: &str) -> Result<Self> {
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(anyhow!(
                "JWT secret must be at least {MIN_JWT_SECRET_LEN} characters"
            ));
        }
        Ok(Self {
            config,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        Self::new(JwtConfig::from(config), &config.jwt_secret)
    }

    fn issue(&self, email: &str, token_type: TokenType, minutes: i64) -> Result<String> {
        let expiry = Utc::now() + Duration::minutes(minutes);
        let claims = Claims::new(
            email,
            &self.config.issuer,
            &self.config.audience,
            token_type,
            expiry,
        );
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to encode {} token: {e}", token_type.as_str()))
    }

    pub fn generate_access_token(&self, email: &str) -> Result<String> {
        self.issue(email, TokenType::Access, self.config.access_token_expiry_minutes)
    }

    pub fn generate_reset_token(&self, email: &str) -> Result<String> {
        self.issue(email, TokenType::Reset, self.config.reset_token_expiry_minutes)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.validate_nbf = true;
        validation.leeway = self.config.leeway_seconds;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow!("Token validation failed: {e}"))
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let claims = self.validate_token(token)?;
        if !claims.is_access_token() {
            debug!("Rejected {} token used for API access", claims.token_type);
            return Err(anyhow!("Token is not an access token"));
        }
        Ok(claims)
    }

    pub fn validate_reset_token(&self, token: &str) -> Result<Claims> {
        let claims = self.validate_token(token)?;
        if !claims.is_reset_token() {
            debug!("Rejected {} token used for password reset", claims.token_type);
            return Err(anyhow!("Token is not a password reset token"));
        }
        Ok(claims)
    }
}

pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
