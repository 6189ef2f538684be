//! Signup, sign-in and password reset.

use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::shared::error::{ApiError, ApiJson, ApiResult};
use crate::core::shared::models::{users, NewUser, User};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::email::password_reset_email;
use crate::security::password::PasswordHasher2;
use crate::security::validation::{
    normalize_email, validate_max_length, validate_required, ValidationError, MAX_NAME_LEN,
};

pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const INVALID_RESET_TOKEN: &str = "Token is invalid or expired";

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub terms_accepted: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserResponse {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub msg: String,
}

/// Checked signup input with the e-mail lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

pub fn validate_signup(
    req: &SignupRequest,
    hasher: &PasswordHasher2,
) -> Result<ValidSignup, ApiError> {
    let first_name = validate_required(&req.first_name, "first_name")?;
    validate_max_length(first_name, "first_name", MAX_NAME_LEN)?;
    let last_name = validate_required(&req.last_name, "last_name")?;
    validate_max_length(last_name, "last_name", MAX_NAME_LEN)?;
    let email = normalize_email(&req.email)?;
    if !req.terms_accepted {
        return Err(ValidationError::TermsNotAccepted.into());
    }
    hasher.check_policy(&req.password).map_err(ApiError::BadRequest)?;

    Ok(ValidSignup {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email,
    })
}

async fn hash_password(hasher: Arc<PasswordHasher2>, password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hash task failed: {e}")))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn verify_password(
    hasher: Arc<PasswordHasher2>,
    password: String,
    hash: String,
) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("verify task failed: {e}")))?
        .or_else(|e| {
            warn!("Stored password hash could not be parsed: {}", e);
            Ok(false)
        })
}

fn find_user(conn: &mut PgConnection, email: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::email.eq(email))
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<Json<UserResponse>> {
    let valid = validate_signup(&req, &state.password_hasher)?;

    {
        let mut conn = state.conn.get()?;
        if find_user(&mut conn, &valid.email)?.is_some() {
            return Err(ApiError::bad_request("Email already registered"));
        }
    }

    let password = hash_password(Arc::clone(&state.password_hasher), req.password).await?;

    let mut conn = state.conn.get()?;
    let user: User = diesel::insert_into(users::table)
        .values(&NewUser {
            first_name: valid.first_name,
            last_name: valid.last_name,
            email: valid.email,
            password,
            terms_accepted: true,
        })
        .returning(User::as_returning())
        .get_result(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => ApiError::bad_request("Email already registered"),
            other => other.into(),
        })?;

    info!("User {} signed up", user.id);
    Ok(Json(user.into()))
}

pub async fn signin(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SigninRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let invalid = || ApiError::Unauthorized(INVALID_CREDENTIALS.to_string());
    let email = normalize_email(&req.email).map_err(|_| invalid())?;

    let user = {
        let mut conn = state.conn.get()?;
        find_user(&mut conn, &email)?.ok_or_else(invalid)?
    };

    let matches = verify_password(
        Arc::clone(&state.password_hasher),
        req.password,
        user.password.clone(),
    )
    .await?;
    if !matches {
        return Err(invalid());
    }

    let access_token = state
        .jwt_manager
        .generate_access_token(&user.email)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!("User {} signed in", user.id);
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        user: user.into(),
    }))
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let email = normalize_email(&req.email)?;

    let user = {
        let mut conn = state.conn.get()?;
        find_user(&mut conn, &email)?.ok_or_else(|| ApiError::not_found("User not found"))?
    };

    let token = state
        .jwt_manager
        .generate_reset_token(&user.email)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let message = password_reset_email(&state.config, &user.email, &token);
    state.mailer.send(message).await.map_err(|e| {
        error!("Password reset email to user {} failed: {}", user.id, e);
        ApiError::ServiceUnavailable("Could not send the password reset email".to_string())
    })?;

    Ok(Json(MessageResponse {
        msg: "Password reset link sent to your email".to_string(),
    }))
}

/// A reset token is spent once the password changed in or after the second
/// it was issued.
pub fn reset_token_is_current(issued_at: i64, password_updated_at: Option<DateTime<Utc>>) -> bool {
    password_updated_at.map_or(true, |changed| issued_at > changed.timestamp())
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let claims = state
        .jwt_manager
        .validate_reset_token(req.token.trim())
        .map_err(|_| ApiError::bad_request(INVALID_RESET_TOKEN))?;

    state
        .password_hasher
        .check_policy(&req.new_password)
        .map_err(ApiError::BadRequest)?;

    let user = {
        let mut conn = state.conn.get()?;
        find_user(&mut conn, claims.email())?.ok_or_else(|| ApiError::not_found("User not found"))?
    };
    let issued_at = DateTime::<Utc>::from_timestamp(claims.iat, 0)
        .filter(|_| reset_token_is_current(claims.iat, user.password_updated_at))
        .ok_or_else(|| ApiError::bad_request(INVALID_RESET_TOKEN))?;

    let password = hash_password(Arc::clone(&state.password_hasher), req.new_password).await?;

    let mut conn = state.conn.get()?;
    // At most one use of a token passes this filter.
    let updated = diesel::update(
        users::table.find(user.id).filter(
            users::password_updated_at
                .is_null()
                .or(users::password_updated_at.lt(issued_at)),
        ),
    )
    .set((
        users::password.eq(password),
        users::password_updated_at.eq(Utc::now()),
    ))
    .execute(&mut conn)?;
    if updated == 0 {
        return Err(ApiError::bad_request(INVALID_RESET_TOKEN));
    }

    info!("Password reset for user {}", user.id);
    Ok(Json(MessageResponse {
        msg: "Password has been reset successfully".to_string(),
    }))
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::SIGNUP, post(signup))
        .route(ApiUrls::SIGNIN, post(signin))
        .route(ApiUrls::LOGIN, post(signin))
        .route(ApiUrls::FORGOT_PASSWORD, post(forgot_password))
        .route(ApiUrls::RESET_PASSWORD, post(reset_password))
}
