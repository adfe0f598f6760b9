use actix_web::{web, HttpResponse};
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::app::AppState;
use crate::db::UserRepository;
use crate::errors::AppError;
use crate::models::user::NewUser;
use crate::utils::auth::AuthenticatedUser;
use crate::utils::jwt::TokenKind;
use crate::utils::password::{authenticate, hash_password};
use crate::utils::validation::{validate_payload, USERNAME_RE};

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(regex(
        path = "USERNAME_RE",
        message = "Username must be 3-32 letters, digits, '.', '_' or '-'"
    ))]
    username: String,

    #[validate(email(message = "Invalid email format"))]
    email: String,

    #[validate(length(min = 6, max = 128, message = "Password must be between 6 and 128 characters"))]
    password: String,

    #[validate(length(min = 1, max = 60, message = "First name must be between 1 and 60 characters"))]
    first_name: String,

    #[validate(length(min = 1, max = 60, message = "Last name must be between 1 and 60 characters"))]
    last_name: String,

    gender: bool,
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    refresh_token: String,
}

#[derive(Deserialize)]
pub struct UsernameQuery {
    username: String,
}

#[derive(Deserialize)]
pub struct EmailQuery {
    email: String,
}

// POST /auth/register
pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*req)?;

    if state.store.find_user_by_username(&req.username).await?.is_some() {
        return Err(AppError::Conflict("Username already registered".to_string()));
    }
    if state.store.find_user_by_email(&req.email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let req = req.into_inner();
    let password_hash = hash_password(req.password, state.config.bcrypt_cost).await?;

    // The unique constraints still catch a concurrent registration that slips
    // past the checks above.
    let user = state
        .store
        .create_user(&NewUser {
            username: req.username,
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            gender: req.gender,
        })
        .await?;

    log::info!("User {} registered", user.username);
    Ok(HttpResponse::Created().json(user))
}

// GET /auth/check-username
pub async fn check_username(
    query: web::Query<UsernameQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if state.store.find_user_by_username(&query.username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "available": true })))
}

// GET /auth/check-email
pub async fn check_email(
    query: web::Query<EmailQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if state.store.find_user_by_email(&query.email).await?.is_some() {
        return Err(AppError::Conflict("Email already taken".to_string()));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "available": true })))
}

// POST /auth/token
pub async fn login(
    form: web::Form<LoginForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(user) = authenticate(state.store.as_ref(), &form.username, &form.password).await? else {
        log::warn!("Failed login attempt: {}", form.username);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    };

    log::info!("User {} logged in", user.username);
    Ok(HttpResponse::Ok().json(state.tokens.issue_pair(&user.username)?))
}

// POST /auth/refresh
pub async fn refresh(
    req: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let claims = state.tokens.validate_token(&req.refresh_token, TokenKind::Refresh)?;

    if state.revocations.is_revoked(&req.refresh_token).await? {
        return Err(AppError::Unauthorized("Token has been revoked".to_string()));
    }

    let user = state
        .store
        .find_user_by_username(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    // Rotate: only the request that revokes the presented token gets a new pair.
    if !state
        .revocations
        .revoke(&req.refresh_token, expiry_of(claims.exp))
        .await?
    {
        return Err(AppError::Unauthorized("Token has been revoked".to_string()));
    }

    Ok(HttpResponse::Ok().json(state.tokens.issue_pair(&user.username)?))
}

// POST /auth/logout
pub async fn logout(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let claims = state.tokens.validate_token(&auth.token, TokenKind::Access)?;
    state.revocations.revoke(&auth.token, expiry_of(claims.exp)).await?;

    let prefix: String = auth.token.chars().take(10).collect();
    log::info!("Token blacklisted: {}...", prefix);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "You have been logged out" })))
}

fn expiry_of(exp: usize) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(exp as i64, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
