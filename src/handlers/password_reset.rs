use actix_web::{web, HttpResponse};
use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::app::AppState;
use crate::db::{UserRepository, VerificationCodeRepository};
use crate::errors::AppError;
use crate::models::verification::{CodePurpose, VerificationCode, CODE_EXPIRATION_MINUTES};
use crate::utils::password::hash_password;
use crate::utils::validation::validate_payload;

#[derive(Deserialize)]
pub struct ForgotForm {
    email: String,
}

#[derive(Deserialize)]
pub struct VerifyForm {
    email: String,
    code: String,
}

#[derive(Deserialize, Validate)]
pub struct ResetForm {
    email: String,
    code: String,

    #[validate(length(min = 6, max = 128, message = "Password must be between 6 and 128 characters"))]
    new_password: String,
}

pub(crate) fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Returns the newest reset code for `email` if it matches `code` and is
/// still usable.
async fn check_code(state: &AppState, email: &str, code: &str) -> Result<VerificationCode, AppError> {
    state
        .store
        .latest_code(email, CodePurpose::PasswordReset)
        .await?
        .filter(|stored| stored.is_valid(code, Utc::now()))
        .ok_or_else(|| AppError::BadRequest("Invalid code".to_string()))
}

// POST /password/forgot
pub async fn forgot_password(
    form: web::Form<ForgotForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if state.store.find_user_by_email(&form.email).await?.is_none() {
        return Err(AppError::NotFound("The user was not found".to_string()));
    }

    let code = generate_code();
    state
        .store
        .create_code(&form.email, &code, CodePurpose::PasswordReset)
        .await?;

    let body = format!(
        "Your password recovery code: {}\nThe code is valid for {} minutes.",
        code, CODE_EXPIRATION_MINUTES
    );
    if !state.mailer.send(&form.email, "Password Recovery", &body).await {
        log::error!("Failed to send password recovery code to {}", form.email);
        return Err(AppError::InternalServerError("Failed to send the code".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "The code has been sent" })))
}

// POST /password/verify
pub async fn verify_reset_code(
    form: web::Form<VerifyForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    check_code(&state, &form.email, &form.code).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "The code is confirmed" })))
}

// POST /password/reset
pub async fn reset_password(
    form: web::Form<ResetForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*form)?;
    let form = form.into_inner();

    let stored = check_code(&state, &form.email, &form.code).await?;
    let user = state
        .store
        .find_user_by_email(&form.email)
        .await?
        .ok_or_else(|| AppError::NotFound("The user was not found".to_string()))?;

    let password_hash = hash_password(form.new_password, state.config.bcrypt_cost).await?;

    // Claim first: of two requests racing on one code, only one gets past here.
    if !state.store.mark_code_used(stored.id).await? {
        return Err(AppError::BadRequest("Invalid code".to_string()));
    }
    state.store.update_password(user.id, &password_hash).await?;

    log::info!("User {} reset their password", user.id);
    Ok(HttpResponse::Ok().json(json!({ "message": "The password has been changed" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
