use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::app::AppState;
use crate::db::VerificationCodeRepository;
use crate::errors::AppError;
use crate::models::verification::{CodePurpose, CODE_EXPIRATION_MINUTES};
use crate::utils::validation::validate_payload;

use super::password_reset::generate_code;

#[derive(Deserialize, Validate)]
pub struct SendCodeRequest {
    #[validate(email(message = "Invalid email format"))]
    email: String,
}

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    email: String,
    code: String,
}

// POST /verify-email/send
pub async fn send_code(
    req: web::Json<SendCodeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*req)?;

    let code = generate_code();
    state
        .store
        .create_code(&req.email, &code, CodePurpose::EmailVerification)
        .await?;

    let body = format!(
        "Your verification code: {}\nThe code is valid for {} minutes.",
        code, CODE_EXPIRATION_MINUTES
    );
    if !state.mailer.send(&req.email, "Email Verification", &body).await {
        log::error!("Failed to send verification email to {}", req.email);
        return Err(AppError::InternalServerError(
            "Failed to send verification email".to_string(),
        ));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Verification code sent" })))
}

// POST /verify-email/verify
pub async fn verify_code(
    req: web::Json<VerifyCodeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let stored = state
        .store
        .latest_code(&req.email, CodePurpose::EmailVerification)
        .await?
        .filter(|stored| stored.is_valid(&req.code, Utc::now()))
        .ok_or_else(|| AppError::BadRequest("Invalid or expired code".to_string()))?;

    if !state.store.mark_code_used(stored.id).await? {
        return Err(AppError::BadRequest("Invalid or expired code".to_string()));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Email verified successfully" })))
}
