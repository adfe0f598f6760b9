use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::app::AppState;
use crate::db::UserRepository;
use crate::errors::AppError;
use crate::models::user::{ProfileChanges, ProfileUpdateOutcome};
use crate::utils::auth::AuthenticatedUser;
use crate::utils::password::{hash_password, verify_password};
use crate::utils::validation::validate_payload;

use super::file::remove_avatar_file;

#[derive(Deserialize, Validate, Clone)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 60, message = "First name must be between 1 and 60 characters"))]
    first_name: Option<String>,

    #[validate(length(min = 1, max = 60, message = "Last name must be between 1 and 60 characters"))]
    last_name: Option<String>,

    gender: Option<bool>,

    #[validate(range(min = 10, max = 1000, message = "Weight must be between 10 and 1000"))]
    weight: Option<f64>,

    #[validate(range(min = 3, max = 250, message = "Height must be between 3 and 250"))]
    height: Option<f64>,

    #[validate(range(min = 1, max = 150, message = "Age must be between 1 and 150"))]
    age: Option<i32>,

    #[validate(length(min = 1, max = 64, message = "Training program must be between 1 and 64 characters"))]
    training_program: Option<String>,

    #[validate(length(min = 1, max = 64, message = "Training location must be between 1 and 64 characters"))]
    training_location: Option<String>,

    #[validate(length(min = 1, max = 64, message = "Training experience must be between 1 and 64 characters"))]
    training_experience: Option<String>,
}

impl From<ProfileUpdate> for ProfileChanges {
    fn from(update: ProfileUpdate) -> Self {
        ProfileChanges {
            first_name: update.first_name,
            last_name: update.last_name,
            gender: update.gender,
            weight: update.weight,
            height: update.height,
            age: update.age,
            training_program: update.training_program,
            training_location: update.training_location,
            training_experience: update.training_experience,
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct TrainingProgramUpdate {
    #[validate(length(min = 1, max = 64, message = "Training program must be between 1 and 64 characters"))]
    training_program: String,
}

#[derive(Deserialize, Validate)]
pub struct TrainingLocationUpdate {
    #[validate(length(min = 1, max = 64, message = "Training location must be between 1 and 64 characters"))]
    training_location: String,
}

#[derive(Deserialize, Validate)]
pub struct TrainingExperienceUpdate {
    #[validate(length(min = 1, max = 64, message = "Training experience must be between 1 and 64 characters"))]
    training_experience: String,
}

#[derive(Deserialize, Validate)]
pub struct ChangePasswordRequest {
    old_password: String,

    #[validate(length(min = 6, max = 128, message = "Password must be between 6 and 128 characters"))]
    new_password: String,
}

/// Applies `changes` through the store, which drops the plan when the
/// training fields move.
async fn apply_changes(
    state: &AppState,
    user_id: i64,
    changes: ProfileChanges,
) -> Result<ProfileUpdateOutcome, AppError> {
    let outcome = state
        .store
        .update_profile(user_id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("The user was not found".to_string()))?;

    if outcome.plan_reset {
        log::info!("User {}: resetting workout plan due to profile changes", user_id);
    }
    Ok(outcome)
}

// GET /users/me
pub async fn get_profile(auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(auth.user))
}

// GET /users/profile-status
pub async fn profile_status(auth: AuthenticatedUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(json!({ "profile_completed": auth.user.profile_completed() })))
}

// POST /users/update-profile
pub async fn update_profile(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    updates: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*updates)?;

    let outcome = apply_changes(&state, auth.user.id, updates.into_inner().into()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile has been successfully updated",
        "user": outcome.user,
        "plan_reset": outcome.plan_reset,
    })))
}

// POST /users/set-program
pub async fn set_program(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    payload: web::Json<TrainingProgramUpdate>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*payload)?;

    let changes = ProfileChanges {
        training_program: Some(payload.into_inner().training_program),
        ..Default::default()
    };
    let outcome = apply_changes(&state, auth.user.id, changes).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "The training program has been updated",
        "training_program": outcome.user.training_program,
        "plan_reset": outcome.plan_reset,
    })))
}

// POST /users/set-location
pub async fn set_location(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    payload: web::Json<TrainingLocationUpdate>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*payload)?;

    let changes = ProfileChanges {
        training_location: Some(payload.into_inner().training_location),
        ..Default::default()
    };
    let outcome = apply_changes(&state, auth.user.id, changes).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "The training location has been updated",
        "training_location": outcome.user.training_location,
        "plan_reset": outcome.plan_reset,
    })))
}

// POST /users/set-experience
pub async fn set_experience(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    payload: web::Json<TrainingExperienceUpdate>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*payload)?;

    let changes = ProfileChanges {
        training_experience: Some(payload.into_inner().training_experience),
        ..Default::default()
    };
    let outcome = apply_changes(&state, auth.user.id, changes).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "The training level has been updated",
        "training_experience": outcome.user.training_experience,
        "plan_reset": outcome.plan_reset,
    })))
}

// POST /users/change-password
pub async fn change_password(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    payload: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*payload)?;
    let payload = payload.into_inner();

    if !verify_password(payload.old_password, auth.user.password_hash.clone()).await? {
        return Err(AppError::BadRequest("Incorrect old password".to_string()));
    }

    let password_hash = hash_password(payload.new_password, state.config.bcrypt_cost).await?;
    state.store.update_password(auth.user.id, &password_hash).await?;

    log::info!("User {} changed password", auth.user.id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Password updated successfully" })))
}

// DELETE /users/delete-account
pub async fn delete_account(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !state.store.delete_user(auth.user.id).await? {
        return Err(AppError::NotFound("The user was not found".to_string()));
    }

    if let Some(avatar_url) = &auth.user.avatar_url {
        remove_avatar_file(&state.config, avatar_url).await;
    }

    log::info!("User {} deleted their account", auth.user.id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Account successfully deleted" })))
}
