use actix_web::{web, HttpResponse};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::db::PlanRepository;
use crate::errors::AppError;
use crate::models::plan::PlanDocument;
use crate::utils::auth::AuthenticatedUser;

// GET /plan/
pub async fn get_plan(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let plan = state.store.get_plan(auth.user.id).await?.ok_or_else(|| {
        log::info!("No plan found for user {}", auth.user.id);
        AppError::NotFound("Plan not found".to_string())
    })?;

    Ok(HttpResponse::Ok().json(plan))
}

// POST /plan/
//
// The body is parsed by hand so that broken JSON (400) and a well-formed body
// of the wrong shape (422) are told apart.
pub async fn save_plan(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let raw: Value = serde_json::from_slice(&body).map_err(|err| {
        log::warn!("Plan from user {} is not valid JSON: {}", auth.user.id, err);
        AppError::BadRequest(format!("Invalid JSON format: {}", err))
    })?;

    let document: PlanDocument = serde_json::from_value(raw).map_err(|err| {
        log::warn!("Plan from user {} has an invalid shape: {}", auth.user.id, err);
        AppError::UnprocessableEntity(format!("Invalid plan data: {}", err))
    })?;

    let plan = state.store.save_plan(auth.user.id, &document).await?;
    log::info!("Plan saved for user {} ({} days)", auth.user.id, plan.document.days.len());

    Ok(HttpResponse::Ok().json(plan))
}

// DELETE /plan/
pub async fn delete_plan(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.store.delete_plan(auth.user.id).await?;
    log::info!("Plan deleted for user {}", auth.user.id);

    Ok(HttpResponse::Ok().json(json!({ "status": "success", "message": "Plan has been deleted" })))
}
