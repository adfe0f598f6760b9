use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::app::AppState;
use crate::db::ProgressRepository;
use crate::errors::AppError;
use crate::models::progress::ProgressInput;
use crate::utils::auth::AuthenticatedUser;
use crate::utils::validation::validate_payload;

// GET /progress/
pub async fn list_progress(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.store.list_progress(auth.user.id).await?))
}

// GET /progress/{day_index}
pub async fn day_progress(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    day_index: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let entries = state
        .store
        .list_day_progress(auth.user.id, day_index.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(entries))
}

// POST /progress/
pub async fn upsert_progress(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    payload: web::Json<ProgressInput>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*payload)?;
    let entry = state.store.upsert_progress(auth.user.id, &payload).await?;
    Ok(HttpResponse::Ok().json(entry))
}

// DELETE /progress/
pub async fn clear_progress(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let removed = state.store.clear_progress(auth.user.id).await?;
    log::info!("Cleared {} progress entries for user {}", removed, auth.user.id);

    Ok(HttpResponse::Ok().json(json!({ "status": "success", "message": "All progress has been deleted" })))
}
