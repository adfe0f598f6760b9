use actix_web::{web, HttpResponse};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::app::AppState;
use crate::db::WaterRepository;
use crate::errors::AppError;
use crate::models::water::{DailyWaterIntake, WaterAddRequest, WaterRecordInput};
use crate::utils::auth::AuthenticatedUser;
use crate::utils::validation::{parse_date, validate_payload};

const DEFAULT_HISTORY_DAYS: i64 = 30;
/// Larger limits are clamped, not rejected.
const MAX_HISTORY_DAYS: i64 = 366;

#[derive(Deserialize)]
pub struct HistoryQuery {
    limit: Option<i64>,
}

/// Water is logged against the server's local calendar day.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

// GET /water/history
pub async fn history(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_DAYS)
        .clamp(1, MAX_HISTORY_DAYS);

    Ok(HttpResponse::Ok().json(state.store.water_history(auth.user.id, limit).await?))
}

// GET /water/daily/{date}
pub async fn daily(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    date: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let date = parse_date(&date)?;

    let Some(intake) = state.store.daily_water_intake(auth.user.id, date).await? else {
        return Ok(HttpResponse::Ok().json(DailyWaterIntake {
            date,
            total_amount: 0.0,
            records: Vec::new(),
        }));
    };

    let records = state.store.daily_water_records(auth.user.id, date).await?;
    Ok(HttpResponse::Ok().json(DailyWaterIntake {
        date,
        total_amount: intake.amount,
        records,
    }))
}

// POST /water/add
//
// Sets today's total to the reported amount and keeps the detail records.
// Without explicit records, one record for the whole amount is logged.
pub async fn add_intake(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    payload: web::Json<WaterAddRequest>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*payload)?;
    if let Some(records) = &payload.records {
        for record in records {
            validate_payload(record)?;
        }
    }

    let records: Vec<(f64, DateTime<Utc>)> = match &payload.records {
        Some(records) if !records.is_empty() => {
            records.iter().map(|r| (r.amount, r.timestamp)).collect()
        }
        _ if payload.amount > 0.0 => vec![(payload.amount, Utc::now())],
        _ => Vec::new(),
    };

    let total = state
        .store
        .log_daily_water(auth.user.id, today(), payload.amount, &records)
        .await?;

    Ok(HttpResponse::Ok().json(total))
}

// POST /water/records
pub async fn add_record(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    payload: web::Json<WaterRecordInput>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&*payload)?;

    let record = state
        .store
        .add_water_record(auth.user.id, today(), payload.amount, payload.timestamp)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

// DELETE /water/records/{record_id}
pub async fn delete_record(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    record_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    state
        .store
        .delete_water_record(auth.user.id, record_id.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("Record not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Record deleted successfully" })))
}

// DELETE /water/daily/{date}
pub async fn clear_day(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
    date: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let date = parse_date(&date)?;
    state.store.clear_water_day(auth.user.id, date).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("All water intake data for {} deleted", date)
    })))
}

// DELETE /water/all
pub async fn clear_all(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.store.clear_water_data(auth.user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "All water intake data deleted" })))
}
