use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use validator::Validate;

use crate::utils::validation::deserialize_datetime;

/// Stored daily total for one user and date.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct WaterIntake {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct WaterIntakeRecord {
    pub id: i64,
    #[serde(skip_serializing)]
    pub date: NaiveDate,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize, Validate, Debug, Clone)]
pub struct WaterRecordInput {
    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub amount: f64,
    #[serde(deserialize_with = "deserialize_datetime")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize, Validate, Debug, Clone)]
pub struct WaterAddRequest {
    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub amount: f64,
    pub records: Option<Vec<WaterRecordInput>>,
}

#[derive(Serialize, Debug)]
pub struct DailyWaterIntake {
    pub date: NaiveDate,
    pub total_amount: f64,
    pub records: Vec<WaterIntakeRecord>,
}

/// Daily total after removing `removed` from `total`; never below zero.
pub fn deduct(total: f64, removed: f64) -> f64 {
    (total - removed).max(0.0)
}
