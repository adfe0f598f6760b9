use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct Progress {
    pub day_index: i32,
    pub exercise_id: String,
    pub sets_completed: i32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Deserialize, Validate, Debug, Clone)]
pub struct ProgressInput {
    #[validate(range(min = 0, message = "day_index cannot be negative"))]
    pub day_index: i32,

    #[validate(length(min = 1, max = 128, message = "exercise_id must be between 1 and 128 characters"))]
    pub exercise_id: String,

    #[validate(range(min = 0, message = "sets_completed cannot be negative"))]
    pub sets_completed: i32,
}
