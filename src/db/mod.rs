//! Persistence seams.
//!
//! Each concern gets its own repository trait; [`Store`] bundles them so the
//! application can hold a single `Arc<dyn Store>`. Implementations run every
//! multi-statement mutation atomically.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::plan::{Plan, PlanDocument};
use crate::models::progress::{Progress, ProgressInput};
use crate::models::user::{NewUser, ProfileChanges, ProfileUpdateOutcome, User};
use crate::models::verification::{CodePurpose, VerificationCode};
use crate::models::water::{WaterIntake, WaterIntakeRecord};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A unique constraint rejected the write.
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    /// A stored document could not be (de)serialized.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, new_user: &NewUser) -> Result<User, DbError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DbError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError>;
    /// Applies `changes` and, when they move program/location/experience,
    /// deletes the user's plan in the same transaction. `None` if no such user.
    async fn update_profile(
        &self,
        user_id: i64,
        changes: &ProfileChanges,
    ) -> Result<Option<ProfileUpdateOutcome>, DbError>;
    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<(), DbError>;
    /// Replaces the avatar reference and returns the previous one.
    async fn set_avatar_url(
        &self,
        user_id: i64,
        avatar_url: Option<&str>,
    ) -> Result<Option<String>, DbError>;
    /// Deletes the user together with plan, progress and water data.
    async fn delete_user(&self, user_id: i64) -> Result<bool, DbError>;
}

#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Idempotent. Returns `true` only for the call that added the entry, so
    /// concurrent revocations of one token have a single winner.
    async fn blacklist_token(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool, DbError>;
    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, DbError>;
    /// Drops entries whose token expired before `now`. Returns the number removed.
    async fn prune_blacklist(&self, now: DateTime<Utc>) -> Result<u64, DbError>;
}

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn get_plan(&self, user_id: i64) -> Result<Option<Plan>, DbError>;
    async fn save_plan(&self, user_id: i64, document: &PlanDocument) -> Result<Plan, DbError>;
    async fn delete_plan(&self, user_id: i64) -> Result<bool, DbError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn list_progress(&self, user_id: i64) -> Result<Vec<Progress>, DbError>;
    async fn list_day_progress(&self, user_id: i64, day_index: i32) -> Result<Vec<Progress>, DbError>;
    async fn upsert_progress(&self, user_id: i64, entry: &ProgressInput) -> Result<Progress, DbError>;
    async fn clear_progress(&self, user_id: i64) -> Result<u64, DbError>;
}

#[async_trait]
pub trait WaterRepository: Send + Sync {
    /// Daily totals, newest date first.
    async fn water_history(&self, user_id: i64, limit: i64) -> Result<Vec<WaterIntake>, DbError>;
    async fn daily_water_intake(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<WaterIntake>, DbError>;
    /// Records for one day, newest timestamp first.
    async fn daily_water_records(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<WaterIntakeRecord>, DbError>;
    /// Overwrites the day's total with `total` and appends `records`
    /// (amount, timestamp) without re-summing them, atomically.
    async fn log_daily_water(
        &self,
        user_id: i64,
        date: NaiveDate,
        total: f64,
        records: &[(f64, DateTime<Utc>)],
    ) -> Result<WaterIntake, DbError>;
    /// Appends a record and adds its amount to the daily total.
    async fn add_water_record(
        &self,
        user_id: i64,
        date: NaiveDate,
        amount: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<WaterIntakeRecord, DbError>;
    /// Deletes a record and subtracts its amount from the total, floored at zero.
    async fn delete_water_record(
        &self,
        user_id: i64,
        record_id: i64,
    ) -> Result<Option<WaterIntakeRecord>, DbError>;
    /// Deletes the day's records and zeroes its total.
    async fn clear_water_day(&self, user_id: i64, date: NaiveDate) -> Result<(), DbError>;
    async fn clear_water_data(&self, user_id: i64) -> Result<(), DbError>;
}

#[async_trait]
pub trait VerificationCodeRepository: Send + Sync {
    async fn create_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<VerificationCode, DbError>;
    async fn latest_code(
        &self,
        email: &str,
        purpose: CodePurpose,
    ) -> Result<Option<VerificationCode>, DbError>;
    /// Marks an unused code as used. Returns `false` if it was already spent.
    async fn mark_code_used(&self, code_id: i64) -> Result<bool, DbError>;
}

pub trait Store:
    UserRepository
    + TokenBlacklist
    + PlanRepository
    + ProgressRepository
    + WaterRepository
    + VerificationCodeRepository
{
}

impl<T> Store for T where
    T: UserRepository
        + TokenBlacklist
        + PlanRepository
        + ProgressRepository
        + WaterRepository
        + VerificationCodeRepository
{
}
