use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;

use super::{
    DbError, PlanRepository, ProgressRepository, TokenBlacklist, UserRepository,
    VerificationCodeRepository, WaterRepository,
};
use crate::models::plan::{Plan, PlanDay, PlanDocument};
use crate::models::progress::{Progress, ProgressInput};
use crate::models::user::{NewUser, ProfileChanges, ProfileUpdateOutcome, User};
use crate::models::verification::{CodePurpose, VerificationCode};
use crate::models::water::{deduct, WaterIntake, WaterIntakeRecord};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }
}

fn unique_violation(err: sqlx::Error, message: &str) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::Conflict(message.to_string())
        }
        _ => DbError::Sqlx(err),
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, DbError> {
    Ok(serde_json::from_str(raw)?)
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, DbError> {
    Ok(serde_json::to_string(value)?)
}

#[derive(sqlx::FromRow)]
struct PlanRow {
    user_id: i64,
    start_date: DateTime<Utc>,
    days: String,
    extra: String,
    updated_at: DateTime<Utc>,
}

impl PlanRow {
    fn into_plan(self) -> Result<Plan, DbError> {
        let days: Vec<PlanDay> = decode_json(&self.days)?;
        let extra: Map<String, Value> = decode_json(&self.extra)?;
        Ok(Plan {
            user_id: self.user_id,
            document: PlanDocument {
                start_date: self.start_date,
                days,
                extra,
            },
            updated_at: self.updated_at,
        })
    }
}

// JSON columns are read as text so the stored key order is kept verbatim.
const PLAN_COLUMNS: &str =
    "user_id, start_date, days::text AS days, extra::text AS extra, updated_at";

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, new_user: &NewUser) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash, first_name, last_name, gender)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.gender)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Username or email already registered"))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_profile(
        &self,
        user_id: i64,
        changes: &ProfileChanges,
    ) -> Result<Option<ProfileUpdateOutcome>, DbError> {
        let mut tx = self.pool.begin().await?;

        let Some(mut user) =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(None);
        };

        let plan_reset = changes.invalidates_plan(&user);
        if plan_reset {
            sqlx::query("DELETE FROM training_plans WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        changes.apply_to(&mut user);
        sqlx::query(
            "UPDATE users SET first_name = $1, last_name = $2, gender = $3, weight = $4,
                height = $5, age = $6, training_program = $7, training_location = $8,
                training_experience = $9
             WHERE id = $10",
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.gender)
        .bind(user.weight)
        .bind(user.height)
        .bind(user.age)
        .bind(&user.training_program)
        .bind(&user.training_location)
        .bind(&user.training_experience)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(ProfileUpdateOutcome { user, plan_reset }))
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_avatar_url(
        &self,
        user_id: i64,
        avatar_url: Option<&str>,
    ) -> Result<Option<String>, DbError> {
        let mut tx = self.pool.begin().await?;
        let previous: Option<Option<String>> =
            sqlx::query_scalar("SELECT avatar_url FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        sqlx::query("UPDATE users SET avatar_url = $1 WHERE id = $2")
            .bind(avatar_url)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(previous.flatten())
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, DbError> {
        // Plan, progress and water rows go with the user via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TokenBlacklist for PgStore {
    async fn blacklist_token(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool, DbError> {
        let result = sqlx::query(
            "INSERT INTO blacklisted_tokens (token, expires_at) VALUES ($1, $2)
             ON CONFLICT (token) DO NOTHING",
        )
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, DbError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM blacklisted_tokens WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn prune_blacklist(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM blacklisted_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PlanRepository for PgStore {
    async fn get_plan(&self, user_id: i64) -> Result<Option<Plan>, DbError> {
        let row = sqlx::query_as::<_, PlanRow>(&format!(
            "SELECT {} FROM training_plans WHERE user_id = $1",
            PLAN_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PlanRow::into_plan).transpose()
    }

    async fn save_plan(&self, user_id: i64, document: &PlanDocument) -> Result<Plan, DbError> {
        let row = sqlx::query_as::<_, PlanRow>(&format!(
            "INSERT INTO training_plans (user_id, start_date, days, extra)
             VALUES ($1, $2, $3::json, $4::json)
             ON CONFLICT (user_id) DO UPDATE
                SET start_date = EXCLUDED.start_date,
                    days = EXCLUDED.days,
                    extra = EXCLUDED.extra,
                    updated_at = NOW()
             RETURNING {}",
            PLAN_COLUMNS
        ))
        .bind(user_id)
        .bind(document.start_date)
        .bind(encode_json(&document.days)?)
        .bind(encode_json(&document.extra)?)
        .fetch_one(&self.pool)
        .await?;
        row.into_plan()
    }

    async fn delete_plan(&self, user_id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM training_plans WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProgressRepository for PgStore {
    async fn list_progress(&self, user_id: i64) -> Result<Vec<Progress>, DbError> {
        Ok(sqlx::query_as::<_, Progress>(
            "SELECT day_index, exercise_id, sets_completed, completed_at
             FROM training_progress WHERE user_id = $1
             ORDER BY day_index, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_day_progress(&self, user_id: i64, day_index: i32) -> Result<Vec<Progress>, DbError> {
        Ok(sqlx::query_as::<_, Progress>(
            "SELECT day_index, exercise_id, sets_completed, completed_at
             FROM training_progress WHERE user_id = $1 AND day_index = $2
             ORDER BY id",
        )
        .bind(user_id)
        .bind(day_index)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_progress(&self, user_id: i64, entry: &ProgressInput) -> Result<Progress, DbError> {
        Ok(sqlx::query_as::<_, Progress>(
            "INSERT INTO training_progress (user_id, day_index, exercise_id, sets_completed, completed_at)
             VALUES ($1, $2, $3, $4, NOW())
             ON CONFLICT (user_id, day_index, exercise_id) DO UPDATE
                SET sets_completed = EXCLUDED.sets_completed,
                    completed_at = EXCLUDED.completed_at
             RETURNING day_index, exercise_id, sets_completed, completed_at",
        )
        .bind(user_id)
        .bind(entry.day_index)
        .bind(&entry.exercise_id)
        .bind(entry.sets_completed)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn clear_progress(&self, user_id: i64) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM training_progress WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

const UPSERT_WATER_TOTAL: &str = "INSERT INTO water_intake (user_id, date, amount, timestamp)
     VALUES ($1, $2, $3, NOW())
     ON CONFLICT (user_id, date) DO UPDATE
        SET amount = EXCLUDED.amount, timestamp = EXCLUDED.timestamp
     RETURNING id, date, amount, timestamp";

#[async_trait]
impl WaterRepository for PgStore {
    async fn water_history(&self, user_id: i64, limit: i64) -> Result<Vec<WaterIntake>, DbError> {
        Ok(sqlx::query_as::<_, WaterIntake>(
            "SELECT id, date, amount, timestamp FROM water_intake
             WHERE user_id = $1 ORDER BY date DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn daily_water_intake(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<WaterIntake>, DbError> {
        Ok(sqlx::query_as::<_, WaterIntake>(
            "SELECT id, date, amount, timestamp FROM water_intake WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn daily_water_records(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<WaterIntakeRecord>, DbError> {
        Ok(sqlx::query_as::<_, WaterIntakeRecord>(
            "SELECT id, date, amount, timestamp FROM water_intake_records
             WHERE user_id = $1 AND date = $2 ORDER BY timestamp DESC",
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn log_daily_water(
        &self,
        user_id: i64,
        date: NaiveDate,
        total: f64,
        records: &[(f64, DateTime<Utc>)],
    ) -> Result<WaterIntake, DbError> {
        let mut tx = self.pool.begin().await?;
        let intake = sqlx::query_as::<_, WaterIntake>(UPSERT_WATER_TOTAL)
            .bind(user_id)
            .bind(date)
            .bind(total)
            .fetch_one(&mut *tx)
            .await?;
        for (amount, timestamp) in records {
            sqlx::query(
                "INSERT INTO water_intake_records (user_id, date, amount, timestamp)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(user_id)
            .bind(date)
            .bind(amount)
            .bind(timestamp)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(intake)
    }

    async fn add_water_record(
        &self,
        user_id: i64,
        date: NaiveDate,
        amount: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<WaterIntakeRecord, DbError> {
        let mut tx = self.pool.begin().await?;
        let record = sqlx::query_as::<_, WaterIntakeRecord>(
            "INSERT INTO water_intake_records (user_id, date, amount, timestamp)
             VALUES ($1, $2, $3, $4)
             RETURNING id, date, amount, timestamp",
        )
        .bind(user_id)
        .bind(date)
        .bind(amount)
        .bind(timestamp)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO water_intake (user_id, date, amount, timestamp)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (user_id, date) DO UPDATE
                SET amount = water_intake.amount + EXCLUDED.amount, timestamp = EXCLUDED.timestamp",
        )
        .bind(user_id)
        .bind(date)
        .bind(amount)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn delete_water_record(
        &self,
        user_id: i64,
        record_id: i64,
    ) -> Result<Option<WaterIntakeRecord>, DbError> {
        let mut tx = self.pool.begin().await?;
        let Some(record) = sqlx::query_as::<_, WaterIntakeRecord>(
            "DELETE FROM water_intake_records WHERE id = $1 AND user_id = $2
             RETURNING id, date, amount, timestamp",
        )
        .bind(record_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let total: Option<f64> = sqlx::query_scalar(
            "SELECT amount FROM water_intake WHERE user_id = $1 AND date = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(record.date)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(total) = total {
            sqlx::query_as::<_, WaterIntake>(UPSERT_WATER_TOTAL)
                .bind(user_id)
                .bind(record.date)
                .bind(deduct(total, record.amount))
                .fetch_one(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(Some(record))
    }

    async fn clear_water_day(&self, user_id: i64, date: NaiveDate) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM water_intake_records WHERE user_id = $1 AND date = $2")
            .bind(user_id)
            .bind(date)
            .execute(&mut *tx)
            .await?;
        sqlx::query_as::<_, WaterIntake>(UPSERT_WATER_TOTAL)
            .bind(user_id)
            .bind(date)
            .bind(0.0_f64)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn clear_water_data(&self, user_id: i64) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM water_intake_records WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM water_intake WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl VerificationCodeRepository for PgStore {
    async fn create_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<VerificationCode, DbError> {
        Ok(sqlx::query_as::<_, VerificationCode>(
            "INSERT INTO verification_codes (email, code, purpose) VALUES ($1, $2, $3)
             RETURNING id, email, code, created_at, is_used",
        )
        .bind(email)
        .bind(code)
        .bind(purpose.as_str())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn latest_code(
        &self,
        email: &str,
        purpose: CodePurpose,
    ) -> Result<Option<VerificationCode>, DbError> {
        Ok(sqlx::query_as::<_, VerificationCode>(
            "SELECT id, email, code, created_at, is_used FROM verification_codes
             WHERE email = $1 AND purpose = $2
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(email)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn mark_code_used(&self, code_id: i64) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE verification_codes SET is_used = TRUE WHERE id = $1 AND is_used = FALSE",
        )
        .bind(code_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
