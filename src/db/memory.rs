//! In-process store selected with `DATABASE_URL=memory`.
//!
//! Mirrors the PostgreSQL schema closely enough for local runs and tests:
//! the same uniqueness rules, cascades and per-call atomicity (one lock per
//! operation).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{
    DbError, PlanRepository, ProgressRepository, TokenBlacklist, UserRepository,
    VerificationCodeRepository, WaterRepository,
};
use crate::models::plan::{Plan, PlanDocument};
use crate::models::progress::{Progress, ProgressInput};
use crate::models::token::BlacklistedToken;
use crate::models::user::{NewUser, ProfileChanges, ProfileUpdateOutcome, User};
use crate::models::verification::{CodePurpose, VerificationCode};
use crate::models::water::{deduct, WaterIntake, WaterIntakeRecord};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    blacklist: HashMap<String, BlacklistedToken>,
    plans: HashMap<i64, Plan>,
    progress: Vec<(i64, Progress)>,
    water_totals: Vec<(i64, WaterIntake)>,
    water_records: Vec<(i64, WaterIntakeRecord)>,
    codes: Vec<(CodePurpose, VerificationCode)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn set_total(&mut self, user_id: i64, date: NaiveDate, amount: f64) -> WaterIntake {
        let now = Utc::now();
        if let Some((_, total)) = self
            .water_totals
            .iter_mut()
            .find(|(owner, t)| *owner == user_id && t.date == date)
        {
            total.amount = amount;
            total.timestamp = now;
            return total.clone();
        }
        let total = WaterIntake {
            id: self.next_id(),
            date,
            amount,
            timestamp: now,
        };
        self.water_totals.push((user_id, total.clone()));
        total
    }

    fn total_for(&self, user_id: i64, date: NaiveDate) -> Option<f64> {
        self.water_totals
            .iter()
            .find(|(owner, t)| *owner == user_id && t.date == date)
            .map(|(_, t)| t.amount)
    }

    fn insert_record(
        &mut self,
        user_id: i64,
        date: NaiveDate,
        amount: f64,
        timestamp: DateTime<Utc>,
    ) -> WaterIntakeRecord {
        let record = WaterIntakeRecord {
            id: self.next_id(),
            date,
            amount,
            timestamp,
        };
        self.water_records.push((user_id, record.clone()));
        record
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave a half-applied write
        // behind: every operation mutates only after all checks pass.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, new_user: &NewUser) -> Result<User, DbError> {
        let mut tables = self.lock();
        if tables
            .users
            .iter()
            .any(|u| u.username == new_user.username || u.email == new_user.email)
        {
            return Err(DbError::Conflict(
                "Username or email already registered".to_string(),
            ));
        }
        let user = User {
            id: tables.next_id(),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            gender: new_user.gender,
            weight: None,
            height: None,
            age: None,
            training_program: None,
            training_location: None,
            training_experience: None,
            avatar_url: None,
            is_active: true,
            role: "user".to_string(),
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        Ok(self.lock().users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_profile(
        &self,
        user_id: i64,
        changes: &ProfileChanges,
    ) -> Result<Option<ProfileUpdateOutcome>, DbError> {
        let mut tables = self.lock();
        let Some(index) = tables.users.iter().position(|u| u.id == user_id) else {
            return Ok(None);
        };

        let plan_reset = changes.invalidates_plan(&tables.users[index]);
        if plan_reset {
            tables.plans.remove(&user_id);
        }

        let user = &mut tables.users[index];
        changes.apply_to(user);
        Ok(Some(ProfileUpdateOutcome {
            user: user.clone(),
            plan_reset,
        }))
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<(), DbError> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == user_id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn set_avatar_url(
        &self,
        user_id: i64,
        avatar_url: Option<&str>,
    ) -> Result<Option<String>, DbError> {
        let mut tables = self.lock();
        Ok(tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .and_then(|user| {
                std::mem::replace(&mut user.avatar_url, avatar_url.map(str::to_string))
            }))
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, DbError> {
        let mut tables = self.lock();
        let before = tables.users.len();
        tables.users.retain(|u| u.id != user_id);
        if tables.users.len() == before {
            return Ok(false);
        }
        tables.plans.remove(&user_id);
        tables.progress.retain(|(owner, _)| *owner != user_id);
        tables.water_totals.retain(|(owner, _)| *owner != user_id);
        tables.water_records.retain(|(owner, _)| *owner != user_id);
        Ok(true)
    }
}

#[async_trait]
impl TokenBlacklist for MemoryStore {
    async fn blacklist_token(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool, DbError> {
        let mut tables = self.lock();
        if tables.blacklist.contains_key(token) {
            return Ok(false);
        }
        tables.blacklist.insert(
            token.to_string(),
            BlacklistedToken {
                token: token.to_string(),
                created_at: Utc::now(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, DbError> {
        Ok(self.lock().blacklist.contains_key(token))
    }

    async fn prune_blacklist(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let mut tables = self.lock();
        let before = tables.blacklist.len();
        tables.blacklist.retain(|_, entry| entry.expires_at >= now);
        Ok((before - tables.blacklist.len()) as u64)
    }
}

#[async_trait]
impl PlanRepository for MemoryStore {
    async fn get_plan(&self, user_id: i64) -> Result<Option<Plan>, DbError> {
        Ok(self.lock().plans.get(&user_id).cloned())
    }

    async fn save_plan(&self, user_id: i64, document: &PlanDocument) -> Result<Plan, DbError> {
        let plan = Plan {
            user_id,
            document: document.clone(),
            updated_at: Utc::now(),
        };
        self.lock().plans.insert(user_id, plan.clone());
        Ok(plan)
    }

    async fn delete_plan(&self, user_id: i64) -> Result<bool, DbError> {
        Ok(self.lock().plans.remove(&user_id).is_some())
    }
}

#[async_trait]
impl ProgressRepository for MemoryStore {
    async fn list_progress(&self, user_id: i64) -> Result<Vec<Progress>, DbError> {
        let mut entries: Vec<Progress> = self
            .lock()
            .progress
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, p)| p.clone())
            .collect();
        entries.sort_by_key(|p| p.day_index);
        Ok(entries)
    }

    async fn list_day_progress(&self, user_id: i64, day_index: i32) -> Result<Vec<Progress>, DbError> {
        Ok(self
            .lock()
            .progress
            .iter()
            .filter(|(owner, p)| *owner == user_id && p.day_index == day_index)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn upsert_progress(&self, user_id: i64, entry: &ProgressInput) -> Result<Progress, DbError> {
        let mut tables = self.lock();
        let now = Utc::now();
        if let Some((_, existing)) = tables.progress.iter_mut().find(|(owner, p)| {
            *owner == user_id && p.day_index == entry.day_index && p.exercise_id == entry.exercise_id
        }) {
            existing.sets_completed = entry.sets_completed;
            existing.completed_at = now;
            return Ok(existing.clone());
        }
        let progress = Progress {
            day_index: entry.day_index,
            exercise_id: entry.exercise_id.clone(),
            sets_completed: entry.sets_completed,
            completed_at: now,
        };
        tables.progress.push((user_id, progress.clone()));
        Ok(progress)
    }

    async fn clear_progress(&self, user_id: i64) -> Result<u64, DbError> {
        let mut tables = self.lock();
        let before = tables.progress.len();
        tables.progress.retain(|(owner, _)| *owner != user_id);
        Ok((before - tables.progress.len()) as u64)
    }
}

#[async_trait]
impl WaterRepository for MemoryStore {
    async fn water_history(&self, user_id: i64, limit: i64) -> Result<Vec<WaterIntake>, DbError> {
        let mut totals: Vec<WaterIntake> = self
            .lock()
            .water_totals
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, t)| t.clone())
            .collect();
        totals.sort_by(|a, b| b.date.cmp(&a.date));
        totals.truncate(limit.max(0) as usize);
        Ok(totals)
    }

    async fn daily_water_intake(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<WaterIntake>, DbError> {
        Ok(self
            .lock()
            .water_totals
            .iter()
            .find(|(owner, t)| *owner == user_id && t.date == date)
            .map(|(_, t)| t.clone()))
    }

    async fn daily_water_records(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<WaterIntakeRecord>, DbError> {
        let mut records: Vec<WaterIntakeRecord> = self
            .lock()
            .water_records
            .iter()
            .filter(|(owner, r)| *owner == user_id && r.date == date)
            .map(|(_, r)| r.clone())
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    async fn log_daily_water(
        &self,
        user_id: i64,
        date: NaiveDate,
        total: f64,
        records: &[(f64, DateTime<Utc>)],
    ) -> Result<WaterIntake, DbError> {
        let mut tables = self.lock();
        let intake = tables.set_total(user_id, date, total);
        for (amount, timestamp) in records {
            tables.insert_record(user_id, date, *amount, *timestamp);
        }
        Ok(intake)
    }

    async fn add_water_record(
        &self,
        user_id: i64,
        date: NaiveDate,
        amount: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<WaterIntakeRecord, DbError> {
        let mut tables = self.lock();
        let record = tables.insert_record(user_id, date, amount, timestamp);
        let total = tables.total_for(user_id, date).unwrap_or(0.0) + amount;
        tables.set_total(user_id, date, total);
        Ok(record)
    }

    async fn delete_water_record(
        &self,
        user_id: i64,
        record_id: i64,
    ) -> Result<Option<WaterIntakeRecord>, DbError> {
        let mut tables = self.lock();
        let Some(index) = tables
            .water_records
            .iter()
            .position(|(owner, r)| *owner == user_id && r.id == record_id)
        else {
            return Ok(None);
        };
        let (_, record) = tables.water_records.remove(index);
        if let Some(total) = tables.total_for(user_id, record.date) {
            tables.set_total(user_id, record.date, deduct(total, record.amount));
        }
        Ok(Some(record))
    }

    async fn clear_water_day(&self, user_id: i64, date: NaiveDate) -> Result<(), DbError> {
        let mut tables = self.lock();
        tables
            .water_records
            .retain(|(owner, r)| !(*owner == user_id && r.date == date));
        tables.set_total(user_id, date, 0.0);
        Ok(())
    }

    async fn clear_water_data(&self, user_id: i64) -> Result<(), DbError> {
        let mut tables = self.lock();
        tables.water_records.retain(|(owner, _)| *owner != user_id);
        tables.water_totals.retain(|(owner, _)| *owner != user_id);
        Ok(())
    }
}

#[async_trait]
impl VerificationCodeRepository for MemoryStore {
    async fn create_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<VerificationCode, DbError> {
        let mut tables = self.lock();
        let record = VerificationCode {
            id: tables.next_id(),
            email: email.to_string(),
            code: code.to_string(),
            created_at: Utc::now(),
            is_used: false,
        };
        tables.codes.push((purpose, record.clone()));
        Ok(record)
    }

    async fn latest_code(
        &self,
        email: &str,
        purpose: CodePurpose,
    ) -> Result<Option<VerificationCode>, DbError> {
        // Ids grow monotonically, so the highest id is the newest code.
        Ok(self
            .lock()
            .codes
            .iter()
            .filter(|(p, c)| *p == purpose && c.email == email)
            .max_by_key(|(_, c)| c.id)
            .map(|(_, c)| c.clone()))
    }

    async fn mark_code_used(&self, code_id: i64) -> Result<bool, DbError> {
        let mut tables = self.lock();
        match tables.codes.iter_mut().find(|(_, c)| c.id == code_id) {
            Some((_, code)) if !code.is_used => {
                code.is_used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
