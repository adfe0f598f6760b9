use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: bool,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub age: Option<i32>,
    pub training_program: Option<String>,
    pub training_location: Option<String>,
    pub training_experience: Option<String>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile_completed(&self) -> bool {
        self.weight.is_some() && self.height.is_some() && self.age.is_some()
    }
}

/// Fields captured at registration; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: bool,
}

/// A partial profile update. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<bool>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub age: Option<i32>,
    pub training_program: Option<String>,
    pub training_location: Option<String>,
    pub training_experience: Option<String>,
}

fn differs(current: &Option<String>, requested: &Option<String>) -> bool {
    matches!(requested, Some(value) if current.as_deref() != Some(value.as_str()))
}

impl ProfileChanges {
    /// True when the update moves program, location or experience away from
    /// the stored value. The stored plan was derived from those three fields.
    pub fn invalidates_plan(&self, user: &User) -> bool {
        differs(&user.training_program, &self.training_program)
            || differs(&user.training_location, &self.training_location)
            || differs(&user.training_experience, &self.training_experience)
    }

    pub fn apply_to(&self, user: &mut User) {
        if let Some(v) = &self.first_name {
            user.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            user.last_name = v.clone();
        }
        if let Some(v) = self.gender {
            user.gender = v;
        }
        if let Some(v) = self.weight {
            user.weight = Some(v);
        }
        if let Some(v) = self.height {
            user.height = Some(v);
        }
        if let Some(v) = self.age {
            user.age = Some(v);
        }
        if let Some(v) = &self.training_program {
            user.training_program = Some(v.clone());
        }
        if let Some(v) = &self.training_location {
            user.training_location = Some(v.clone());
        }
        if let Some(v) = &self.training_experience {
            user.training_experience = Some(v.clone());
        }
    }
}

#[derive(Debug)]
pub struct ProfileUpdateOutcome {
    pub user: User,
    pub plan_reset: bool,
}

#[cfg(test)]
pub(crate) fn sample_user() -> User {
    User {
        id: 1,
        username: "alice".to_string(),
        email: "a@x.com".to_string(),
        password_hash: String::new(),
        first_name: "Alice".to_string(),
        last_name: "Smith".to_string(),
        gender: false,
        weight: Some(60.0),
        height: Some(170.0),
        age: None,
        training_program: Some("strength".to_string()),
        training_location: Some("gym".to_string()),
        training_experience: None,
        avatar_url: None,
        is_active: true,
        role: "user".to_string(),
        created_at: Utc::now(),
    }
}
