use chrono::{DateTime, Duration, Utc};

pub const CODE_EXPIRATION_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    EmailVerification,
    PasswordReset,
}

impl CodePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::EmailVerification => "email_verification",
            CodePurpose::PasswordReset => "password_reset",
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct VerificationCode {
    pub id: i64,
    pub email: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub is_used: bool,
}

impl VerificationCode {
    pub fn is_valid(&self, input: &str, now: DateTime<Utc>) -> bool {
        !self.is_used
            && self.code == input
            && now - self.created_at <= Duration::minutes(CODE_EXPIRATION_MINUTES)
    }
}
