use chrono::{DateTime, Utc};

/// A revoked token. Rows are kept until the token would have expired anyway.
#[derive(Debug, Clone)]
pub struct BlacklistedToken {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
