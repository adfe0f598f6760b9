use actix_web::rt::task::spawn_blocking;
use bcrypt::{hash, verify};

use crate::db::{Store, UserRepository};
use crate::errors::AppError;
use crate::models::user::User;

pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    spawn_blocking(move || hash(&password, cost))
        .await
        .map_err(|_| AppError::InternalServerError("Hashing failed".to_string()))?
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Constant-time comparison against a bcrypt hash. A malformed hash counts as
/// a mismatch.
pub async fn verify_password(password: String, password_hash: String) -> Result<bool, AppError> {
    let outcome = spawn_blocking(move || verify(password.as_str(), &password_hash))
        .await
        .map_err(|_| AppError::InternalServerError("Password verification error".to_string()))?;

    Ok(outcome.unwrap_or_else(|e| {
        log::warn!("Stored password hash could not be verified: {}", e);
        false
    }))
}

/// Returns the user when `password` matches, `None` for an unknown username or
/// a wrong password.
pub async fn authenticate(
    store: &dyn Store,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let Some(user) = store.find_user_by_username(username).await? else {
        return Ok(None);
    };

    if verify_password(password.to_string(), user.password_hash.clone()).await? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::user::NewUser;

    async fn store_with_alice() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_user(&NewUser {
                username: "alice".to_string(),
                email: "a@x.com".to_string(),
                password_hash: hash_password("secret1".to_string(), 4).await.unwrap(),
                first_name: "Alice".to_string(),
                last_name: "Smith".to_string(),
                gender: false,
            })
            .await
            .unwrap();
        store
    }

    #[actix_web::test]
    async fn valid_credentials_return_user() {
        let store = store_with_alice().await;
        let user = authenticate(&store, "alice", "secret1").await.unwrap();
        assert_eq!(user.map(|u| u.username), Some("alice".to_string()));
    }

    #[actix_web::test]
    async fn bad_credentials_are_falsy_not_errors() {
        let store = store_with_alice().await;
        assert!(authenticate(&store, "alice", "wrong").await.unwrap().is_none());
        assert!(authenticate(&store, "mallory", "secret1").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("secret1".to_string(), "not-a-hash".to_string())
            .await
            .unwrap());
    }
}
