//! Request authentication: the revocation list, the identity resolver and the
//! bearer-token validator every protected route is wrapped with.

use actix_web::dev::{Payload, ServiceRequest};
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use std::future::{ready, Ready};
use std::sync::Arc;
use std::time::Duration;

use crate::app::AppState;
use crate::db::{Store, TokenBlacklist, UserRepository};
use crate::errors::AppError;
use crate::models::user::User;
use crate::utils::jwt::TokenKind;

/// Persisted set of revoked tokens, fronted by a local cache of known
/// revocations. Only positive answers are cached.
pub struct RevocationList {
    store: Arc<dyn Store>,
    known_revoked: Cache<String, ()>,
}

impl RevocationList {
    pub fn new(store: Arc<dyn Store>, cache_ttl: Duration) -> Self {
        Self {
            store,
            known_revoked: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(cache_ttl)
                .build(),
        }
    }

    /// Returns `true` if this call revoked the token, `false` if it already was.
    pub async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool, AppError> {
        let added = self.store.blacklist_token(token, expires_at).await?;
        self.known_revoked.insert(token.to_string(), ());
        Ok(added)
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool, AppError> {
        if self.known_revoked.contains_key(token) {
            return Ok(true);
        }
        Ok(self.store.is_token_blacklisted(token).await?)
    }

    pub async fn prune(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        Ok(self.store.prune_blacklist(now).await?)
    }
}

/// Resolves a bearer token to the user it was issued for.
///
/// Fails with `Unauthorized` when the token is malformed, expired, signed with
/// another key, not an access token, revoked, or names a user that no longer
/// exists.
pub async fn resolve_identity(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = state.tokens.validate_token(token, TokenKind::Access)?;

    if state.revocations.is_revoked(token).await? {
        return Err(AppError::Unauthorized("Token has been revoked".to_string()));
    }

    state
        .store
        .find_user_by_username(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))
}

/// The caller of a protected route, attached by [`validator`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string())),
        )
    }
}

/// Validator function for the bearer middleware. Requests without an
/// `Authorization: Bearer` header reach it as `None` so the rejection carries
/// the usual error body.
pub async fn validator(
    req: ServiceRequest,
    credentials: Option<BearerAuth>,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let Some(credentials) = credentials else {
        return Err((
            AppError::Unauthorized("Not authenticated".to_string()).into(),
            req,
        ));
    };

    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        log::error!("Application state is not registered");
        return Err((
            AppError::InternalServerError("Server misconfigured".to_string()).into(),
            req,
        ));
    };

    let token = credentials.token();
    match resolve_identity(&state, token).await {
        Ok(user) => {
            req.extensions_mut().insert(AuthenticatedUser {
                user,
                token: token.to_string(),
            });
            Ok(req)
        }
        Err(err) => Err((err.into(), req)),
    }
}
