use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    /// Unique per token, so two tokens minted in the same second never collide
    /// in the blacklist.
    pub jti: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Signs and verifies session tokens with the shared secret.
#[derive(Clone)]
pub struct TokenService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], algorithm: Algorithm, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            config.jwt_algorithm,
            Duration::minutes(config.access_token_ttl_minutes),
            Duration::days(config.refresh_token_ttl_days),
        )
    }

    fn issue(&self, subject: &str, kind: TokenKind, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            exp: (now + ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
            kind,
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key).map_err(|e| {
            log::error!("Token generation failed: {}", e);
            AppError::InternalServerError("Token generation error".to_string())
        })
    }

    pub fn issue_access_token(&self, subject: &str) -> Result<String, AppError> {
        self.issue(subject, TokenKind::Access, self.access_ttl)
    }

    pub fn issue_refresh_token(&self, subject: &str) -> Result<String, AppError> {
        self.issue(subject, TokenKind::Refresh, self.refresh_ttl)
    }

    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(subject)?,
            refresh_token: self.issue_refresh_token(subject)?,
            token_type: "bearer".to_string(),
        })
    }

    /// Checks signature, expiry and token kind.
    pub fn validate_token(&self, token: &str, expected: TokenKind) -> Result<Claims, AppError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

        if claims.kind != expected {
            return Err(AppError::Unauthorized("Invalid token type".to_string()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(
            b"test_signing_key_32_bytes_long!!",
            Algorithm::HS256,
            Duration::minutes(30),
            Duration::days(7),
        )
    }

    #[test]
    fn access_token_round_trip() {
        let tokens = service();
        let token = tokens.issue_access_token("alice").unwrap();
        let claims = tokens.validate_token(&token, TokenKind::Access).unwrap();

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn refresh_token_lives_longer_and_is_not_an_access_token() {
        let tokens = service();
        let token = tokens.issue_refresh_token("alice").unwrap();

        let claims = tokens.validate_token(&token, TokenKind::Refresh).unwrap();
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
        assert!(tokens.validate_token(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn tokens_issued_together_are_distinct() {
        let tokens = service();
        let a = tokens.issue_access_token("alice").unwrap();
        let b = tokens.issue_access_token("alice").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenService::new(
            b"test_signing_key_32_bytes_long!!",
            Algorithm::HS256,
            Duration::seconds(-10),
            Duration::days(7),
        );
        let token = tokens.issue_access_token("alice").unwrap();
        assert!(tokens.validate_token(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let other = TokenService::new(
            b"another_key_that_is_not_ours!!!!",
            Algorithm::HS256,
            Duration::minutes(30),
            Duration::days(7),
        );
        let token = other.issue_access_token("alice").unwrap();
        assert!(service().validate_token(&token, TokenKind::Access).is_err());
    }
}
