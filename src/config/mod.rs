//! Process configuration, loaded once at startup from the environment.

use jsonwebtoken::Algorithm;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Where persisted state lives.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Postgres(String),
    /// In-process store, selected with `DATABASE_URL=memory`.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub bind_address: String,
    pub workers: usize,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub media_dir: PathBuf,
    pub bcrypt_cost: u32,
    pub blacklist_prune_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::Empty("JWT_SECRET"));
        }

        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let storage = match database_url.trim() {
            "" => return Err(ConfigError::Empty("DATABASE_URL")),
            "memory" => StorageBackend::Memory,
            url => StorageBackend::Postgres(url.to_string()),
        };

        let algorithm_name = lookup("JWT_ALGORITHM").unwrap_or_else(|| "HS256".to_string());
        let jwt_algorithm = parse_hmac_algorithm(&algorithm_name)?;

        Ok(Self {
            storage,
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            workers: parse_or(&lookup, "WORKERS", num_cpus::get())?,
            jwt_secret,
            jwt_algorithm,
            access_token_ttl_minutes: parse_or(&lookup, "ACCESS_TOKEN_EXPIRE_MINUTES", 30)?,
            refresh_token_ttl_days: parse_or(&lookup, "REFRESH_TOKEN_EXPIRE_DAYS", 7)?,
            media_dir: lookup("MEDIA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("media")),
            bcrypt_cost: parse_or(&lookup, "BCRYPT_COST", 10)?,
            blacklist_prune_interval_secs: parse_or(&lookup, "BLACKLIST_PRUNE_INTERVAL_SECS", 600)?,
        })
    }

    /// Configuration for tests: in-memory store and the cheapest bcrypt cost.
    pub fn test_default() -> Self {
        Self {
            storage: StorageBackend::Memory,
            bind_address: "127.0.0.1:0".to_string(),
            workers: 1,
            jwt_secret: "test_jwt_secret_32_bytes_minimum!".to_string(),
            jwt_algorithm: Algorithm::HS256,
            access_token_ttl_minutes: 30,
            refresh_token_ttl_days: 7,
            media_dir: env::temp_dir().join("fittrack-test-media"),
            bcrypt_cost: 4,
            blacklist_prune_interval_secs: 600,
        }
    }

    pub fn avatar_dir(&self) -> PathBuf {
        self.media_dir.join("avatars")
    }
}

fn parse_hmac_algorithm(name: &str) -> Result<Algorithm, ConfigError> {
    let invalid = || ConfigError::Invalid {
        name: "JWT_ALGORITHM",
        value: name.to_string(),
    };
    match Algorithm::from_str(name).map_err(|_| invalid())? {
        alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) => Ok(alg),
        _ => Err(invalid()),
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_secret_fails_fast() {
        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "memory")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory"),
            ("JWT_SECRET", "  "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Empty("JWT_SECRET")));
    }

    #[test]
    fn defaults_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/fittrack"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();
        assert_eq!(
            config.storage,
            StorageBackend::Postgres("postgres://localhost/fittrack".to_string())
        );
        assert_eq!(config.jwt_algorithm, Algorithm::HS256);
        assert_eq!(config.access_token_ttl_minutes, 30);
        assert_eq!(config.refresh_token_ttl_days, 7);
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.avatar_dir(), PathBuf::from("media").join("avatars"));
    }

    #[test]
    fn non_hmac_algorithm_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory"),
            ("JWT_SECRET", "secret"),
            ("JWT_ALGORITHM", "RS256"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "JWT_ALGORITHM", .. }));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory"),
            ("JWT_SECRET", "secret"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { name: "ACCESS_TOKEN_EXPIRE_MINUTES", .. }
        ));
    }
}
