//! Connection pool configuration.
//!
//! Mirrors the teacher's `DbConfig`/`create_pool` shape, with one deviation
//! spec.md §6 calls out explicitly: the store password has no default, so
//! `from_env` is fallible instead of silently defaulting to an empty string.

use deadpool_postgres::{Config, ManagerConfig, RecyclingMethod, Runtime};
use nebula_core::{ConfigError, NebulaResult, StoreError};
use std::time::Duration;
use tokio_postgres::NoTls;

pub type Pool = deadpool_postgres::Pool;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_size: usize,
    pub timeout: Duration,
}

impl DbConfig {
    /// Build from `NEBULA_DB_*` environment variables. `NEBULA_DB_PASSWORD`
    /// is required; every other field falls back to a permissive default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let password =
            std::env::var("NEBULA_DB_PASSWORD").map_err(|_| ConfigError::MissingRequired {
                field: "NEBULA_DB_PASSWORD",
            })?;
        if password.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "NEBULA_DB_PASSWORD",
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            host: std::env::var("NEBULA_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("NEBULA_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("NEBULA_DB_NAME").unwrap_or_else(|_| "nebula".to_string()),
            user: std::env::var("NEBULA_DB_USER").unwrap_or_else(|_| "nebula".to_string()),
            password,
            max_size: std::env::var("NEBULA_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("NEBULA_DB_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }

    pub fn create_pool(&self) -> NebulaResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| {
                StoreError::PoolUnavailable {
                    reason: e.to_string(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_password_is_an_error() {
        std::env::remove_var("NEBULA_DB_PASSWORD");
        let err = DbConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { field } if field == "NEBULA_DB_PASSWORD"));
    }

    #[test]
    fn empty_password_is_rejected() {
        std::env::set_var("NEBULA_DB_PASSWORD", "");
        let err = DbConfig::from_env().unwrap_err();
        std::env::remove_var("NEBULA_DB_PASSWORD");
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "NEBULA_DB_PASSWORD"));
    }

    #[test]
    fn non_secret_fields_default_permissively() {
        std::env::set_var("NEBULA_DB_PASSWORD", "secret");
        std::env::remove_var("NEBULA_DB_PORT");
        let cfg = DbConfig::from_env().unwrap();
        std::env::remove_var("NEBULA_DB_PASSWORD");
        assert_eq!(cfg.port, 5432);
        assert_eq!(cfg.dbname, "nebula");
    }
}
