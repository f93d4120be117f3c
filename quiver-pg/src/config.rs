//! Connection pool configuration

use crate::error::pool_build_error;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use quiver_core::{ConfigError, QuiverError, QuiverResult};
use std::fmt;
use std::time::Duration;
use tokio_postgres::NoTls;

/// Database connection pool configuration.
#[derive(Clone, PartialEq)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait for a pooled connection at most this long
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "quiver".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `QUIVER_DB_HOST`, `QUIVER_DB_PORT`, `QUIVER_DB_NAME`, `QUIVER_DB_USER`,
    ///   `QUIVER_DB_PASSWORD`
    /// - `QUIVER_DB_POOL_SIZE`: maximum pooled connections (default: 16)
    /// - `QUIVER_DB_TIMEOUT`: pool wait in seconds (default: 30)
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("QUIVER_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("QUIVER_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("QUIVER_DB_NAME").unwrap_or_else(|_| "quiver".to_string()),
            user: std::env::var("QUIVER_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("QUIVER_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("QUIVER_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("QUIVER_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    pub fn validate(&self) -> QuiverResult<()> {
        if self.host.trim().is_empty() {
            return Err(QuiverError::Config(ConfigError::MissingRequired {
                field: "host".to_string(),
            }));
        }

        if self.max_size == 0 {
            return Err(QuiverError::Config(ConfigError::InvalidValue {
                field: "max_size".to_string(),
                value: self.max_size.to_string(),
                reason: "pool size must be greater than 0".to_string(),
            }));
        }

        if self.timeout.is_zero() {
            return Err(QuiverError::Config(ConfigError::InvalidValue {
                field: "timeout".to_string(),
                value: format!("{:?}", self.timeout),
                reason: "timeout must be greater than 0".to_string(),
            }));
        }

        Ok(())
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> QuiverResult<Pool> {
        self.validate()?;

        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig {
            max_size: self.max_size,
            timeouts: Timeouts {
                wait: Some(self.timeout),
                create: Some(self.timeout),
                recycle: None,
            },
            ..PoolConfig::default()
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(pool_build_error)
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_size", &self.max_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(DbConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_pool_rejected() {
        let config = DbConfig {
            max_size: 0,
            ..DbConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(QuiverError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = DbConfig {
            password: "hunter2".to_string(),
            ..DbConfig::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
