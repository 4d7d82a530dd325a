//! Application configuration management.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Migration runner configuration.
    #[serde(default)]
    pub migrations: MigrationsConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    #[serde(default)]
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a connection before giving up.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

/// Migration runner configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MigrationsConfig {
    /// Directory holding the migration files.
    #[serde(default = "default_migrations_dir")]
    pub dir: PathBuf,
    /// File extension (without the dot) that marks a migration file.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Apply each migration and its ledger record in one transaction.
    #[serde(default = "default_transactional")]
    pub transactional: bool,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
            extension: default_extension(),
            transactional: default_transactional(),
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_extension() -> String {
    "sql".to_string()
}

fn default_transactional() -> bool {
    true
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, lowest precedence first: `config/default`, `config/{RUN_MODE}`,
    /// `TRACKPOINT__*` environment variables, then `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> AppResult<Self> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("TRACKPOINT")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Checks the whole configuration, database included.
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the first invalid setting.
    pub fn validate(&self) -> AppResult<()> {
        self.database.validate()?;
        self.migrations.validate()
    }
}

impl DatabaseConfig {
    /// Checks that a connection can be attempted with these settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the first invalid setting.
    pub fn validate(&self) -> AppResult<()> {
        if self.url.trim().is_empty() {
            return Err(AppError::Validation(
                "database url is not set (DATABASE_URL or TRACKPOINT__DATABASE__URL)".into(),
            ));
        }
        if self.max_connections == 0 {
            return Err(AppError::Validation(
                "database.max_connections must be at least 1".into(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(AppError::Validation(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

impl MigrationsConfig {
    /// Checks the migration directory and extension settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the first invalid setting.
    pub fn validate(&self) -> AppResult<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(AppError::Validation("migrations.dir is empty".into()));
        }
        if self.extension.is_empty() || self.extension.contains('.') {
            return Err(AppError::Validation(format!(
                "migrations.extension must be a bare extension like \"sql\", got {:?}",
                self.extension
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 6] = [
        "RUN_MODE",
        "DATABASE_URL",
        "TRACKPOINT__DATABASE__URL",
        "TRACKPOINT__DATABASE__MAX_CONNECTIONS",
        "TRACKPOINT__MIGRATIONS__DIR",
        "TRACKPOINT__MIGRATIONS__TRANSACTIONAL",
    ];

    /// Every relevant variable unset except the given ones.
    fn env_with(set: &[(&'static str, &'static str)]) -> Vec<(&'static str, Option<&'static str>)> {
        KEYS.iter()
            .map(|key| {
                let value = set.iter().find(|(k, _)| k == key).map(|(_, v)| *v);
                (*key, value)
            })
            .collect()
    }

    #[test]
    fn test_load_defaults() {
        temp_env::with_vars(env_with(&[("RUN_MODE", "test-none")]), || {
            let config = AppConfig::load().unwrap();
            assert_eq!(config.database.url, "");
            assert_eq!(config.database.max_connections, 5);
            assert_eq!(config.migrations.dir, PathBuf::from("migrations"));
            assert_eq!(config.migrations.extension, "sql");
            assert!(config.migrations.transactional);
        });
    }

    #[test]
    fn test_load_from_prefixed_env() {
        let vars = env_with(&[
            ("RUN_MODE", "test-none"),
            ("TRACKPOINT__DATABASE__URL", "postgres://app@db/trackpoint"),
            ("TRACKPOINT__DATABASE__MAX_CONNECTIONS", "2"),
            ("TRACKPOINT__MIGRATIONS__DIR", "db/sql"),
            ("TRACKPOINT__MIGRATIONS__TRANSACTIONAL", "false"),
        ]);
        temp_env::with_vars(vars, || {
            let config = AppConfig::load().unwrap();
            assert_eq!(config.database.url, "postgres://app@db/trackpoint");
            assert_eq!(config.database.max_connections, 2);
            assert_eq!(config.migrations.dir, PathBuf::from("db/sql"));
            assert!(!config.migrations.transactional);
        });
    }

    #[test]
    fn test_database_url_env_wins() {
        let vars = env_with(&[
            ("RUN_MODE", "test-none"),
            ("TRACKPOINT__DATABASE__URL", "postgres://prefixed/db"),
            ("DATABASE_URL", "postgres://plain/db"),
        ]);
        temp_env::with_vars(vars, || {
            let config = AppConfig::load().unwrap();
            assert_eq!(config.database.url, "postgres://plain/db");
        });
    }

    #[test]
    fn test_validate_requires_url() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("database url"));
    }

    #[test]
    fn test_validate_connection_bounds() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".into();
        config.database.min_connections = 10;
        assert!(config.validate().is_err());

        config.database.min_connections = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_extension() {
        let mut migrations = MigrationsConfig::default();
        assert!(migrations.validate().is_ok());

        migrations.extension = ".sql".into();
        assert!(migrations.validate().is_err());

        migrations.extension = String::new();
        assert!(migrations.validate().is_err());
    }
}
