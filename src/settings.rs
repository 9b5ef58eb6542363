//! Runtime configuration, layered as: built-in defaults, an optional `config.toml`, `CAMPUS_*`
//! environment variables, and finally the bare `DATABASE_URL` / `ADMIN_TOKEN` variables (which
//! may come from a `.env` file).

use config::{Config, ConfigError};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Path of the SQLite database file, or `:memory:`.
    pub database_url: String,
    /// Shared secret for the admin commands. Admin access is disabled when unset.
    pub admin_token: Option<String>,
    /// Internal error messages are only shown to callers in development.
    pub environment: RunMode,
    /// Default `tracing` filter, used when `RUST_LOG` is not set.
    pub log_filter: String,
    /// How long a writer waits for the database lock held by another connection.
    pub busy_timeout_ms: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok();

        let mut builder = Config::builder()
            .set_default("database_url", "campus_events.db")?
            .set_default("environment", "production")?
            .set_default("log_filter", "campus_events=info")?
            .set_default("busy_timeout_ms", 5000_i64)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("CAMPUS"));

        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database_url", database_url)?;
        }
        if let Ok(admin_token) = env::var("ADMIN_TOKEN") {
            builder = builder.set_override("admin_token", admin_token)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn exposes_internal_errors(&self) -> bool {
        self.environment == RunMode::Development
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "campus_events.db".to_string(),
            admin_token: None,
            environment: RunMode::Production,
            log_filter: "campus_events=info".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}
