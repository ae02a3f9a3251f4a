use std::env;

use anyhow::Context;

use crate::core::BuilderConfig;

/// Process configuration, read once at startup from the environment
/// (`.env` honored via dotenvy).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    /// Warehouse schema the transaction tables live in.
    pub db_schema: String,
    /// Cap applied to the `limit` request parameter.
    pub max_limit: i64,
    pub max_connections: u32,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let db_schema = env::var("DB_SCHEMA").unwrap_or_default();
        let max_limit = parse_env("MAX_LIMIT", 500)?;
        let max_connections = parse_env("MAX_CONNECTIONS", 5)?;
        Ok(Self {
            database_url,
            bind_addr,
            db_schema,
            max_limit,
            max_connections,
        })
    }

    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            schema: self.db_schema.clone(),
            max_limit: self.max_limit,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
