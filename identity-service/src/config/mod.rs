//! Configuration module for identity-service.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub contact_store: ContactStoreBackend,
    pub database: DatabaseConfig,
    pub mongo: MongoConfig,
}

/// Where contacts live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactStoreBackend {
    Postgres,
    /// Process-local, lost on restart. Local runs only.
    Memory,
}

impl ContactStoreBackend {
    fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "CONTACT_STORE must be `postgres` or `memory`, got `{}`",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: Secret<String>,
    pub database: String,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(common: core_config::Config, var: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let contact_store = match var("CONTACT_STORE") {
            Some(value) => ContactStoreBackend::parse(&value)?,
            None => ContactStoreBackend::Postgres,
        };

        let database_url = match (var("DATABASE_URL"), contact_store) {
            (Some(url), _) => url,
            (None, ContactStoreBackend::Memory) => String::new(),
            (None, ContactStoreBackend::Postgres) => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_URL is required"
                )))
            }
        };

        let mongo_uri = match var("MONGODB_URI") {
            Some(uri) => uri,
            None if common.is_production() => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "MONGODB_URI is required in production"
                )))
            }
            None => "mongodb://localhost:27017".to_string(),
        };

        Ok(Self {
            service_name: var("SERVICE_NAME").unwrap_or_else(|| "identity-service".to_string()),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            otlp_endpoint: var("OTLP_ENDPOINT").filter(|s| !s.is_empty()),
            contact_store,
            database: DatabaseConfig {
                url: Secret::new(database_url),
                max_connections: var("DATABASE_MAX_CONNECTIONS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: var("DATABASE_MIN_CONNECTIONS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
            },
            mongo: MongoConfig {
                uri: Secret::new(mongo_uri),
                database: var("MONGODB_DATABASE").unwrap_or_else(|| "Payments".to_string()),
            },
            common,
        })
    }
}
