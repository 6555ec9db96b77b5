//! Server configuration module

use std::path::PathBuf;

use clap::Parser;
use stockroom_app::{
    context::AppConfig,
    settings::{Settings, SettingsError},
};

use crate::config::{
    auth::AuthConfig,
    backends::{BrokerConfig, CacheConfig},
    db::DatabaseConfig,
    observability::{LoggingConfig, ObservabilityConfig},
    server::ServerRuntimeConfig,
};

pub(crate) mod auth;
pub(crate) mod backends;
pub(crate) mod db;
pub(crate) mod observability;
pub(crate) mod server;

pub(crate) use observability::LogFormat;

/// Stockroom JSON API Server configuration
#[derive(Debug, Parser)]
#[command(name = "stockroom-json", about = "Stockroom JSON API Server", long_about = None)]
pub struct ServerConfig {
    /// Server network settings.
    #[command(flatten)]
    pub server: ServerRuntimeConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Observability (traces/metrics) settings.
    #[command(flatten)]
    pub observability: ObservabilityConfig,

    /// Application database settings.
    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Cache store settings.
    #[command(flatten)]
    pub cache: CacheConfig,

    /// Message broker settings.
    #[command(flatten)]
    pub broker: BrokerConfig,

    /// Bearer token settings.
    #[command(flatten)]
    pub auth: AuthConfig,

    /// YAML business settings; built-in defaults are used when omitted
    #[arg(long, env = "STOCKROOM_SETTINGS")]
    pub settings: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// Get the socket address for binding
    #[must_use]
    pub fn socket_addr(&self) -> String {
        self.server.socket_addr()
    }

    /// Settings and connection details for the application context.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file cannot be read or is invalid
    pub fn app_config(&self) -> Result<AppConfig, SettingsError> {
        let settings = match &self.settings {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        Ok(AppConfig {
            database_url: self.database.database_url.clone(),
            max_connections: self.database.max_connections,
            redis_url: self.cache.redis_url.clone(),
            amqp_url: self.broker.amqp_url.clone(),
            run_migrations: self.database.run_migrations,
            settings,
        })
    }
}
