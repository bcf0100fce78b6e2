use crate::errors::{AppError, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub guest_codes: GuestCodeConfig,
    pub notifications: NotificationConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origin for the front end; `*` allows any origin.
    pub frontend_origin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub enabled: bool,
    pub url: String,
    pub channel_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_expiration_seconds: i64,
    pub password_min_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuestCodeConfig {
    pub qr_prefix: String,
    pub max_generation_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub purge_interval_seconds: u64,
    pub list_limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let environment = env::var("ACCESSGUARD_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(
                config::File::with_name(&format!("config/{}", environment)).required(false),
            )
            // e.g., ACCESSGUARD__SERVER__PORT=8080
            .add_source(
                config::Environment::with_prefix("ACCESSGUARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Configuration(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Configuration("Invalid port number".to_string()));
        }

        if self.database.backend == StoreBackend::Postgres && self.database.url.is_empty() {
            return Err(AppError::Configuration(
                "Database URL is required".to_string(),
            ));
        }

        if self.redis.enabled && self.redis.url.is_empty() {
            return Err(AppError::Configuration(
                "Redis URL is required when Redis is enabled".to_string(),
            ));
        }

        if self.auth.jwt_secret.len() < 32 {
            return Err(AppError::Configuration(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        if self.auth.password_min_length < 6 {
            return Err(AppError::Configuration(
                "Password min length must be at least 6".to_string(),
            ));
        }

        if self.guest_codes.max_generation_attempts == 0 {
            return Err(AppError::Configuration(
                "Guest code generation needs at least one attempt".to_string(),
            ));
        }

        if self.notifications.list_limit <= 0 {
            return Err(AppError::Configuration(
                "Notification list limit must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    /// In-memory configuration used by tests and local tooling.
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                frontend_origin: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                url: String::new(),
                max_connections: 10,
                min_connections: 1,
                acquire_timeout_seconds: 5,
                idle_timeout_seconds: 600,
            },
            redis: RedisConfig {
                enabled: false,
                url: String::new(),
                channel_prefix: "accessguard".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "development-secret-key-change-me-0123456789".to_string(),
                jwt_issuer: "accessguard".to_string(),
                jwt_expiration_seconds: 86_400,
                password_min_length: 6,
            },
            guest_codes: GuestCodeConfig {
                qr_prefix: "QR_".to_string(),
                max_generation_attempts: 10,
            },
            notifications: NotificationConfig {
                purge_interval_seconds: 300,
                list_limit: 50,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                log_format: "pretty".to_string(),
                metrics_enabled: true,
            },
        }
    }
}
