//! Application configuration loaded from environment variables.

use std::time::Duration;

use courier::{CourierConfig, ProviderConfig};
use thiserror::Error;

/// HTTP timeout applied to courier provider calls.
const PROVIDER_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A rejected environment variable. Startup fails fast on these instead
/// of silently running with a default.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The variable is set but does not parse as the expected type.
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `DATABASE_URL`: Postgres URL; absent selects the in-memory store
/// - `PAYMENT_TIMEOUT_HOURS`: prepaid orders older than this are
///   auto-cancelled (default `24`)
/// - `STATUS_POLL_INTERVAL_MINUTES`: courier status sweep (default `30`)
/// - `STALE_CANCEL_INTERVAL_MINUTES`: unpaid-order sweep (default `60`)
/// - `AUTO_ASSIGN_INTERVAL_MINUTES`: courier handover sweep (default `5`)
/// - `AUTO_ASSIGN_COURIER`: enable the handover sweep (default `false`)
/// - `DEFAULT_COURIER`: provider used when none is named (default `"pathao"`)
/// - `ALLOW_UNSIGNED_WEBHOOKS`: accept unsigned webhooks (default `false`)
/// - `PATHAO_BASE_URL`, `PATHAO_CLIENT_ID`, `PATHAO_CLIENT_SECRET`,
///   `PATHAO_USERNAME`, `PATHAO_PASSWORD`, `PATHAO_WEBHOOK_SECRET`
/// - `STEADFAST_BASE_URL`, `STEADFAST_API_KEY`, `STEADFAST_SECRET_KEY`,
///   `STEADFAST_WEBHOOK_SECRET`
///
/// A provider is configured when its `*_BASE_URL` is set.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub payment_timeout_hours: i64,
    pub status_poll_interval_minutes: u64,
    pub stale_cancel_interval_minutes: u64,
    pub auto_assign_interval_minutes: u64,
    pub auto_assign_courier: bool,
    pub default_courier: String,
    pub allow_unsigned_webhooks: bool,
    pub pathao: Option<ProviderConfig>,
    pub steadfast: Option<ProviderConfig>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let allow_unsigned_webhooks = parsed_var("ALLOW_UNSIGNED_WEBHOOKS", false)?;

        let pathao = std::env::var("PATHAO_BASE_URL")
            .ok()
            .map(|base_url| ProviderConfig {
                base_url,
                api_key: var_or_default("PATHAO_CLIENT_ID", ""),
                api_secret: var_or_default("PATHAO_CLIENT_SECRET", ""),
                username: var_or_default("PATHAO_USERNAME", ""),
                password: var_or_default("PATHAO_PASSWORD", ""),
                webhook_secret: std::env::var("PATHAO_WEBHOOK_SECRET").ok(),
                allow_unsigned: allow_unsigned_webhooks,
            });
        let steadfast = std::env::var("STEADFAST_BASE_URL")
            .ok()
            .map(|base_url| ProviderConfig {
                base_url,
                api_key: var_or_default("STEADFAST_API_KEY", ""),
                api_secret: var_or_default("STEADFAST_SECRET_KEY", ""),
                username: String::new(),
                password: String::new(),
                webhook_secret: std::env::var("STEADFAST_WEBHOOK_SECRET").ok(),
                allow_unsigned: allow_unsigned_webhooks,
            });

        Ok(Self {
            host: var_or_default("HOST", "0.0.0.0"),
            port: parsed_var("PORT", 3000)?,
            database_url: std::env::var("DATABASE_URL").ok(),
            payment_timeout_hours: parsed_var("PAYMENT_TIMEOUT_HOURS", 24)?,
            status_poll_interval_minutes: parsed_var("STATUS_POLL_INTERVAL_MINUTES", 30)?,
            stale_cancel_interval_minutes: parsed_var("STALE_CANCEL_INTERVAL_MINUTES", 60)?,
            auto_assign_interval_minutes: parsed_var("AUTO_ASSIGN_INTERVAL_MINUTES", 5)?,
            auto_assign_courier: parsed_var("AUTO_ASSIGN_COURIER", false)?,
            default_courier: var_or_default("DEFAULT_COURIER", "pathao"),
            allow_unsigned_webhooks,
            pathao,
            steadfast,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Courier subsystem configuration assembled from the provider vars.
    pub fn courier_config(&self) -> CourierConfig {
        CourierConfig {
            default_provider: self.default_courier.clone(),
            request_timeout: PROVIDER_REQUEST_TIMEOUT,
            pathao: self.pathao.clone(),
            steadfast: self.steadfast.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            payment_timeout_hours: 24,
            status_poll_interval_minutes: 30,
            stale_cancel_interval_minutes: 60,
            auto_assign_interval_minutes: 5,
            auto_assign_courier: false,
            default_courier: "pathao".to_string(),
            allow_unsigned_webhooks: false,
            pathao: None,
            steadfast: None,
        }
    }
}

fn var_or_default(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}
