//! Environment configuration.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;
use tracing::info;

use crate::domain::value_objects::Currency;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
}

/// Credentials for the administrator created at startup.
#[derive(Clone)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Unset means in-memory stores.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Unset means the auto-confirming in-memory processor.
    pub payment_api_key: Option<String>,
    pub payment_api_base: String,
    pub currency: Currency,
    pub session_ttl_hours: u32,
    pub nats_url: Option<String>,
    pub admin: Option<AdminSeed>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8083,
            database_url: None,
            database_max_connections: 10,
            payment_api_key: None,
            payment_api_base: "https://api.stripe.com".to_string(),
            currency: Currency::eur(),
            session_ttl_hours: 24,
            nats_url: None,
            admin: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let currency = match get("PAYMENT_CURRENCY") {
            Some(raw) => Currency::new(raw.as_str()).map_err(|e| ConfigError::Invalid {
                key: "PAYMENT_CURRENCY",
                value: raw,
                reason: e.to_string(),
            })?,
            None => defaults.currency,
        };

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                name: get("ADMIN_NAME").unwrap_or_else(|| "Admin".to_string()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            port: parsed(&get, "PORT", defaults.port)?,
            database_url: get("DATABASE_URL"),
            database_max_connections: parsed(&get, "DATABASE_MAX_CONNECTIONS", defaults.database_max_connections)?,
            payment_api_key: get("PAYMENT_API_KEY"),
            payment_api_base: get("PAYMENT_API_BASE").unwrap_or(defaults.payment_api_base),
            currency,
            session_ttl_hours: parsed(&get, "SESSION_TTL_HOURS", defaults.session_ttl_hours)?,
            nats_url: get("NATS_URL"),
            admin,
        })
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.session_ttl_hours))
    }
}

fn parsed<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid { key, value: raw.clone(), reason: e.to_string() }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("database_max_connections", &self.database_max_connections)
            .field("payment_api_key", &self.payment_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("payment_api_base", &self.payment_api_base)
            .field("currency", &self.currency)
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("nats_url", &self.nats_url)
            .field("admin", &self.admin.as_ref().map(|a| &a.email))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.database_max_connections, 10);
        assert_eq!(cfg.currency.as_str(), "eur");
        assert_eq!(cfg.session_ttl(), chrono::Duration::hours(24));
        assert!(cfg.database_url.is_none());
        assert!(cfg.admin.is_none());
    }

    #[test]
    fn values_are_read_and_typed() {
        let cfg = config(&[
            ("PORT", "9000"),
            ("PAYMENT_CURRENCY", "USD"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("PAYMENT_API_KEY", " "),
            ("ADMIN_EMAIL", "root@example.com"),
            ("ADMIN_PASSWORD", "changeme"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.currency.as_str(), "usd");
        assert!(cfg.payment_api_key.is_none());
        assert_eq!(cfg.admin.as_ref().map(|a| a.name.as_str()), Some("Admin"));
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(matches!(config(&[("PORT", "eighty")]), Err(ConfigError::Invalid { key: "PORT", .. })));
        assert!(matches!(config(&[("PAYMENT_CURRENCY", "euro")]), Err(ConfigError::Invalid { key: "PAYMENT_CURRENCY", .. })));
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg = config(&[("DATABASE_URL", "postgres://user:hunter2@db/shop"), ("PAYMENT_API_KEY", "sk_live_x")]).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("sk_live_x"));
    }
}
