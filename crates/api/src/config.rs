//! Application configuration loaded from environment variables.

use std::time::Duration;

use cart::ProductPolicy;
use thiserror::Error;
use workflow::ProcessOptions;

/// A configuration variable that is set but cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value for {name}: {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub reason: String,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `8080`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `DATABASE_URL`: PostgreSQL journal; the journal is in-memory when unset
/// - `ABANDONED_CART_TIMEOUT_SECS`: abandonment deadline (default `600`)
/// - `CHARGE_TIMEOUT_SECS`: total budget for one charge (default `60`)
/// - `PRODUCT_POLICY`: `permissive` or `strict` (default `permissive`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub abandoned_cart_timeout: Duration,
    pub charge_timeout: Duration,
    pub product_policy: ProductPolicy,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            abandoned_cart_timeout: parse(&lookup, "ABANDONED_CART_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.abandoned_cart_timeout),
            charge_timeout: parse(&lookup, "CHARGE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.charge_timeout),
            product_policy: match lookup("PRODUCT_POLICY") {
                Some(value) => value.parse::<ProductPolicy>().map_err(|reason| ConfigError {
                    name: "PRODUCT_POLICY",
                    reason,
                })?,
                None => defaults.product_policy,
            },
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Options for every cart process the server hosts.
    pub fn process_options(&self) -> ProcessOptions {
        ProcessOptions::default()
            .with_abandonment_timeout(self.abandoned_cart_timeout)
            .with_charge_timeout(self.charge_timeout)
            .with_product_policy(self.product_policy)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            database_url: None,
            abandoned_cart_timeout: Duration::from_secs(600),
            charge_timeout: Duration::from_secs(60),
            product_policy: ProductPolicy::Permissive,
        }
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ConfigError {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}
