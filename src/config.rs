//! Runtime configuration read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `FLEETWATCH_PORT` | `3001` |
//! | `FLEETWATCH_ALERT_API_URL` | `http://localhost:3000` |
//! | `FLEETWATCH_MAPS_API_KEY` | unset |
//! | `FLEETWATCH_PINNED_DEVICES` | empty, comma separated |
//! | `FLEETWATCH_REQUEST_TIMEOUT_SECS` | `30` |
//!
//! Unparseable values fall back to the default.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::data_sources::alert_api::DEFAULT_ALERT_API_BASE;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3001;

/// Default upstream request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,

    /// Base URL of the alert retrieval API.
    pub alert_api_url: String,

    /// Google Maps embed key. Without one, map links open the public map.
    pub maps_api_key: Option<String>,

    /// Devices always listed first in the device selector.
    pub pinned_devices: Vec<String>,

    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            alert_api_url: DEFAULT_ALERT_API_BASE.to_string(),
            maps_api_key: None,
            pinned_devices: Vec::new(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = parse_or(value("FLEETWATCH_PORT"), "FLEETWATCH_PORT", defaults.port);
        let timeout_secs = parse_or(
            value("FLEETWATCH_REQUEST_TIMEOUT_SECS"),
            "FLEETWATCH_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        );

        let pinned_devices = value("FLEETWATCH_PINNED_DEVICES")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|imei| !imei.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            port,
            alert_api_url: value("FLEETWATCH_ALERT_API_URL").unwrap_or(defaults.alert_api_url),
            maps_api_key: value("FLEETWATCH_MAPS_API_KEY"),
            pinned_devices,
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, name: &str, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "Invalid setting, using default");
            default
        }),
    }
}
