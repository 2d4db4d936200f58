//! Geocoding provider configuration.
//!
//! The default Nominatim settings live in `services/nominatim.toml` and are
//! embedded at compile time. Individual fields can be overridden through
//! environment variables:
//!
//! | Variable                   | Field           |
//! |----------------------------|-----------------|
//! | `CASE_GEO_NOMINATIM_URL`   | `base_url`      |
//! | `CASE_GEO_USER_AGENT`      | `user_agent`    |
//! | `CASE_GEO_RATE_LIMIT_MS`   | `rate_limit_ms` |
//! | `CASE_GEO_TIMEOUT_SECS`    | `timeout_secs`  |
//! | `CASE_GEO_MAX_RETRIES`     | `max_retries`   |

use std::time::Duration;

use serde::Deserialize;

use crate::GeocodeError;
use crate::retry::RetryPolicy;

const NOMINATIM_TOML: &str = include_str!("../services/nominatim.toml");

/// Nominatim service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NominatimConfig {
    /// Unique identifier (`"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Search endpoint URL.
    pub base_url: String,
    /// Minimum delay before each request in milliseconds.
    pub rate_limit_ms: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries for transient failures (not counting the first attempt).
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub retry_base_delay_ms: u64,
    /// `User-Agent` header value. Nominatim rejects anonymous clients.
    pub user_agent: String,
}

impl NominatimConfig {
    /// Parses the embedded default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Config`] if the embedded TOML is malformed.
    pub fn embedded() -> Result<Self, GeocodeError> {
        toml::de::from_str(NOMINATIM_TOML).map_err(|e| GeocodeError::Config {
            message: format!("failed to parse embedded nominatim.toml: {e}"),
        })
    }

    /// Parses the embedded defaults and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Config`] if the embedded TOML is malformed or
    /// a numeric override cannot be parsed.
    pub fn from_env() -> Result<Self, GeocodeError> {
        let mut config = Self::embedded()?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps a variable name to its
    /// value. Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Config`] if a numeric override cannot be
    /// parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), GeocodeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("CASE_GEO_NOMINATIM_URL") {
            self.base_url = url;
        }
        if let Some(agent) = get("CASE_GEO_USER_AGENT") {
            self.user_agent = agent;
        }
        if let Some(value) = get("CASE_GEO_RATE_LIMIT_MS") {
            self.rate_limit_ms = parse_number("CASE_GEO_RATE_LIMIT_MS", &value)?;
        }
        if let Some(value) = get("CASE_GEO_TIMEOUT_SECS") {
            self.timeout_secs = parse_number("CASE_GEO_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("CASE_GEO_MAX_RETRIES") {
            self.max_retries = parse_number("CASE_GEO_MAX_RETRIES", &value)?;
        }

        Ok(())
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the retry policy described by this configuration.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, GeocodeError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| GeocodeError::Config {
        message: format!("invalid value for {key} ({value:?}): {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn embedded_config_parses() {
        let config = NominatimConfig::embedded().unwrap();
        assert_eq!(config.id, "nominatim");
        assert!(config.base_url.starts_with("https://"));
        assert!(!config.user_agent.is_empty());
        assert!(
            config.rate_limit_ms >= 1000,
            "public Nominatim allows one request per second"
        );
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn overrides_replace_fields() {
        let vars = BTreeMap::from([
            ("CASE_GEO_NOMINATIM_URL", "http://localhost:8080/search"),
            ("CASE_GEO_USER_AGENT", "test-agent"),
            ("CASE_GEO_RATE_LIMIT_MS", "0"),
            ("CASE_GEO_MAX_RETRIES", "1"),
        ]);
        let mut config = NominatimConfig::embedded().unwrap();
        config
            .apply_overrides(|key| vars.get(key).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.base_url, "http://localhost:8080/search");
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.rate_limit_ms, 0);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut config = NominatimConfig::embedded().unwrap();
        let before = config.clone();
        config
            .apply_overrides(|_| Some("   ".to_string()))
            .unwrap();
        assert_eq!(config, before);
    }

    #[test]
    fn invalid_numeric_override_is_an_error() {
        let mut config = NominatimConfig::embedded().unwrap();
        let err = config
            .apply_overrides(|key| (key == "CASE_GEO_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, GeocodeError::Config { .. }));
        assert!(err.to_string().contains("CASE_GEO_TIMEOUT_SECS"));
    }
}
