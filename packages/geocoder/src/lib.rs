#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Place-name geocoding for case location enrichment.
//!
//! Converts a free-form place query (e.g. `"Wellington, NZ"` or
//! `"Australia"`) to latitude/longitude coordinates through the
//! [`Geocoder`] trait. The shipped provider is [`nominatim`]
//! (OpenStreetMap), configured from the embedded `services/nominatim.toml`
//! (see [`config`]).
//!
//! A provider distinguishes three outcomes:
//!
//! * `Ok(Some(_))`: the place was found.
//! * `Ok(None)`: the provider answered, but found nothing. Never retried.
//! * `Err(_)`: the provider could not be asked (network fault, rate
//!   limit, server error) or answered with garbage. Transient faults are
//!   retried with backoff by [`retry::send_json`] before surfacing.

pub mod config;
pub mod nominatim;
pub mod retry;

use async_trait::async_trait;
use thiserror::Error;

/// A geocoding result.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedLocation {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// The canonical place name returned by the provider.
    pub display_name: Option<String>,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("Geocoder returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Provider configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },
}

/// A provider that turns a place query into coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Short provider identifier for log output (e.g. `"nominatim"`).
    fn name(&self) -> &str;

    /// Looks up a single free-form query.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the provider could not be reached or its
    /// response could not be parsed. A clean "nothing found" is `Ok(None)`.
    async fn geocode(&self, query: &str) -> Result<Option<GeocodedLocation>, GeocodeError>;
}
