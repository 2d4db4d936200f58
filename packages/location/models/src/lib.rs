#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Case record, coordinate, and region types.
//!
//! Case records come from the published workbook with a home-region name
//! (the reporting health district) and an optional last-country-visited
//! name. Enrichment attaches a [`CoordinateEntry`] to each of those names.

use serde::{Deserialize, Serialize};

/// Which vocabulary a place name belongs to.
///
/// Domestic names are qualified with the home country code before being
/// sent to the geocoder; international names are sent as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionContext {
    /// A health district or other region inside the home country.
    Domestic,
    /// A country name.
    International,
}

impl RegionContext {
    /// Returns the lowercase label used in config files and log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Domestic => "domestic",
            Self::International => "international",
        }
    }
}

impl std::fmt::Display for RegionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved latitude/longitude pair (WGS84).
///
/// Only fully resolved results are ever represented by this type; a
/// geocoder miss is never stored as a `CoordinateEntry`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateEntry {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub long: f64,
}

impl CoordinateEntry {
    /// Creates a new entry.
    #[must_use]
    pub const fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }

    /// Returns `true` when both components are finite numbers.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.long.is_finite()
    }
}

/// A single case row as supplied by the record source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Reporting health district (e.g. `"Capital and Coast"`).
    pub home_region: String,
    /// Last country visited before arrival, if any.
    pub prior_country: Option<String>,
}

impl CaseRecord {
    /// Creates a record from borrowed parts.
    #[must_use]
    pub fn new(home_region: &str, prior_country: Option<&str>) -> Self {
        Self {
            home_region: home_region.to_owned(),
            prior_country: prior_country.map(str::to_owned),
        }
    }
}

/// A [`CaseRecord`] with its four coordinate fields attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// The original record, unchanged.
    pub record: CaseRecord,
    /// Latitude of the home region.
    pub home_lat: f64,
    /// Longitude of the home region.
    pub home_long: f64,
    /// Latitude of the prior country, `None` when there was no travel.
    pub prior_lat: Option<f64>,
    /// Longitude of the prior country, `None` when there was no travel.
    pub prior_long: Option<f64>,
}

impl EnrichedRecord {
    /// Builds an enriched record from the resolved coordinates.
    #[must_use]
    pub fn new(record: CaseRecord, home: CoordinateEntry, prior: Option<CoordinateEntry>) -> Self {
        Self {
            record,
            home_lat: home.lat,
            home_long: home.long,
            prior_lat: prior.map(|c| c.lat),
            prior_long: prior.map(|c| c.long),
        }
    }

    /// Returns the home-region coordinates.
    #[must_use]
    pub const fn home(&self) -> CoordinateEntry {
        CoordinateEntry::new(self.home_lat, self.home_long)
    }

    /// Returns the prior-country coordinates, if any.
    #[must_use]
    pub fn prior(&self) -> Option<CoordinateEntry> {
        self.prior_lat
            .zip(self.prior_long)
            .map(|(lat, long)| CoordinateEntry::new(lat, long))
    }
}

/// Counters collected during one enrichment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentSummary {
    /// Number of records processed.
    pub records: u64,
    /// Lookups answered from the cache.
    pub cache_hits: u64,
    /// Lookups that went to the external geocoder.
    pub external_lookups: u64,
    /// Records that had a prior country to resolve.
    pub records_with_travel: u64,
    /// New entries added to the cache.
    pub entries_learned: u64,
}

impl EnrichmentSummary {
    /// Adds another summary's counters to this one.
    pub const fn absorb(&mut self, other: &Self) {
        self.records += other.records;
        self.cache_hits += other.cache_hits;
        self.external_lookups += other.external_lookups;
        self.records_with_travel += other.records_with_travel;
        self.entries_learned += other.entries_learned;
    }
}
